fn main() {
    // The webview shell is optional; the library builds without tauri.
    #[cfg(feature = "desktop")]
    tauri_build::build();
}
