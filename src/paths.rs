//! Path utilities for app data, settings, session and log files.

use std::path::PathBuf;

const APP_DIR: &str = "saywe";

/// Get the app data directory (e.g. %APPDATA%/saywe on Windows).
/// Falls back to the working directory when the platform has no data dir.
pub fn app_data_dir() -> PathBuf {
    #[cfg(windows)]
    {
        std::env::var("APPDATA")
            .map(|p| PathBuf::from(p).join(APP_DIR))
            .unwrap_or_else(|_| PathBuf::from(".").join(APP_DIR))
    }
    #[cfg(not(windows))]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
    }
}

/// Get the path to the settings file.
pub fn settings_path() -> PathBuf {
    app_data_dir().join("settings.json")
}

/// Get the path to the persisted login session.
pub fn session_path() -> PathBuf {
    app_data_dir().join("session.json")
}

/// Get the log directory, creating it if necessary.
pub fn log_dir() -> Result<PathBuf, String> {
    let dir = app_data_dir().join("logs");
    std::fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
    Ok(dir)
}

/// Get the log file path (e.g. %APPDATA%/saywe/logs/saywe.log on Windows).
pub fn log_file_path() -> Result<PathBuf, String> {
    Ok(log_dir()?.join("saywe.log"))
}

/// Ensure all app directories exist.
pub fn ensure_directories() -> Result<(), String> {
    std::fs::create_dir_all(app_data_dir()).map_err(|e| e.to_string())?;
    log_dir()?;
    Ok(())
}
