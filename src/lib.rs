pub mod api;
#[cfg(feature = "desktop")]
mod commands;
pub mod config;
pub mod error;
pub mod listing;
pub mod logging;
pub mod paths;
pub mod playback;
pub mod session;
#[cfg(test)]
pub(crate) mod test_support;
pub mod upload;

pub use api::BackendClient;
pub use config::AppConfig;
pub use error::{ApiError, ConfigError, MediaLoadError, SessionStoreError, TransportError, ValidationError};
pub use playback::{spawn_native_player, PlaybackController, PlaybackStatus, PlayerCommand, PlayerHandle, PlayerSnapshot};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore, User, UserProfile};

#[cfg(feature = "desktop")]
pub fn run() {
    use log::{info, warn};
    use listing::SearchDebouncer;
    use std::sync::Arc;
    use std::time::Duration;
    use tauri::{Emitter, Manager};

    match logging::init_logger() {
        Ok(path) => info!("Logging to {}", path.display()),
        Err(e) => eprintln!("Failed to initialise logger: {}", e),
    }

    tauri::Builder::default()
        .plugin(tauri_plugin_log::Builder::default().skip_logger().build())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            paths::ensure_directories()?;
            let config = AppConfig::load(&paths::settings_path()).unwrap_or_else(|e| {
                warn!("Using default settings: {}", e);
                AppConfig::default()
            });
            let store = FileSessionStore::open(&paths::session_path())?;
            let client = BackendClient::new(config.api_base_url.clone(), Session::new(Arc::new(store)));
            info!("Backend at {}", client.base_url());

            let handle = app.handle().clone();
            let search_handle = app.handle().clone();
            let (search, terms) = SearchDebouncer::new(Duration::from_millis(config.search_debounce_ms));
            let player = tauri::async_runtime::block_on(async {
                listing::spawn_search(client.clone(), config.page_size, terms, move |term, result| {
                    let (listing, error) = match result {
                        Ok(listing) => (Some(listing), None),
                        Err(e) => {
                            warn!("Search for {:?} failed: {}", term, e);
                            (None, Some(e.to_string()))
                        }
                    };
                    let event = commands::SearchResult {
                        term: term.to_string(),
                        listing,
                        error,
                    };
                    let _ = search_handle.emit(commands::TRANSCRIPT_SEARCH_EVENT, event);
                });
                spawn_native_player(client.clone(), &config, move |snapshot| {
                    let _ = handle.emit(commands::PLAYBACK_STATE_EVENT, snapshot);
                })
            });

            app.manage(commands::AppState {
                client,
                player,
                config,
                search: parking_lot::Mutex::new(search),
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::login,
            commands::logout,
            commands::current_user,
            commands::list_transcriptions,
            commands::search_transcriptions,
            commands::get_transcription,
            commands::validate_upload,
            commands::transcribe_file,
            commands::disk_space,
            commands::player_open,
            commands::player_toggle,
            commands::player_seek,
            commands::player_rewind,
            commands::player_forward,
            commands::player_resize,
            commands::player_close,
            commands::player_snapshot,
            commands::get_log_file_path,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
