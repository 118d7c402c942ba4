//! Tauri commands exposed to the webview.

use log::info;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use tauri::State;

use crate::api::{BackendClient, TranscribeResponse, TranscriptionDetail};
use crate::config::AppConfig;
use crate::listing::{SearchDebouncer, StorageMeter, TranscriptListing, TranscriptQuery};
use crate::paths;
use crate::playback::{PlayerCommand, PlayerHandle, PlayerSnapshot};
use crate::session::UserProfile;
use crate::upload::{self, Language};

/// Event carrying a [`PlayerSnapshot`] whenever the player changes.
pub const PLAYBACK_STATE_EVENT: &str = "playback-state";
/// Event carrying a [`SearchResult`] once typing has settled.
pub const TRANSCRIPT_SEARCH_EVENT: &str = "transcript-search";

pub struct AppState {
    pub client: BackendClient,
    pub player: PlayerHandle,
    pub config: AppConfig,
    pub search: Mutex<SearchDebouncer>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub term: String,
    pub listing: Option<TranscriptListing>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StorageStatus {
    pub meter: StorageMeter,
    pub critical: bool,
}

fn player_send(state: &AppState, command: PlayerCommand) -> Result<(), String> {
    if state.player.send(command) {
        Ok(())
    } else {
        Err("player has stopped".to_string())
    }
}

#[tauri::command]
pub async fn login(state: State<'_, AppState>, username: String, password: String) -> Result<UserProfile, String> {
    let user = state.client.login(&username, &password).await.map_err(|e| e.to_string())?;
    Ok(UserProfile::new(user))
}

#[tauri::command]
pub fn logout(state: State<'_, AppState>) -> Result<(), String> {
    let _ = state.player.send(PlayerCommand::Close);
    state.client.session().logout().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn current_user(state: State<'_, AppState>) -> Option<UserProfile> {
    state.client.session().profile()
}

#[tauri::command]
pub async fn list_transcriptions(
    state: State<'_, AppState>,
    page: Option<u32>,
    name: Option<String>,
) -> Result<TranscriptListing, String> {
    let mut query = TranscriptQuery::new(state.config.page_size);
    if let Some(name) = name.as_deref() {
        query = query.with_search(name);
    }
    query.page = page.unwrap_or(1).max(1);

    let page = state.client.list_transcriptions(&query).await.map_err(|e| e.to_string())?;
    Ok(TranscriptListing::from(&page))
}

/// Feed a keystroke of the search box. The listing arrives later as a
/// `transcript-search` event, only for the term typing settled on.
#[tauri::command]
pub async fn search_transcriptions(state: State<'_, AppState>, name: String) -> Result<(), String> {
    state.search.lock().input(name);
    Ok(())
}

#[tauri::command]
pub async fn get_transcription(state: State<'_, AppState>, id: String) -> Result<TranscriptionDetail, String> {
    state.client.get_transcription(&id).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn validate_upload(file_name: String, mime_type: Option<String>) -> Result<(), String> {
    upload::validate_upload(&file_name, mime_type.as_deref()).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn transcribe_file(
    state: State<'_, AppState>,
    path: String,
    language: Option<Language>,
) -> Result<TranscribeResponse, String> {
    let path = PathBuf::from(path);
    info!("Uploading {} for transcription", path.display());
    state
        .client
        .transcribe(&path, language.unwrap_or_default())
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn disk_space(state: State<'_, AppState>) -> Result<StorageStatus, String> {
    let disk = state.client.disk_space().await.map_err(|e| e.to_string())?;
    let meter = StorageMeter::from(&disk);
    Ok(StorageStatus {
        critical: meter.is_critical(),
        meter,
    })
}

/// Fetch the transcript, then mount its audio. A metadata failure is
/// returned before anything is mounted so the view can go back to the list.
#[tauri::command]
pub async fn player_open(state: State<'_, AppState>, id: String) -> Result<TranscriptionDetail, String> {
    let detail = state.client.get_transcription(&id).await.map_err(|e| e.to_string())?;
    player_send(&state, PlayerCommand::Open {
        url: state.client.audio_url(&id),
    })?;
    Ok(detail)
}

#[tauri::command]
pub fn player_toggle(state: State<'_, AppState>) -> Result<(), String> {
    player_send(&state, PlayerCommand::Toggle)
}

/// Seek either to an explicit fraction or to a click on a bar `width` wide.
/// Without `width` the click is taken relative to the waveform.
#[tauri::command]
pub fn player_seek(
    state: State<'_, AppState>,
    fraction: Option<f64>,
    x: Option<f64>,
    width: Option<f64>,
) -> Result<(), String> {
    let command = match (fraction, x, width) {
        (Some(f), _, _) => PlayerCommand::SeekFraction(f),
        (None, Some(x), Some(width)) => PlayerCommand::SeekClick { x, width },
        (None, Some(x), None) => PlayerCommand::WaveformClick { x },
        (None, None, _) => return Err("seek needs a fraction or a click position".to_string()),
    };
    player_send(&state, command)
}

#[tauri::command]
pub fn player_rewind(state: State<'_, AppState>) -> Result<(), String> {
    player_send(&state, PlayerCommand::Rewind)
}

#[tauri::command]
pub fn player_forward(state: State<'_, AppState>) -> Result<(), String> {
    player_send(&state, PlayerCommand::Forward)
}

#[tauri::command]
pub fn player_resize(state: State<'_, AppState>, width: f64, height: f64) -> Result<(), String> {
    player_send(&state, PlayerCommand::Resize { width, height })
}

#[tauri::command]
pub fn player_close(state: State<'_, AppState>) -> Result<(), String> {
    player_send(&state, PlayerCommand::Close)
}

#[tauri::command]
pub async fn player_snapshot(state: State<'_, AppState>) -> Result<PlayerSnapshot, String> {
    state
        .player
        .snapshot()
        .await
        .ok_or_else(|| "player has stopped".to_string())
}

#[tauri::command]
pub fn get_log_file_path() -> Result<String, String> {
    paths::log_file_path().map(|p| p.to_string_lossy().into_owned())
}
