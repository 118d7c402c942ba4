//! Application settings persisted as `settings.json`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Environment override for the backend base URL.
pub const API_URL_ENV: &str = "SAYWE_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://114.34.174.244:8701/api/v1";

/// Waveform look, matching the web player's bar style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    pub bar_width: f64,
    pub bar_gap: f64,
    pub bar_radius: f64,
    pub min_height: f64,
    pub wave_color: String,
    pub progress_color: String,
    pub cursor_width: f64,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            bar_width: 4.0,
            bar_gap: 4.0,
            bar_radius: 3.0,
            min_height: 58.0,
            wave_color: "#E5E5E5".to_string(),
            progress_color: "#8181F3".to_string(),
            cursor_width: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub page_size: u32,
    pub search_debounce_ms: u64,
    /// Rewind/forward step in seconds.
    pub seek_step_secs: f64,
    pub frame_interval_ms: u64,
    pub time_update_interval_ms: u64,
    pub waveform: WaveformConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: 10,
            search_debounce_ms: 500,
            seek_step_secs: 10.0,
            frame_interval_ms: 16,
            time_update_interval_ms: 250,
            waveform: WaveformConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load settings from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let json = std::fs::read_to_string(path)?;
            serde_json::from_str::<AppConfig>(&json)?
        } else {
            AppConfig::default()
        };
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api_base_url = url;
            }
        }
        config.api_base_url = config.api_base_url.trim().trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
