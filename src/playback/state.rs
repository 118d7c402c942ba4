//! Observable playback state.

use serde::Serialize;

use super::waveform::WaveformFrame;

/// Where the player is in its lifecycle. The only source of truth for
/// "playing" and "loading"; both are derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Errored(String),
}

impl PlaybackStatus {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Loading => "loading",
            PlaybackStatus::Ready => "ready",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Ended => "ended",
            PlaybackStatus::Errored(_) => "errored",
        }
    }

    /// Duration is known and the position means something.
    pub fn has_position(&self) -> bool {
        matches!(
            self,
            PlaybackStatus::Ready | PlaybackStatus::Playing | PlaybackStatus::Paused | PlaybackStatus::Ended
        )
    }

    pub fn can_play(&self) -> bool {
        matches!(self, PlaybackStatus::Ready | PlaybackStatus::Paused | PlaybackStatus::Ended)
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    status: PlaybackStatus,
    position_secs: f64,
    duration_secs: f64,
    source_url: Option<String>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            position_secs: 0.0,
            duration_secs: 0.0,
            source_url: None,
        }
    }
}

impl PlaybackState {
    pub fn status(&self) -> &PlaybackStatus {
        &self.status
    }

    pub fn position_secs(&self) -> f64 {
        self.position_secs
    }

    /// Zero until the source reports readiness.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.status == PlaybackStatus::Loading
    }

    pub fn controls_enabled(&self) -> bool {
        self.status.has_position()
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            PlaybackStatus::Errored(reason) => Some(reason),
            _ => None,
        }
    }

    /// Position as a fraction of the duration, 0 when the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.position_secs / self.duration_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub(super) fn set_status(&mut self, status: PlaybackStatus) {
        self.status = status;
    }

    pub(super) fn set_duration(&mut self, secs: f64) {
        self.duration_secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
        self.position_secs = self.position_secs.min(self.duration_secs);
    }

    /// Clamped to `[0, duration]`.
    pub(super) fn set_position(&mut self, secs: f64) {
        let secs = if secs.is_finite() { secs } else { 0.0 };
        self.position_secs = secs.clamp(0.0, self.duration_secs);
    }

    pub(super) fn begin(&mut self, url: String) {
        *self = Self {
            status: PlaybackStatus::Loading,
            source_url: Some(url),
            ..Self::default()
        };
    }

    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Everything a view needs to draw the player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub status: PlaybackStatus,
    pub is_playing: bool,
    pub is_loading: bool,
    pub controls_enabled: bool,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub position_label: String,
    pub duration_label: String,
    pub progress: f64,
    pub source_url: Option<String>,
    pub waveform: WaveformFrame,
}
