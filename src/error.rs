//! Error types shared across the client.

use thiserror::Error;

/// The audio resource could not be fetched or decoded.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MediaLoadError {
    #[error("audio unreachable: {0}")]
    Unreachable(String),
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to decode audio: {0}")]
    Decode(String),
}

/// A transport command was issued in a state that cannot accept it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("cannot {command} while {status}")]
    InvalidState {
        command: &'static str,
        status: String,
    },
    #[error("no audio source is loaded")]
    NoSource,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid username or password")]
    Unauthorized,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Session(#[from] SessionStoreError),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("unsupported file type: {0} (accepted: MP4, AVI, MOV, WebM, FLV, WMV, MP3, WAV)")]
    UnsupportedFileType(String),
    #[error("no file selected")]
    EmptySelection,
    #[error("username and password are required")]
    EmptyCredentials,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
