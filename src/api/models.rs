//! Wire types of the transcription backend.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Backend ids arrive as numbers on some endpoints and strings on others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Full transcript record shown on the detail view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionDetail {
    pub transcription_id: i64,
    pub transcription_title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Seconds.
    #[serde(default)]
    pub audio_duration: f64,
    pub created_at: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub transcription_text: Option<String>,
}

impl TranscriptionDetail {
    /// The detail endpoint wraps the record as `{data: {data: {..}}}`,
    /// `{data: {..}}` or returns it bare, depending on backend version.
    pub fn from_envelope(value: serde_json::Value) -> Result<Self, ApiError> {
        let nested = value
            .get("data")
            .and_then(|outer| outer.get("data"))
            .filter(|inner| inner.is_object())
            .cloned();
        let single = value
            .get("data")
            .filter(|outer| outer.get("transcription_id").is_some())
            .cloned();
        let record = if let Some(inner) = nested {
            inner
        } else if let Some(outer) = single {
            outer
        } else if value.get("transcription_id").is_some() {
            value
        } else {
            return Err(ApiError::Decode("transcription record missing from response".into()));
        };
        serde_json::from_value(record).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// One row of the paginated list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionSummary {
    pub transcription_id: i64,
    pub transcription_title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub audio_duration: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionPage {
    pub total_count: u64,
    pub total_pages: u32,
    pub current_page: u32,
    #[serde(default)]
    pub data: Vec<TranscriptionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSpace {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent_used: f64,
    #[serde(default)]
    pub mount_point: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeResponse {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub status: Option<String>,
}
