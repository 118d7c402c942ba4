//! Upload file checks and transcription language selection.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ValidationError;

const ALLOWED_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/avi",
    "video/webm",
    "video/x-flv",
    "video/x-ms-wmv",
    "audio/mpeg",
    "audio/wav",
    "audio/mp3",
];

/// (extension, mime sent with the multipart part)
const ALLOWED_EXTENSIONS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("avi", "video/avi"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("flv", "video/x-flv"),
    ("wmv", "video/x-ms-wmv"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
];

/// Spoken language of the uploaded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    #[default]
    TraditionalChinese,
}

impl Language {
    /// Code expected by the `language` form field.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::TraditionalChinese => "zh-TW",
        }
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Accept a file if either its reported MIME type or its extension is allowed.
pub fn validate_upload(file_name: &str, mime_type: Option<&str>) -> Result<(), ValidationError> {
    if file_name.trim().is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    let mime_ok = mime_type.map_or(false, |m| ALLOWED_MIME_TYPES.contains(&m));
    let ext_ok = extension_of(file_name)
        .map_or(false, |ext| ALLOWED_EXTENSIONS.iter().any(|(e, _)| *e == ext));
    if mime_ok || ext_ok {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedFileType(file_name.to_string()))
    }
}

/// MIME type to declare for an upload, by extension.
pub fn mime_for(file_name: &str) -> &'static str {
    extension_of(file_name)
        .and_then(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .find(|(e, _)| *e == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or("application/octet-stream")
}
