//! Transcription backend API.

mod client;
mod models;

pub use client::{AudioDownload, BackendClient};
pub use models::{
    DiskSpace, LoginResponse, RecordId, TranscribeResponse, TranscriptionDetail, TranscriptionPage,
    TranscriptionSummary,
};
