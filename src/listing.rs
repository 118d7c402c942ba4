//! Transcript list helpers: query, row formatting, pagination, storage meter
//! and debounced search.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{BackendClient, DiskSpace, TranscriptionPage, TranscriptionSummary};
use crate::error::ApiError;

/// Storage usage above this percentage is shown as critical.
const STORAGE_CRITICAL_PERCENT: f64 = 80.0;
const MAX_VISIBLE_PAGES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptQuery {
    pub page: u32,
    pub page_size: u32,
    #[serde(default)]
    pub name: Option<String>,
}

impl TranscriptQuery {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size,
            name: None,
        }
    }

    /// Query string pairs; an empty search term is omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            pairs.push(("name", name.to_string()));
        }
        pairs
    }

    /// New search term: always restart from the first page.
    pub fn with_search(&self, name: &str) -> Self {
        Self {
            page: 1,
            page_size: self.page_size,
            name: Some(name.to_string()),
        }
    }
}

/// A list entry ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRow {
    pub id: String,
    pub title: String,
    pub duration: String,
    pub tags: Vec<String>,
    pub date: String,
}

impl From<&TranscriptionSummary> for TranscriptRow {
    fn from(item: &TranscriptionSummary) -> Self {
        Self {
            id: item.transcription_id.to_string(),
            title: item.transcription_title.clone(),
            duration: format_duration(item.audio_duration),
            tags: item.tags.iter().map(|t| format!("#{}", t)).collect(),
            date: format_date(&item.created_at),
        }
    }
}

/// `HH:MM:SS`.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// `m:ss`, used by the player time labels.
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// `Y/M/D` without zero padding. Unparseable input is returned as-is.
pub fn format_date(raw: &str) -> String {
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|d| d.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|d| d.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|d| d.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"));
    match date {
        Ok(d) => format!("{}/{}/{}", d.year(), d.month(), d.day()),
        Err(_) => raw.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current: u32,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(current: u32, total_pages: u32) -> Self {
        let total_pages = total_pages.max(1);
        Self {
            current: current.clamp(1, total_pages),
            total_pages,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total_pages
    }

    /// At most five page numbers around the current page.
    pub fn visible_pages(&self) -> Vec<u32> {
        let mut start = self.current.saturating_sub(MAX_VISIBLE_PAGES / 2).max(1);
        let end = (start + MAX_VISIBLE_PAGES - 1).min(self.total_pages);
        if end + 1 - start < MAX_VISIBLE_PAGES {
            start = (end + 1).saturating_sub(MAX_VISIBLE_PAGES).max(1);
        }
        (start..=end).collect()
    }
}

/// One page of the transcript list as the view renders it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptListing {
    pub total_count: u64,
    pub pagination: Pagination,
    pub visible_pages: Vec<u32>,
    pub has_previous: bool,
    pub has_next: bool,
    pub rows: Vec<TranscriptRow>,
}

impl From<&TranscriptionPage> for TranscriptListing {
    fn from(page: &TranscriptionPage) -> Self {
        let pagination = Pagination::new(page.current_page, page.total_pages);
        Self {
            total_count: page.total_count,
            visible_pages: pagination.visible_pages(),
            has_previous: pagination.has_previous(),
            has_next: pagination.has_next(),
            pagination,
            rows: page.data.iter().map(TranscriptRow::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageMeter {
    pub used_label: String,
    pub free_label: String,
    pub percent_used: f64,
}

impl StorageMeter {
    pub fn is_critical(&self) -> bool {
        self.percent_used > STORAGE_CRITICAL_PERCENT
    }
}

impl From<&DiskSpace> for StorageMeter {
    fn from(d: &DiskSpace) -> Self {
        Self {
            used_label: format!("{:.1}GB", d.used_gb),
            free_label: format!("{:.1}GB", d.free_gb),
            percent_used: d.percent_used.clamp(0.0, 100.0),
        }
    }
}

/// Emits a search term only after input has been quiet for `delay`.
pub struct SearchDebouncer {
    delay: Duration,
    tx: mpsc::UnboundedSender<String>,
    pending: Option<JoinHandle<()>>,
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                tx,
                pending: None,
            },
            rx,
        )
    }

    /// Restart the quiet period with the latest input.
    pub fn input(&mut self, query: impl Into<String>) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        let query = query.into();
        let tx = self.tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(query);
        }));
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

/// Run each settled search term against the backend, first page only.
/// `on_result` gets the term with its listing or the failure.
pub fn spawn_search<F>(
    client: BackendClient,
    page_size: u32,
    mut terms: mpsc::UnboundedReceiver<String>,
    mut on_result: F,
) -> JoinHandle<()>
where
    F: FnMut(&str, Result<TranscriptListing, ApiError>) + Send + 'static,
{
    tokio::spawn(async move {
        let base = TranscriptQuery::new(page_size);
        while let Some(term) = terms.recv().await {
            log::debug!("[search] querying {:?}", term);
            let result = client
                .list_transcriptions(&base.with_search(&term))
                .await
                .map(|page| TranscriptListing::from(&page));
            on_result(&term, result);
        }
    })
}
