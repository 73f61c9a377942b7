//! Durable progress marker for resumable runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress after the last fully persisted page.
///
/// Written only after the page's rows are flushed to the output file, so
/// `last_completed_page` never points past data that is not on disk.
/// Unknown fields are ignored on load so older binaries can read newer files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 1-based index of the last page whose records were durably written
    pub last_completed_page: u32,
    pub updated_at: DateTime<Utc>,
    /// Start URL of the run that produced this checkpoint
    #[serde(default)]
    pub start_url: String,
    /// Next-page link discovered on the last completed page, if any
    #[serde(default)]
    pub next_page_url: Option<String>,
    /// Cumulative data rows in the output file; absent in minimal documents
    #[serde(default)]
    pub records_written: Option<u64>,
    /// Output file length (bytes) at the time of this checkpoint. When
    /// absent the output is never truncated on resume.
    #[serde(default)]
    pub output_bytes: Option<u64>,
}

impl Checkpoint {
    pub fn new(
        last_completed_page: u32,
        start_url: impl Into<String>,
        next_page_url: Option<String>,
        records_written: Option<u64>,
        output_bytes: u64,
    ) -> Self {
        Self {
            last_completed_page,
            updated_at: Utc::now(),
            start_url: start_url.into(),
            next_page_url,
            records_written,
            output_bytes: Some(output_bytes),
        }
    }

    pub fn next_page(&self) -> u32 {
        self.last_completed_page.saturating_add(1)
    }

    /// Older checkpoints carry no start URL; treat them as matching.
    pub fn belongs_to(&self, start_url: &str) -> bool {
        self.start_url.is_empty() || self.start_url == start_url
    }
}
