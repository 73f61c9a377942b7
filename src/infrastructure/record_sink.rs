//! Append-only record output
//!
//! Every sink writes one page as a single buffer with one `write_all`
//! followed by `sync_data`. The committed file length is what checkpoints
//! record; on resume anything past it is cut off.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::config::{OutputConfig, OutputFormat};
use super::csv_sink::CsvSink;
use super::jsonl_sink::JsonLinesSink;
use crate::domain::product::ValidatedProduct;

/// Append-only record output with length-based rollback
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append and flush one page worth of records; returns bytes written
    async fn append(&mut self, records: &[ValidatedProduct]) -> io::Result<u64>;

    /// Bytes durably written so far
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything after `len` bytes. Returns whether anything was cut.
    async fn truncate_to(&mut self, len: u64) -> io::Result<bool>;

    fn path(&self) -> &Path;
}

/// Open the sink selected by `output.format`
pub async fn open_sink(output: &OutputConfig) -> io::Result<Box<dyn RecordSink>> {
    let path = output.records_path();
    Ok(match output.format {
        OutputFormat::Csv => Box::new(CsvSink::open(path).await?),
        OutputFormat::Jsonl => Box::new(JsonLinesSink::open(path).await?),
    })
}

/// Output file opened for appending, with its durable length
pub(crate) struct AppendFile {
    path: PathBuf,
    file: File,
    len: u64,
}

impl AppendFile {
    pub(crate) async fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let len = file.metadata().await?.len();
        debug!("Opened output {} ({} bytes)", path.display(), len);

        Ok(Self { path, file, len })
    }

    /// Write `buffer` in one call and flush it to disk
    pub(crate) async fn write_page(&mut self, buffer: &[u8], rows: usize) -> io::Result<u64> {
        self.file.write_all(buffer).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;

        let written = buffer.len() as u64;
        self.len += written;
        debug!(
            "Appended {} rows ({} bytes) to {}",
            rows,
            written,
            self.path.display()
        );
        Ok(written)
    }

    pub(crate) async fn truncate_to(&mut self, len: u64) -> io::Result<bool> {
        if len >= self.len {
            return Ok(false);
        }
        self.file.set_len(len).await?;
        self.file.sync_all().await?;
        info!(
            "Truncated {} from {} to {} bytes (uncommitted rows discarded)",
            self.path.display(),
            self.len,
            len
        );
        self.len = len;
        Ok(true)
    }

    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}
