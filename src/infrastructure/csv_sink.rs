//! CSV output sink
//!
//! Rows are quoted by the `csv` crate; the header goes in front of the first
//! page written to an empty file.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::record_sink::{AppendFile, RecordSink};
use crate::domain::product::{CSV_HEADER, ValidatedProduct};

pub struct CsvSink {
    out: AppendFile,
}

impl CsvSink {
    /// Open (or create) the output file for appending
    pub async fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        Ok(Self {
            out: AppendFile::open(path).await?,
        })
    }

    /// Serialize `records` (with the header when the file is empty)
    fn encode(&self, records: &[ValidatedProduct]) -> io::Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());

        if self.out.len() == 0 {
            writer.write_record(CSV_HEADER)?;
        }
        for record in records {
            writer.serialize(record.to_row())?;
        }

        writer
            .into_inner()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    async fn append(&mut self, records: &[ValidatedProduct]) -> io::Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let buffer = self.encode(records)?;
        self.out.write_page(&buffer, records.len()).await
    }

    fn len(&self) -> u64 {
        self.out.len()
    }

    async fn truncate_to(&mut self, len: u64) -> io::Result<bool> {
        self.out.truncate_to(len).await
    }

    fn path(&self) -> &Path {
        self.out.path()
    }
}
