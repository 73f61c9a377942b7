//! JSON Lines output sink: one object per record, no header

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::record_sink::{AppendFile, RecordSink};
use crate::domain::product::ValidatedProduct;

pub struct JsonLinesSink {
    out: AppendFile,
}

impl JsonLinesSink {
    pub async fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        Ok(Self {
            out: AppendFile::open(path).await?,
        })
    }

    fn encode(records: &[ValidatedProduct]) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, &record.to_row()).map_err(io::Error::other)?;
            buffer.write_all(b"\n")?;
        }
        Ok(buffer)
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn append(&mut self, records: &[ValidatedProduct]) -> io::Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let buffer = Self::encode(records)?;
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
