//! Atomic JSON checkpoint persistence
//!
//! `save` writes `<path>.tmp`, fsyncs it and renames it over the target, so
//! a reader only ever sees the previous document or the new one. The parent
//! directory is fsynced after the rename.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::domain::checkpoint::Checkpoint;

pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Absent or unreadable checkpoints mean "start fresh"
    pub async fn load(&self) -> Option<Checkpoint> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Cannot read checkpoint {}: {}; starting fresh", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<Checkpoint>(&bytes) {
            Ok(checkpoint) => {
                debug!(
                    "Loaded checkpoint {}: last completed page {}",
                    self.path.display(),
                    checkpoint.last_completed_page
                );
                Some(checkpoint)
            }
            Err(e) => {
                warn!("Checkpoint {} is corrupt ({}); starting fresh", self.path.display(), e);
                None
            }
        }
    }

    pub async fn save(&self, checkpoint: &Checkpoint) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(checkpoint).map_err(io::Error::other)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &self.path).await?;
        sync_parent_dir(&self.path).await?;
        debug!(
            "Checkpoint saved: page {} -> {}",
            checkpoint.last_completed_page,
            self.path.display()
        );
        Ok(())
    }

    pub async fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Persist the directory entry created by the rename
#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::File::open(parent).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
