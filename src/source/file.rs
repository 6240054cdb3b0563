//! File-based snapshot source.
//!
//! Reads a snapshot from a JSON file on every fetch, in the same shape the
//! bridge serves on `/api/snapshot`. Handy for replaying a captured snapshot
//! or for a bridge that dumps its state to disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use obdwatch_adapters::AdapterError;
use obdwatch_types::Snapshot;

use super::SnapshotFetcher;

/// A snapshot source that reads a JSON file.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
    description: String,
}

impl FileSnapshotSource {
    /// Create a new file source for the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self { path, description }
    }

    /// Returns the path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotFetcher for FileSnapshotSource {
    async fn fetch(&self) -> Result<Snapshot, AdapterError> {
        let content = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&content)?)
    }

    fn description(&self) -> &str {
        &self.description
    }
}
