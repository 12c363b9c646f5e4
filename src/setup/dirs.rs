//! On-disk working directories.

use std::io;
use std::path::{Path, PathBuf};

/// Layout of the data directory.
///
/// ```text
/// <root>/
///     cache/     emptied on every setup run
///     uploads/
/// ```
#[derive(Debug, Clone)]
pub struct DataDirectories {
    root: PathBuf,
}

impl DataDirectories {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn uploads(&self) -> PathBuf {
        self.root.join("uploads")
    }

    /// Ensure every directory exists and the cache is empty. Idempotent.
    pub async fn prepare(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        empty_dir(&self.cache()).await?;
        tokio::fs::create_dir_all(self.uploads()).await?;
        Ok(())
    }
}

/// Create `path` if missing, otherwise delete everything inside it.
async fn empty_dir(path: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(path).await?;

    let mut entries = tokio::fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(entry.path()).await?;
        } else {
            tokio::fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}
