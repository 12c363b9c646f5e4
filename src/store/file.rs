//! Configuration store backed by a JSON file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::setup::snapshot::ConfigSection;
use crate::store::{ConfigStore, StoreResult};

/// Writes configuration sections into a single JSON object on disk.
///
/// Sections are merged into whatever the file already holds, then the whole
/// document is written to a temporary sibling and renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document, or an empty one if the file does not exist.
    pub async fn load(&self) -> StoreResult<Map<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ConfigStore for JsonFileConfigStore {
    async fn save_sections(&self, sections: &[ConfigSection]) -> StoreResult<()> {
        let mut document = self.load().await?;
        for section in sections {
            document.insert(section.name.to_string(), section.value.clone());
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&document)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), sections = sections.len(), "Configuration written");
        Ok(())
    }
}
