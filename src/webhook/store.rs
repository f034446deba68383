//! Signal inbox file and processed-id store

use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Read the raw signal list written by the webhook receiver
///
/// A missing file is an empty inbox. A file that is not a JSON array is
/// logged and treated as empty.
pub async fn read_inbox(path: &Path) -> Vec<Value> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Trades file not found");
            return Vec::new();
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read trades file");
            return Vec::new();
        }
    };

    if content.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(signals)) => signals,
        Ok(_) => {
            tracing::error!(path = %path.display(), "Invalid trades format: expected a list");
            Vec::new()
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to parse trades file");
            Vec::new()
        }
    }
}

/// Persistent set of signal ids that were already handled
#[derive(Debug)]
pub struct ProcessedStore {
    path: PathBuf,
    ids: BTreeSet<String>,
}

impl ProcessedStore {
    /// Load ids from `path`; a missing or corrupt file starts empty
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ids = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(ids) => ids.into_iter().collect(),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Corrupt processed-trades file, starting empty");
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read processed trades");
                BTreeSet::new()
            }
        };

        tracing::info!(count = ids.len(), "Loaded processed trades");
        Self { path, ids }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns false if the id was already present
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Write the ids as a JSON array, replacing the file atomically
    pub async fn save(&self) -> anyhow::Result<()> {
        let ids: Vec<&String> = self.ids.iter().collect();
        let json = serde_json::to_string(&ids)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
