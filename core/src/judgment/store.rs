//! Judgment store backed by a directory of JSON documents

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::traits::{JudgmentStore, StoreError};

use super::model::Judgment;

/// Reads `{dir}/{judgment_id}.json`
#[derive(Debug, Clone)]
pub struct FileJudgmentStore {
    dir: PathBuf,
}

impl FileJudgmentStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, judgment_id: &str) -> Option<PathBuf> {
        let plain = !judgment_id.is_empty()
            && !judgment_id.contains(['/', '\\'])
            && judgment_id != "."
            && judgment_id != "..";
        plain.then(|| self.dir.join(format!("{judgment_id}.json")))
    }
}

#[async_trait]
impl JudgmentStore for FileJudgmentStore {
    fn store_name(&self) -> &str {
        "file"
    }

    async fn get_judgment(&self, judgment_id: &str) -> Result<Judgment, StoreError> {
        let path = self
            .path_for(judgment_id)
            .ok_or_else(|| StoreError::NotFound(judgment_id.to_string()))?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(judgment_id.to_string()));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Malformed(format!("{}: {e}", path.display())))
    }
}
