use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::AppError;
use crate::models::IngestionCheckpoint;

/// JSON checkpoint file. Saves go to a sibling temp file which is then
/// renamed over the target, so a crash never leaves a half-written checkpoint.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
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
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// `Ok(None)` when no checkpoint exists. An unreadable checkpoint is an
    /// error rather than a silent fresh start.
    pub async fn load(&self) -> Result<Option<IngestionCheckpoint>, AppError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let checkpoint: IngestionCheckpoint = serde_json::from_slice(&raw).map_err(|e| {
            AppError::Checkpoint(format!("{} is not a valid checkpoint: {}", self.path.display(), e))
        })?;
        debug!(
            "Loaded checkpoint {} ({} processed)",
            self.path.display(),
            checkpoint.processed.len()
        );
        Ok(Some(checkpoint))
    }

    pub async fn save(&self, checkpoint: &IngestionCheckpoint) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(checkpoint)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            warn!("Failed to move checkpoint into place: {}", e);
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), AppError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_checkpoint_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("cp.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nested").join("cp.json"));

        let mut checkpoint = IngestionCheckpoint::new();
        checkpoint.mark_processed("SPY.US");
        checkpoint.api_calls_used = 7;
        store.save(&checkpoint).await.unwrap();

        assert!(!store.temp_path().exists());
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, checkpoint);

        store.delete().await.unwrap();
        assert!(!store.path().exists());
        store.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = CheckpointStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, AppError::Checkpoint(_)));
    }
}
