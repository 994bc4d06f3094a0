//! # Transient Artifacts
//!
//! A downloaded, transformed record set waiting for its upload job. Each artifact
//! is written once by a download worker and deleted by the upload worker that
//! consumes it; names embed the config id, process, a timestamp and a random
//! suffix so no two jobs ever share one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::errors::{StoreError, StoreResult};
use crate::models::ProcessType;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save(&self, name: &str, payload: &serde_json::Value) -> StoreResult<()>;

    async fn load(&self, name: &str) -> StoreResult<serde_json::Value>;

    /// `Ok(false)` when there was nothing to delete
    async fn delete(&self, name: &str) -> StoreResult<bool>;

    async fn exists(&self, name: &str) -> StoreResult<bool>;
}

pub fn artifact_name(config_id: &str, process: ProcessType) -> String {
    format!(
        "{}-{}-{}-{}.json",
        config_id,
        process,
        Utc::now().format("%Y%m%dT%H%M%S%3f"),
        &uuid::Uuid::new_v4().simple().to_string()[..12]
    )
}

/// Artifacts as JSON files in one directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub async fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> StoreResult<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StoreError::InvalidArtifactName {
                name: name.to_string(),
            });
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn save(&self, name: &str, payload: &serde_json::Value) -> StoreResult<()> {
        let path = self.path_for(name)?;
        let bytes = serde_json::to_vec(payload)?;
        // Write then rename so a reader never sees a partial file
        let tmp = self.root.join(format!(".{name}.tmp"));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        debug!(artifact = %name, bytes = bytes.len(), "Artifact saved");
        Ok(())
    }

    async fn load(&self, name: &str) -> StoreResult<serde_json::Value> {
        let path = self.path_for(name)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::ArtifactNotFound {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(artifact = %name, "Artifact deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn exists(&self, name: &str) -> StoreResult<bool> {
        let path = self.path_for(name)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names_are_unique_and_prefixed() {
        let a = artifact_name("cfg1", ProcessType::DataDownload);
        let b = artifact_name("cfg1", ProcessType::DataDownload);
        assert_ne!(a, b);
        assert!(a.starts_with("cfg1-data-download-"));
        assert!(a.ends_with(".json"));
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).await.unwrap();
        let name = artifact_name("cfg", ProcessType::DataDownload);
        let payload = serde_json::json!({"dataValues": [{"value": "1"}]});

        store.save(&name, &payload).await.unwrap();
        assert!(store.exists(&name).await.unwrap());
        assert_eq!(store.load(&name).await.unwrap(), payload);

        assert!(store.delete(&name).await.unwrap());
        assert!(!store.delete(&name).await.unwrap());
        assert!(matches!(
            store.load(&name).await,
            Err(StoreError::ArtifactNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).await.unwrap();
        for name in ["../etc/passwd", "a/b.json", "", ".hidden"] {
            assert!(matches!(
                store.load(name).await,
                Err(StoreError::InvalidArtifactName { .. })
            ));
        }
    }
}
