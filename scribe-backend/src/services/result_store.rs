//! Durable keyed store for result documents
//!
//! One pretty-printed JSON file per resource key: `<dir>/<stem>.json`, where
//! `stem` is the resource key without its extension (`lecture.mp3` →
//! `lecture.json`). Writes go to a temporary file in the same directory and
//! are renamed into place, so readers see either the old or the new document.
//!
//! Keys sharing a stem share a file; a document is only returned for the key
//! recorded inside it.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::ResultDocument;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Stored document {path} is unreadable: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Invalid resource key: {0}")]
    InvalidKey(String),
}

/// Keyed document store
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Replace any document under `resource_key`
    ///
    /// Assigns `created_at` and returns the document as stored.
    async fn save(
        &self,
        resource_key: &str,
        document: ResultDocument,
    ) -> Result<ResultDocument, StoreError>;

    /// Load the document under `resource_key`, `None` if there is none
    async fn load(&self, resource_key: &str) -> Result<Option<ResultDocument>, StoreError>;

    async fn exists(&self, resource_key: &str) -> bool {
        matches!(self.load(resource_key).await, Ok(Some(_)))
    }
}

/// File-backed [`ResultStore`]
pub struct FileResultStore {
    dir: PathBuf,
}

impl FileResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the document for `resource_key`
    pub fn path_for(&self, resource_key: &str) -> Result<PathBuf, StoreError> {
        let stem = Path::new(resource_key)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty() && *s != "..")
            .ok_or_else(|| StoreError::InvalidKey(resource_key.to_string()))?;
        if resource_key.contains(['/', '\\']) {
            return Err(StoreError::InvalidKey(resource_key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", stem)))
    }
}

#[async_trait]
impl ResultStore for FileResultStore {
    async fn save(
        &self,
        resource_key: &str,
        mut document: ResultDocument,
    ) -> Result<ResultDocument, StoreError> {
        let path = self.path_for(resource_key)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        document.resource_key = resource_key.to_string();
        document.created_at = Utc::now();
        let json = serde_json::to_vec_pretty(&document)?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.json");
        let temp_path = self
            .dir
            .join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        if let Err(source) = tokio::fs::write(&temp_path, &json).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Io {
                path: temp_path,
                source,
            });
        }

        if let Err(source) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Io { path, source });
        }

        tracing::info!(
            resource_key,
            path = %path.display(),
            segments = document.segments.len(),
            "Transcript saved"
        );

        Ok(document)
    }

    async fn load(&self, resource_key: &str) -> Result<Option<ResultDocument>, StoreError> {
        let path = self.path_for(resource_key)?;

        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let document: ResultDocument =
            serde_json::from_slice(&content).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?;

        if document.resource_key != resource_key {
            tracing::debug!(
                resource_key,
                stored_key = %document.resource_key,
                path = %path.display(),
                "Stored transcript belongs to another file"
            );
            return Ok(None);
        }

        Ok(Some(document))
    }
}
