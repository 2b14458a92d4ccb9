//! Local audit-log stores.

use super::{validate_user_id, LogEntry, LogStore, LogStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Per-user document holding the audit log.
///
/// Fields other than `logs` are kept as-is when the document is rewritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One JSON document per user under `<root>/users/<user_id>.json`.
#[derive(Debug)]
pub struct JsonLogStore {
    root: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonLogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the document for `user_id`.
    pub fn document_path(&self, user_id: &str) -> Result<PathBuf, LogStoreError> {
        validate_user_id(user_id)?;
        Ok(self.root.join("users").join(format!("{user_id}.json")))
    }

    async fn read_document(path: &Path) -> Result<Option<UserDocument>, LogStoreError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl LogStore for JsonLogStore {
    async fn append(&self, user_id: &str, entry: &LogEntry) -> Result<(), LogStoreError> {
        let path = self.document_path(user_id)?;
        let _guard = self.write_lock.lock().await;

        let mut document = match Self::read_document(&path).await? {
            Some(document) => document,
            None => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tracing::debug!(user = user_id, "creating audit log document");
                UserDocument::default()
            }
        };

        document.logs.push(entry.clone());
        let json = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(&path, json).await?;
        Ok(())
    }

    async fn entries(&self, user_id: &str) -> Result<Vec<LogEntry>, LogStoreError> {
        let path = self.document_path(user_id)?;
        Ok(Self::read_document(&path)
            .await?
            .map(|document| document.logs)
            .unwrap_or_default())
    }
}

/// In-process store, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    users: Mutex<HashMap<String, Vec<LogEntry>>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, user_id: &str, entry: &LogEntry) -> Result<(), LogStoreError> {
        validate_user_id(user_id)?;
        self.users
            .lock()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn entries(&self, user_id: &str) -> Result<Vec<LogEntry>, LogStoreError> {
        Ok(self
            .users
            .lock()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}
