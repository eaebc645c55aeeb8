//! Progress persistence behind a pluggable key/value adapter
//!
//! Adapters are a plain read/write/delete/exists contract over string
//! keys. The file adapter keeps one JSON file per key under
//! `~/.config/devlink/`.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::skills::{UserProgress, MODULE_GREEN};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration directory not found")]
    NoConfigDir,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Key/value persistence contract
///
/// Backed by any durable or volatile medium; the pairing/task core
/// never touches this.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn read(&self, key: &str) -> StorageResult<Option<String>>;
    async fn write(&self, key: &str, value: &str) -> StorageResult<()>;
    async fn delete(&self, key: &str) -> StorageResult<()>;
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// In-memory adapter for tests and fallback
#[derive(Default)]
pub struct MemoryAdapter {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }
}

/// File-backed adapter: one JSON file per key
pub struct FileAdapter {
    root: PathBuf,
}

impl FileAdapter {
    /// Adapter rooted at the default config dir (~/.config/devlink)
    pub fn new() -> StorageResult<Self> {
        let config_dir = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
        Self::with_root(config_dir.join("devlink"))
    }

    /// Adapter rooted at a specific directory
    pub fn with_root(root: PathBuf) -> StorageResult<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

#[async_trait]
impl StorageAdapter for FileAdapter {
    async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    async fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        std::fs::write(self.path_for(key), value)?;
        debug!(key = key, "wrote storage entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.path_for(key).exists())
    }
}

const PROGRESS_KEY: &str = "user_progress";

/// Loads and saves user progress through an adapter
///
/// Missing or corrupt records degrade to the default; `save` sanitizes
/// before writing.
pub struct ProgressStore {
    adapter: Box<dyn StorageAdapter>,
}

impl ProgressStore {
    pub fn new(adapter: Box<dyn StorageAdapter>) -> Self {
        Self { adapter }
    }

    /// Load progress, falling back to the default record when missing
    /// or unreadable
    pub async fn load(&self) -> StorageResult<UserProgress> {
        let Some(data) = self.adapter.read(PROGRESS_KEY).await? else {
            return Ok(UserProgress::default());
        };

        match serde_json::from_str::<RawProgress>(&data) {
            Ok(raw) => Ok(raw.sanitize()),
            Err(e) => {
                warn!("failed to parse progress record, starting fresh: {}", e);
                Ok(UserProgress::default())
            }
        }
    }

    /// Sanitize and persist progress
    pub async fn save(&self, progress: &UserProgress) -> StorageResult<()> {
        let mut record = progress.clone();
        if record.unlocked_modules.is_empty() {
            record.unlocked_modules.push(MODULE_GREEN.to_string());
        }
        let json = serde_json::to_string_pretty(&record)?;
        self.adapter.write(PROGRESS_KEY, &json).await
    }

    /// Drop the stored record; the next load returns the default
    pub async fn reset(&self) -> StorageResult<()> {
        self.adapter.delete(PROGRESS_KEY).await
    }

    /// Whether a stored record exists
    pub async fn exists(&self) -> StorageResult<bool> {
        self.adapter.exists(PROGRESS_KEY).await
    }
}

/// Tolerant on-disk shape; individual fields may be absent or wrong
#[derive(Deserialize)]
struct RawProgress {
    #[serde(default)]
    points: u32,
    #[serde(default)]
    unlocked_modules: Vec<String>,
    #[serde(default)]
    available_unlocks: Vec<String>,
    #[serde(default)]
    last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

impl RawProgress {
    fn sanitize(self) -> UserProgress {
        let mut unlocked = self.unlocked_modules;
        if unlocked.is_empty() {
            unlocked.push(MODULE_GREEN.to_string());
        }
        UserProgress {
            points: self.points,
            unlocked_modules: unlocked,
            available_unlocks: self.available_unlocks,
            last_updated: self.last_updated.unwrap_or_else(chrono::Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_missing_returns_default() {
        let store = ProgressStore::new(Box::new(MemoryAdapter::new()));
        assert!(!store.exists().await.unwrap());

        let progress = store.load().await.unwrap();
        assert_eq!(progress.points, 0);
        assert_eq!(progress.unlocked_modules, vec![MODULE_GREEN]);
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let store = ProgressStore::new(Box::new(MemoryAdapter::new()));

        let mut progress = UserProgress::default();
        progress.points = 60;
        store.save(&progress).await.unwrap();

        assert!(store.exists().await.unwrap());
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.points, 60);
    }

    #[tokio::test]
    async fn test_corrupt_record_degrades_to_default() {
        let adapter = MemoryAdapter::new();
        adapter.write(PROGRESS_KEY, "{not json").await.unwrap();

        let store = ProgressStore::new(Box::new(adapter));
        let progress = store.load().await.unwrap();
        assert_eq!(progress.points, 0);
    }

    #[tokio::test]
    async fn test_partial_record_is_sanitized() {
        let adapter = MemoryAdapter::new();
        adapter
            .write(PROGRESS_KEY, r#"{"points": 30}"#)
            .await
            .unwrap();

        let store = ProgressStore::new(Box::new(adapter));
        let progress = store.load().await.unwrap();
        assert_eq!(progress.points, 30);
        assert_eq!(progress.unlocked_modules, vec![MODULE_GREEN]);
    }

    #[tokio::test]
    async fn test_reset_drops_record() {
        let store = ProgressStore::new(Box::new(MemoryAdapter::new()));
        store.save(&UserProgress::default()).await.unwrap();
        store.reset().await.unwrap();
        assert!(!store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_file_adapter_persists_across_instances() {
        let dir = tempdir().unwrap();

        {
            let adapter = FileAdapter::with_root(dir.path().to_path_buf()).unwrap();
            let store = ProgressStore::new(Box::new(adapter));
            let mut progress = UserProgress::default();
            progress.points = 42;
            store.save(&progress).await.unwrap();
        }

        let adapter = FileAdapter::with_root(dir.path().to_path_buf()).unwrap();
        let store = ProgressStore::new(Box::new(adapter));
        assert_eq!(store.load().await.unwrap().points, 42);
    }

    #[tokio::test]
    async fn test_file_adapter_delete() {
        let dir = tempdir().unwrap();
        let adapter = FileAdapter::with_root(dir.path().to_path_buf()).unwrap();

        adapter.write("k", "v").await.unwrap();
        assert!(adapter.exists("k").await.unwrap());
        adapter.delete("k").await.unwrap();
        assert!(!adapter.exists("k").await.unwrap());
        assert_eq!(adapter.read("k").await.unwrap(), None);
    }
}
