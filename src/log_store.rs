//! JSON-file-backed [`LogStore`].
//!
//! The whole history is one JSON array on disk. Appends and clears take
//! an async mutex around the read-modify-write cycle, write the new
//! array to a sibling `.tmp` file, and rename it over the original, so a
//! concurrent `list` sees either the old or the new array, never a
//! partial one. `list` does not take the lock.
//!
//! A missing file reads as an empty history. A file that does not parse
//! is logged and also treated as empty; the next append replaces it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use pharmaguard_core::models::LogEntry;
use pharmaguard_core::store::{apply_retention, LogStore, MAX_LOG_ENTRIES};

use crate::config::StorageConfig;

pub struct FileLogStore {
    path: PathBuf,
    cap: usize,
    write_lock: Mutex<()>,
}

impl FileLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_cap(path, MAX_LOG_ENTRIES)
    }

    pub fn with_cap(path: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            path: path.into(),
            cap,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::with_cap(config.log_path.clone(), config.max_entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read_entries(&self) -> Result<Vec<LogEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read log file: {}", self.path.display()))
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "log file is corrupt, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn write_entries(&self, entries: &[LogEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create log dir: {}", parent.display()))?;
        }

        let json = serde_json::to_vec_pretty(entries).context("Failed to serialize log entries")?;
        let staging = self.staging_path();
        tokio::fs::write(&staging, json)
            .await
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn append(&self, entries: Vec<LogEntry>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.read_entries().await?;
        stored.extend(entries);
        apply_retention(&mut stored, self.cap);
        self.write_entries(&stored).await?;
        Ok(stored.len())
    }

    async fn list(&self) -> Result<Vec<LogEntry>> {
        self.read_entries().await
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_entries(&[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharmaguard_core::models::AnalysisResult;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(id: &str) -> LogEntry {
        LogEntry {
            id: id.to_string(),
            patient_label: "PATIENT_1".to_string(),
            logged_at: "2026-01-01T00:00:00.000Z".to_string(),
            result: AnalysisResult {
                drug: "WARFARIN".to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_missing_file_lists_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileLogStore::new(dir.path().join("logs.json"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("logs.json");

        let store = FileLogStore::new(&path);
        assert_eq!(store.append(vec![entry("a"), entry("b")]).await.unwrap(), 2);
        assert_eq!(store.append(vec![entry("c")]).await.unwrap(), 3);

        let reopened = FileLogStore::new(&path);
        let ids: Vec<String> = reopened
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(!store.staging_path().exists());
    }

    #[tokio::test]
    async fn test_retention_drops_oldest() {
        let dir = TempDir::new().unwrap();
        let store = FileLogStore::new(dir.path().join("logs.json"));
        let batch: Vec<LogEntry> = (0..1000).map(|i| entry(&i.to_string())).collect();
        store.append(batch).await.unwrap();
        assert_eq!(store.append(vec![entry("new")]).await.unwrap(), 1000);

        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 1000);
        assert_eq!(entries[0].id, "1");
        assert_eq!(entries[999].id, "new");
    }

    #[tokio::test]
    async fn test_clear_then_list() {
        let dir = TempDir::new().unwrap();
        let store = FileLogStore::new(dir.path().join("logs.json"));
        store.clear().await.unwrap();
        store.append(vec![entry("a")]).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_treated_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");
        std::fs::write(&path, "[{broken").unwrap();

        let store = FileLogStore::new(&path);
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.append(vec![entry("a")]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileLogStore::new(dir.path().join("logs.json")));

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(vec![entry(&format!("e{}", i))]).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.list().await.unwrap().len(), 20);
    }
}
