//! In-memory [`LogStore`] implementation for tests and embedded use.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`. Appends hold the
//! write lock for the whole append-and-evict step.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::LogEntry;

use super::{apply_retention, LogStore, MAX_LOG_ENTRIES};

/// In-memory log store.
pub struct InMemoryLogStore {
    entries: RwLock<Vec<LogEntry>>,
    cap: usize,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::with_cap(MAX_LOG_ENTRIES)
    }

    /// Creates a store that keeps at most `cap` entries.
    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            cap,
        }
    }
}

impl Default for InMemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn append(&self, entries: Vec<LogEntry>) -> Result<usize> {
        let mut stored = self
            .entries
            .write()
            .map_err(|_| anyhow!("log store lock poisoned"))?;
        stored.extend(entries);
        apply_retention(&mut stored, self.cap);
        Ok(stored.len())
    }

    async fn list(&self) -> Result<Vec<LogEntry>> {
        let stored = self
            .entries
            .read()
            .map_err(|_| anyhow!("log store lock poisoned"))?;
        Ok(stored.clone())
    }

    async fn clear(&self) -> Result<()> {
        let mut stored = self
            .entries
            .write()
            .map_err(|_| anyhow!("log store lock poisoned"))?;
        stored.clear();
        Ok(())
    }
}
