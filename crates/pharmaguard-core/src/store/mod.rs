//! Analysis history storage abstraction.
//!
//! The [`LogStore`] trait is the single seam between the orchestrator and
//! the persisted history. Implementations own their synchronization:
//! appends from concurrent requests must never interleave their
//! read-modify-write cycles, and readers must never see a half-written
//! sequence.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::LogEntry;

/// Maximum number of entries retained in the history.
pub const MAX_LOG_ENTRIES: usize = 1000;

/// Ordered, bounded history of analysis results.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`append`](LogStore::append) | Add entries at the end, evicting the oldest past the cap |
/// | [`list`](LogStore::list) | Return every entry, oldest first |
/// | [`clear`](LogStore::clear) | Remove every entry |
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Appends `entries` in order and returns the resulting length.
    async fn append(&self, entries: Vec<LogEntry>) -> Result<usize>;

    /// Returns the full history. An empty or never-written store yields `[]`.
    async fn list(&self) -> Result<Vec<LogEntry>>;

    /// Removes every entry. Succeeds when nothing was stored.
    async fn clear(&self) -> Result<()>;
}

/// Drops the oldest entries so that at most `cap` remain.
pub fn apply_retention(entries: &mut Vec<LogEntry>, cap: usize) {
    if entries.len() > cap {
        let excess = entries.len() - cap;
        entries.drain(..excess);
    }
}
