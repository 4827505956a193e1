//! Flush: delete remote cache entries older than the TTL.

use crate::error::CachetResult;
use crate::storage::{FileEntry, Storage};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct Flusher {
    storage: Arc<Storage>,
    ttl: Duration,
}

impl Flusher {
    pub fn new(storage: Arc<Storage>, ttl: Duration) -> Self {
        Self { storage, ttl }
    }

    /// Sweep every entry under `prefix`, deleting those last modified
    /// before `now - ttl`. The first deletion error aborts the sweep.
    pub async fn flush(&self, prefix: &str) -> CachetResult<()> {
        info!(prefix, "flushing expired cache entries");

        let entries = self.storage.list(prefix).await?;
        let now = Utc::now();
        let mut removed = 0usize;

        for entry in &entries {
            if is_expired(entry, self.ttl, now) {
                debug!(path = %entry.path, modified = %entry.last_modified, "deleting expired entry");
                self.storage.delete(&entry.path).await?;
                removed += 1;
            }
        }

        info!(scanned = entries.len(), removed, "flush finished");
        Ok(())
    }
}

/// Whether an entry's age exceeds the TTL at instant `now`.
fn is_expired(entry: &FileEntry, ttl: Duration, now: DateTime<Utc>) -> bool {
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => now > entry.last_modified + ttl,
        Err(_) => false, // a TTL beyond representable time never expires
    }
}
