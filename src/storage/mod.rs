//! Persistence layer.
//!
//! Transaction history is expensive to fetch (one RPC call per signature,
//! rate limited), so pages are cached per account in a JSON file. Entries
//! older than the TTL are treated as absent.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{HistoryPage, ReelError};

/// Default cache file path.
pub const DEFAULT_CACHE_FILE: &str = "reelbank_history.json";

/// One cached history page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub page: HistoryPage,
    pub fetched_at: DateTime<Utc>,
}

/// TTL cache of history pages keyed by account identity.
#[derive(Debug)]
pub struct HistoryCache {
    path: Option<PathBuf>,
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl HistoryCache {
    /// Cache that lives only in memory.
    pub fn in_memory(ttl_secs: u64) -> Self {
        Self {
            path: None,
            ttl: ttl_duration(ttl_secs),
            entries: HashMap::new(),
        }
    }

    /// Open a file-backed cache. A missing file starts empty; entries that
    /// expired while the process was down are dropped.
    pub fn open(path: &str, ttl_secs: u64) -> Result<Self> {
        let entries = if Path::new(path).exists() {
            let json = std::fs::read_to_string(path)
                .context(format!("Failed to read history cache from {path}"))?;
            let entries: HashMap<String, CacheEntry> = serde_json::from_str(&json)
                .context(format!("Failed to parse history cache from {path}"))?;
            info!(path, accounts = entries.len(), "History cache loaded from disk");
            entries
        } else {
            info!(path, "No history cache found, starting empty");
            HashMap::new()
        };

        let mut cache = Self {
            path: Some(PathBuf::from(path)),
            ttl: ttl_duration(ttl_secs),
            entries,
        };
        let expired = cache.prune()?;
        if expired > 0 {
            info!(path, expired, "Dropped expired history pages");
        }
        Ok(cache)
    }

    /// The cached page for `key` if it is younger than the TTL at `now`.
    pub fn fresh_at(&self, key: &str, now: DateTime<Utc>) -> Result<HistoryPage, ReelError> {
        match self.entries.get(key) {
            Some(entry) if now - entry.fetched_at < self.ttl => Ok(entry.page.clone()),
            _ => Err(ReelError::StaleCache),
        }
    }

    pub fn fresh(&self, key: &str) -> Result<HistoryPage, ReelError> {
        self.fresh_at(key, Utc::now())
    }

    /// Store a freshly fetched page and persist.
    pub fn put(&mut self, key: &str, page: HistoryPage) -> Result<()> {
        self.put_at(key, page, Utc::now())
    }

    pub fn put_at(&mut self, key: &str, page: HistoryPage, fetched_at: DateTime<Utc>) -> Result<()> {
        debug!(key, events = page.events.len(), truncated = page.truncated, "History cached");
        self.entries.insert(key.to_string(), CacheEntry { page, fetched_at });
        self.save()
    }

    /// Drop the entry for `key` (after a deposit or withdrawal).
    pub fn invalidate(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            debug!(key, "History cache invalidated");
            self.save()?;
        }
        Ok(())
    }

    /// Remove every entry past its TTL.
    pub fn prune(&mut self) -> Result<usize> {
        let now = Utc::now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, e| now - e.fetched_at < ttl);
        let removed = before - self.entries.len();
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.entries)
            .context("Failed to serialise history cache")?;
        std::fs::write(path, &json)
            .context(format!("Failed to write history cache to {}", path.display()))?;
        Ok(())
    }
}

fn ttl_duration(secs: u64) -> Duration {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000);
    Duration::seconds(secs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
