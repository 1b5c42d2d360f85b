//! Dedup Cache
//!
//! The coordination structure preventing duplicate concurrent jobs for the
//! same normalized URL. A key maps to either an in-flight job handle or a
//! completed report with a freshness deadline; `lookup`/`reserve`/`complete`
//! behave like a single atomic check-and-set per key, so concurrent
//! submissions for one URL can never create two jobs.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::engine::aggregator::CompositeReport;
use crate::engine::handle::JobHandle;

/// Errors from dedup-cache operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Another submission raced and reserved the key first. The coordinator
    /// recovers by joining the existing job; submitters never see this.
    #[error("key already reserved")]
    AlreadyReserved,

    /// Infrastructure fault in the cache backend. The coordinator degrades
    /// by bypassing dedup rather than failing the submission.
    #[error("dedup cache unavailable: {0}")]
    Unavailable(String),
}

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// A completed report within its freshness window
    Fresh(Arc<CompositeReport>),
    /// A job for this key is currently running; join it
    InFlight(JobHandle),
    /// No live entry for this key
    Absent,
}

/// The dedup-cache contract consumed by the coordinator.
///
/// Implementations must make `reserve` atomic per key with respect to
/// concurrent callers; a coarse global lock that serializes unrelated URLs
/// is not an acceptable implementation.
#[async_trait]
pub trait DedupCache: Send + Sync {
    /// Classify the key as fresh, in-flight, or absent. Entries past their
    /// freshness deadline are reported absent.
    async fn lookup(&self, key: &str) -> Result<CacheLookup, CacheError>;

    /// Atomically transition Absent -> InFlight for the key.
    ///
    /// # Errors
    ///
    /// [`CacheError::AlreadyReserved`] when a live entry (in-flight or still
    /// fresh) already exists.
    async fn reserve(&self, key: &str, handle: JobHandle) -> Result<(), CacheError>;

    /// Atomically transition InFlight -> Fresh with the given TTL. Sole
    /// writer of terminal reports.
    async fn complete(
        &self,
        key: &str,
        report: Arc<CompositeReport>,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drop an in-flight reservation that will never complete (the job was
    /// cancelled before producing a report). Fresh entries are left alone.
    async fn evict(&self, key: &str);
}

enum CacheEntry {
    InFlight(JobHandle),
    Fresh {
        report: Arc<CompositeReport>,
        expires_at: Instant,
    },
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        match self {
            Self::InFlight(_) => false,
            Self::Fresh { expires_at, .. } => *expires_at <= now,
        }
    }
}

/// In-process dedup cache over a concurrent map.
///
/// Per-key atomicity comes from the map's entry API; unrelated keys never
/// contend. Expired entries are treated as absent on read and additionally
/// swept by [`MemoryDedupCache::spawn_purge_task`].
#[derive(Default)]
pub struct MemoryDedupCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryDedupCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of live (unexpired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| !e.value().is_expired(now))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all expired report entries.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!("purged {purged} expired report entries from dedup cache");
        }
    }

    /// Start a background task sweeping expired entries on an interval.
    pub fn spawn_purge_task(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                self.purge_expired();
            }
        })
    }
}

#[async_trait]
impl DedupCache for MemoryDedupCache {
    async fn lookup(&self, key: &str) -> Result<CacheLookup, CacheError> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) => match entry.value() {
                CacheEntry::InFlight(handle) => Ok(CacheLookup::InFlight(handle.clone())),
                CacheEntry::Fresh { report, expires_at } => {
                    if *expires_at <= now {
                        Ok(CacheLookup::Absent)
                    } else {
                        Ok(CacheLookup::Fresh(Arc::clone(report)))
                    }
                }
            },
            None => Ok(CacheLookup::Absent),
        }
    }

    async fn reserve(&self, key: &str, handle: JobHandle) -> Result<(), CacheError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(CacheEntry::InFlight(handle));
                    Ok(())
                } else {
                    Err(CacheError::AlreadyReserved)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::InFlight(handle));
                Ok(())
            }
        }
    }

    async fn complete(
        &self,
        key: &str,
        report: Arc<CompositeReport>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            CacheEntry::Fresh {
                report,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn evict(&self, key: &str) {
        self.entries
            .remove_if(key, |_, entry| matches!(entry, CacheEntry::InFlight(_)));
    }
}
