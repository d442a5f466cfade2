//! Generation-time record of expiry instants for hashed tokens.
//!
//! A hashed expiration segment cannot be turned back into an instant, so the
//! issuance layer remembers `expiration hash -> instant` and hands the
//! instant to the validator. A missing record means the token is treated as
//! expired.

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Default number of outstanding expiry records kept by [`MemoryLedger`].
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Storage for expiry instants, keyed by expiration segment.
pub trait ExpiryLedger: Send + Sync {
    fn record(&self, expiration_hash: &str, expires_at: DateTime<Utc>);

    fn lookup(&self, expiration_hash: &str) -> Option<DateTime<Utc>>;

    fn forget(&self, expiration_hash: &str);
}

/// Bounded in-process ledger. The least recently used record is evicted
/// when full, which makes its token fail validation as expired.
pub struct MemoryLedger {
    entries: Mutex<LruCache<String, DateTime<Utc>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Drop every record whose instant is before `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, at)| **at < now)
            .map(|(hash, _)| hash.clone())
            .collect();

        for hash in &stale {
            entries.pop(hash);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpiryLedger for MemoryLedger {
    fn record(&self, expiration_hash: &str, expires_at: DateTime<Utc>) {
        self.entries.lock().put(expiration_hash.to_string(), expires_at);
    }

    fn lookup(&self, expiration_hash: &str) -> Option<DateTime<Utc>> {
        self.entries.lock().get(expiration_hash).copied()
    }

    fn forget(&self, expiration_hash: &str) {
        self.entries.lock().pop(expiration_hash);
    }
}
