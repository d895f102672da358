//! Result cache: canonical identifier → terminal lookup outcome.
//!
//! # Semantics
//! - Write-once: the first terminal outcome stored for an identifier wins;
//!   later `put`s for a live entry are ignored.
//! - A cached outcome short-circuits the network path entirely, with no
//!   retry accounting.
//!
//! # Eviction
//! - Bounded to `capacity` entries; inserting into a full cache evicts the
//!   least recently used entry.
//! - With `ttl` set, entries older than `ttl` behave as absent and are
//!   dropped on access.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::identifier::CanonicalIdentifier;
use crate::outcome::LookupOutcome;

/// Configuration for [`ResultCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries.
    pub capacity: usize,
    /// Optional time-to-live per entry.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: None,
        }
    }
}

struct Entry {
    outcome: LookupOutcome,
    inserted_at: Instant,
}

/// Thread-safe bounded cache shared by every worker of a run.
pub struct ResultCache {
    ttl: Option<Duration>,
    entries: Mutex<LruCache<CanonicalIdentifier, Entry>>,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl: config.ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl)
    }

    /// Cached outcome for `id`, if present and not expired.
    pub fn get(&self, id: &CanonicalIdentifier) -> Option<LookupOutcome> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(id) {
            None => return None,
            Some(entry) if !self.is_expired(entry) => return Some(entry.outcome.clone()),
            Some(_) => {}
        }
        entries.pop(id);
        None
    }

    /// Store `outcome` for `id` unless a live entry already exists.
    ///
    /// Returns `true` if the outcome was stored.
    pub fn put(&self, id: CanonicalIdentifier, outcome: LookupOutcome) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.peek(&id) {
            if !self.is_expired(existing) {
                return false;
            }
        }
        entries.put(
            id,
            Entry {
                outcome,
                inserted_at: Instant::now(),
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cap()
            .get()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
