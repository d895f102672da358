//! Phone number normalization and deduplication.
//!
//! A [`CanonicalIdentifier`] is an 11-digit string starting with the national
//! trunk prefix `01`. Inputs carrying the `880` country code are accepted and
//! reduced to their trailing 11 digits.

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;
use serde::{Deserialize, Serialize};

/// National trunk prefix every canonical identifier starts with.
pub const TRUNK_PREFIX: &str = "01";
/// Country code accepted (and stripped) on 13-digit inputs.
pub const COUNTRY_CODE: &str = "880";
/// Length of a canonical identifier.
pub const CANONICAL_LEN: usize = 11;

const INTERNATIONAL_LEN: usize = 13;
const DEFAULT_MEMO_CAPACITY: usize = 1_000;

/// A validated, normalized phone number. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalIdentifier(String);

impl CanonicalIdentifier {
    /// Normalize `raw` into a canonical identifier, or `None` if it is not a
    /// valid number.
    pub fn parse(raw: &str) -> Option<Self> {
        normalize(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip every non-digit character and classify the remainder.
///
/// - 11 digits starting with `01` are accepted as-is.
/// - 13 digits starting with `880` lose the leading `88`.
/// - Anything else is rejected.
pub fn normalize(raw: &str) -> Option<CanonicalIdentifier> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    match digits.len() {
        CANONICAL_LEN if digits.starts_with(TRUNK_PREFIX) => Some(CanonicalIdentifier(digits)),
        INTERNATIONAL_LEN if digits.starts_with(COUNTRY_CODE) => {
            Some(CanonicalIdentifier(digits[2..].to_string()))
        }
        _ => None,
    }
}

/// Memoizing wrapper around [`normalize`].
///
/// Upload lists commonly repeat the same raw line many times; the memo keeps
/// the most recent `capacity` decisions.
pub struct Normalizer {
    memo: Mutex<LruCache<String, Option<CanonicalIdentifier>>>,
}

impl Normalizer {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            memo: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn normalize(&self, raw: &str) -> Option<CanonicalIdentifier> {
        if let Some(hit) = self
            .memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(raw)
        {
            return hit.clone();
        }

        let decision = normalize(raw);
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(raw.to_string(), decision.clone());
        decision
    }

    /// Number of memoized decisions currently held.
    pub fn memoized(&self) -> usize {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MEMO_CAPACITY)
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("memoized", &self.memoized())
            .finish()
    }
}

/// Result of [`dedup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduplicated {
    /// Unique identifiers, first occurrence order.
    pub unique: Vec<CanonicalIdentifier>,
    /// How many repeated identifiers were dropped.
    pub duplicates_removed: usize,
}

/// Remove repeated identifiers, keeping the first occurrence of each.
pub fn dedup(ids: impl IntoIterator<Item = CanonicalIdentifier>) -> Deduplicated {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    let mut duplicates_removed = 0usize;

    for id in ids {
        if seen.insert(id.clone()) {
            unique.push(id);
        } else {
            duplicates_removed += 1;
        }
    }

    Deduplicated {
        unique,
        duplicates_removed,
    }
}
