// crates/stac-auth-proxy-filters/src/cache.rs
// ============================================================================
// Module: TTL Memo Cache
// Description: Bounded, time-limited memoization keyed by content fingerprint.
// Purpose: Avoid repeated policy-engine calls for the same credential.
// Dependencies: arc-swap, sha2
// ============================================================================

//! ## Overview
//! [`TtlCache`] stores values under a SHA-256 fingerprint of the key so raw
//! credentials are never retained. Reads are lock-free snapshots; writes
//! replace the map copy-on-write. Expired entries are pruned on insert and
//! the oldest entries are evicted once [`TtlCache::capacity`] is reached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use arc_swap::ArcSwap;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum number of cached entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Cached value with its insertion time.
#[derive(Debug, Clone)]
struct Entry<V> {
    /// Cached value.
    value: V,
    /// Insertion instant.
    inserted: Instant,
}

/// Time-limited memo cache.
#[derive(Debug)]
pub struct TtlCache<V> {
    /// Entry lifetime.
    ttl: Duration,
    /// Maximum entry count.
    capacity: usize,
    /// Current entry snapshot keyed by fingerprint.
    entries: ArcSwap<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    /// Creates a cache with the default capacity.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a cache holding at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Returns the maximum entry count.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Returns true when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the live value stored for `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<V> {
        let fingerprint = fingerprint(key);
        let snapshot = self.entries.load();
        snapshot
            .get(&fingerprint)
            .filter(|entry| entry.inserted.elapsed() <= self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Stores `value` under `key`.
    pub fn insert(&self, key: &[u8], value: V) {
        let fingerprint = fingerprint(key);
        let ttl = self.ttl;
        let capacity = self.capacity;
        self.entries.rcu(|current| {
            let now = Instant::now();
            let mut next: HashMap<String, Entry<V>> = current
                .iter()
                .filter(|(_, entry)| now.duration_since(entry.inserted) <= ttl)
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect();
            next.remove(&fingerprint);
            while next.len() >= capacity {
                let oldest = next
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        next.remove(&key);
                    }
                    None => break,
                }
            }
            next.insert(
                fingerprint.clone(),
                Entry {
                    value: value.clone(),
                    inserted: now,
                },
            );
            Arc::new(next)
        });
    }
}

// ============================================================================
// SECTION: Fingerprints
// ============================================================================

/// Returns the lowercase hex SHA-256 digest of `bytes`.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push(HEX[usize::from(byte >> 4)] as char);
        out.push(HEX[usize::from(byte & 0x0f)] as char);
    }
    out
}

#[cfg(test)]
mod tests;
