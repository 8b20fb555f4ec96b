// crates/stac-auth-proxy-filters/src/cache/tests.rs
// ============================================================================
// Module: TTL Memo Cache Unit Tests
// Description: Expiry, eviction, and fingerprint coverage.
// Purpose: Keep memoized policy decisions bounded in time and size.
// Dependencies: super
// ============================================================================

#![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

use std::time::Duration;

use super::TtlCache;
use super::fingerprint;

#[test]
fn fresh_entries_are_returned() {
    let cache = TtlCache::new(Duration::from_secs(60));
    cache.insert(b"Bearer abc", 7_u32);
    assert_eq!(cache.get(b"Bearer abc"), Some(7));
    assert_eq!(cache.get(b"Bearer xyz"), None);
}

#[test]
fn reinsert_replaces_value() {
    let cache = TtlCache::new(Duration::from_secs(60));
    cache.insert(b"k", 1_u32);
    cache.insert(b"k", 2_u32);
    assert_eq!(cache.get(b"k"), Some(2));
    assert_eq!(cache.len(), 1);
}

#[test]
fn expired_entries_are_ignored_and_pruned() {
    let cache = TtlCache::new(Duration::ZERO);
    cache.insert(b"a", 1_u32);
    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(cache.get(b"a"), None);
    cache.insert(b"b", 2_u32);
    assert_eq!(cache.len(), 1);
}

#[test]
fn capacity_evicts_oldest() {
    let cache = TtlCache::with_capacity(Duration::from_secs(60), 2);
    cache.insert(b"first", 1_u32);
    std::thread::sleep(Duration::from_millis(2));
    cache.insert(b"second", 2_u32);
    std::thread::sleep(Duration::from_millis(2));
    cache.insert(b"third", 3_u32);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(b"first"), None);
    assert_eq!(cache.get(b"third"), Some(3));
}

#[test]
fn fingerprint_is_hex_sha256() {
    assert_eq!(
        fingerprint(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
