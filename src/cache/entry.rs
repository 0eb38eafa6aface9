//! Cache Entry Module
//!
//! Defines the stored record for a cache entry and its age/expiry rules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A cached payload plus the time it was written.
///
/// Serialized as `{"data": ..., "timestamp": <unix ms>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached payload
    pub data: T,
    /// Write time (Unix milliseconds)
    pub timestamp: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry written at `timestamp`.
    pub fn new(data: T, timestamp: u64) -> Self {
        Self { data, timestamp }
    }

    // == Age ==
    /// Milliseconds elapsed since the write. A timestamp ahead of `now`
    /// (clock skew) counts as age zero.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    // == Is Expired ==
    /// Checks if the entry has outlived `ttl`.
    ///
    /// Boundary condition: an entry whose age equals the TTL exactly is still
    /// valid; it expires one millisecond later.
    pub fn is_expired(&self, now: u64, ttl: Duration) -> bool {
        u128::from(self.age_ms(now)) > ttl.as_millis()
    }
}
