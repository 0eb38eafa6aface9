//! Cache Statistics Module
//!
//! Tracks cache read outcomes and writes for diagnostics.

use serde::Serialize;

// == Cache Stats ==
/// Counters for one cache instance. Process-local, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads that returned a payload
    pub hits: u64,
    /// Reads that returned nothing (absent, expired, corrupt or unreadable)
    pub misses: u64,
    /// Entries deleted on read because they outlived the TTL
    pub expired: u64,
    /// Entries deleted on read because they could not be decoded
    pub corrupt: u64,
    /// Successful writes
    pub writes: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Counts an expired entry; the read itself is also a miss.
    pub fn record_expired(&mut self) {
        self.expired += 1;
        self.misses += 1;
    }

    /// Counts a corrupt entry; the read itself is also a miss.
    pub fn record_corrupt(&mut self) {
        self.corrupt += 1;
        self.misses += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats, CacheStats::default());
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_expired_and_corrupt_are_misses() {
        let mut stats = CacheStats::new();
        stats.record_expired();
        stats.record_corrupt();
        stats.record_hit();

        assert_eq!(stats.misses, 2);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.corrupt, 1);
        assert!((stats.hit_rate() - 1.0 / 3.0).abs() < f64::EPSILON);
    }
}
