//! Cache Module
//!
//! Provides a namespaced key-value cache with lazy TTL expiration.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::{clear_namespace, TtlCache};

// == Public Constants ==
/// Prefix marking a stored key as a cache entry
pub const CACHE_PREFIX: &str = "cache_";

// == Key Helpers ==
/// Maps a logical cache key to the key it is stored under.
pub fn physical_key(key: &str) -> String {
    format!("{}{}", CACHE_PREFIX, key)
}

/// Returns true if a stored key belongs to the cache namespace.
pub fn is_cache_key(stored_key: &str) -> bool {
    stored_key.starts_with(CACHE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_key() {
        assert_eq!(physical_key("user"), "cache_user");
        assert!(is_cache_key(&physical_key("user")));
        assert!(!is_cache_key("app_version"));
        assert!(!is_cache_key("cache"));
    }
}
