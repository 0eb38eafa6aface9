//! TTL Cache Module
//!
//! Namespaced cache over a `KeyValueStore` with lazy, read-time expiry.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{is_cache_key, physical_key, CacheEntry, CacheStats, CACHE_PREFIX};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::storage::KeyValueStore;

// == Namespace Clear ==
/// Removes every cache-prefixed key from `store`, leaving other keys alone.
///
/// Returns the number of keys removed. Fails only if the keys cannot be listed;
/// individual removal failures are logged and skipped.
pub fn clear_namespace<S: KeyValueStore + ?Sized>(store: &S) -> Result<usize> {
    let mut removed = 0;
    for key in store.keys()?.into_iter().filter(|k| is_cache_key(k)) {
        match store.remove_item(&key) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove cache key {}: {}", key, e),
        }
    }
    Ok(removed)
}

// == TTL Cache ==
/// Key-value cache whose entries expire `ttl` after they are written.
///
/// Expiry is checked when an entry is read; there is no background sweep.
#[derive(Debug)]
pub struct TtlCache<S, C = SystemClock> {
    /// Backing origin store
    store: S,
    /// Time source for write stamps and expiry checks
    clock: C,
    /// Maximum entry age
    ttl: Duration,
    /// Read/write counters
    stats: CacheStats,
}

impl<S: KeyValueStore> TtlCache<S, SystemClock> {
    // == Constructor ==
    /// Creates a cache over `store` using the system clock.
    pub fn new(store: S, ttl: Duration) -> Self {
        Self::with_clock(store, SystemClock, ttl)
    }

    /// Creates a cache over `store` with the configured TTL.
    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store, config.ttl)
    }
}

impl<S: KeyValueStore, C: Clock> TtlCache<S, C> {
    /// Creates a cache with an explicit clock.
    pub fn with_clock(store: S, clock: C, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            stats: CacheStats::new(),
        }
    }

    // == Set ==
    /// Stores `data` under `key`, stamped with the current time.
    ///
    /// Replaces any previous entry for the key. Storage failures such as an
    /// exhausted quota are returned to the caller.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, data: &T) -> Result<()> {
        if key.starts_with(CACHE_PREFIX) {
            return Err(CacheError::InvalidKey(format!(
                "'{}' must not start with the reserved prefix '{}'",
                key, CACHE_PREFIX
            )));
        }

        let entry = CacheEntry::new(data, self.clock.now_ms());
        let encoded = serde_json::to_string(&entry)?;
        self.store.set_item(&physical_key(key), &encoded)?;
        self.stats.record_write();

        Ok(())
    }

    // == Get ==
    /// Returns the payload stored under `key` if it exists and is fresh.
    ///
    /// Expired and malformed entries are deleted and read as `None`. An entry
    /// that is well formed but holds a different type is left in place.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let physical = physical_key(key);

        let raw = match self.store.get_item(&physical) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.stats.record_miss();
                return None;
            }
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                self.stats.record_miss();
                return None;
            }
        };

        // Decode the envelope untyped so a wrong `T` is not mistaken for corruption
        let entry: CacheEntry<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Dropping corrupt cache entry {}: {}", key, e);
                self.discard(&physical);
                self.stats.record_corrupt();
                return None;
            }
        };

        if entry.is_expired(self.clock.now_ms(), self.ttl) {
            debug!("Cache entry {} expired", key);
            self.discard(&physical);
            self.stats.record_expired();
            return None;
        }

        match serde_json::from_value(entry.data) {
            Ok(data) => {
                self.stats.record_hit();
                Some(data)
            }
            Err(e) => {
                warn!("Cache entry {} does not match the requested type: {}", key, e);
                self.stats.record_miss();
                None
            }
        }
    }

    // == Remove ==
    /// Deletes the entry for `key`. Missing keys are ignored.
    pub fn remove(&mut self, key: &str) {
        self.discard(&physical_key(key));
    }

    // == Clear ==
    /// Deletes every cache entry in the store and returns how many were removed.
    ///
    /// Keys outside the cache namespace are left untouched.
    pub fn clear(&mut self) -> usize {
        match clear_namespace(&self.store) {
            Ok(removed) => {
                debug!("Cleared {} cache entries", removed);
                removed
            }
            Err(e) => {
                warn!("Cache clear failed: {}", e);
                0
            }
        }
    }

    // == Stats ==
    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Maximum age an entry may reach and still be returned.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn discard(&self, physical: &str) {
        if let Err(e) = self.store.remove_item(physical) {
            warn!("Failed to remove {}: {}", physical, e);
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use serde::Deserialize;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_millis(300_000);

    fn test_cache() -> (TtlCache<Arc<MemoryStore>, ManualClock>, Arc<MemoryStore>, ManualClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(0);
        let cache = TtlCache::with_clock(store.clone(), clock.clone(), TTL);
        (cache, store, clock)
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        roles: Vec<String>,
    }

    #[test]
    fn test_set_and_get() {
        let (mut cache, store, _) = test_cache();

        cache.set("greeting", "hello").unwrap();

        assert_eq!(cache.get::<String>("greeting"), Some("hello".to_string()));
        assert!(store.contains_key("cache_greeting"));
    }

    #[test]
    fn test_get_nonexistent() {
        let (mut cache, _, _) = test_cache();

        assert_eq!(cache.get::<String>("missing"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_struct_roundtrip() {
        let (mut cache, _, _) = test_cache();
        let profile = Profile {
            name: "ada".to_string(),
            roles: vec!["admin".to_string()],
        };

        cache.set("profile", &profile).unwrap();
        assert_eq!(cache.get::<Profile>("profile"), Some(profile));
    }

    #[test]
    fn test_overwrite_resets_timestamp() {
        let (mut cache, _, clock) = test_cache();

        cache.set("k", &1).unwrap();
        clock.advance(200_000);
        cache.set("k", &2).unwrap();
        clock.advance(200_000);

        // 400s after the first write, 200s after the second
        assert_eq!(cache.get::<i32>("k"), Some(2));
    }

    #[test]
    fn test_ttl_expiration() {
        let (mut cache, store, clock) = test_cache();

        cache.set("k", "v").unwrap();

        clock.set(299_999);
        assert_eq!(cache.get::<String>("k"), Some("v".to_string()));

        clock.set(300_001);
        assert_eq!(cache.get::<String>("k"), None);
        assert!(!store.contains_key("cache_k"), "Expired entry should be deleted");
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_corrupt_entry_self_heals() {
        let (mut cache, store, _) = test_cache();
        store.set_item("cache_broken", "{not json").unwrap();

        assert_eq!(cache.get::<String>("broken"), None);
        assert!(!store.contains_key("cache_broken"));
        assert_eq!(cache.stats().corrupt, 1);
    }

    #[test]
    fn test_mistyped_read_keeps_entry() {
        let (mut cache, store, _) = test_cache();
        cache.set("user", "ada").unwrap();

        assert_eq!(cache.get::<u64>("user"), None);
        assert!(store.contains_key("cache_user"));
        assert_eq!(cache.get::<String>("user"), Some("ada".to_string()));

        let stats = cache.stats();
        assert_eq!(stats.corrupt, 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (mut cache, store, _) = test_cache();

        cache.set("k", "v").unwrap();
        cache.remove("k");
        cache.remove("k");

        assert!(store.is_empty());
        assert_eq!(cache.get::<String>("k"), None);
    }

    #[test]
    fn test_clear_respects_namespace() {
        let (mut cache, store, _) = test_cache();
        cache.set("a", "1").unwrap();
        cache.set("b", "2").unwrap();
        store.set_item("other_c", "3").unwrap();

        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.clear(), 0);

        assert_eq!(store.keys().unwrap(), vec!["other_c".to_string()]);
    }

    #[test]
    fn test_set_rejects_reserved_prefix() {
        let (mut cache, store, _) = test_cache();

        let result = cache.set("cache_nested", "v");
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_propagates_quota_error() {
        let store = MemoryStore::with_quota(16);
        let mut cache = TtlCache::with_clock(store, ManualClock::new(0), TTL);

        let result = cache.set("big", &"x".repeat(64));
        assert!(matches!(result, Err(CacheError::QuotaExceeded(_))));
        assert_eq!(cache.stats().writes, 0);
    }

    #[test]
    fn test_from_config_uses_configured_ttl() {
        let config = Config {
            ttl: Duration::from_secs(5),
            ..Config::default()
        };
        let cache = TtlCache::from_config(MemoryStore::new(), &config);

        assert_eq!(cache.ttl(), Duration::from_secs(5));
    }
}
