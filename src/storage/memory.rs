//! In-Memory Storage Module
//!
//! Process-local implementations of every storage surface. Used by tests and by
//! hosts without a persistent origin store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use crate::error::{CacheError, Result};
use crate::storage::{
    KeyValueStore, ResponseCacheRegistry, SessionStore, WorkerRegistration, WorkerRegistry,
};

fn poisoned(what: &str) -> CacheError {
    CacheError::StorageUnavailable(format!("Lock poisoned: {}", what))
}

// == Memory Store ==
/// Key-value store held in a sorted map, with an optional byte quota.
///
/// Quota accounting counts the UTF-8 length of every key plus its value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    /// Creates an empty store with no quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that refuses writes beyond `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.items
            .read()
            .map(|items| items.contains_key(key))
            .unwrap_or(false)
    }
}

/// Bytes used after replacing `key` with `value` in `items`.
pub(crate) fn usage_after(items: &BTreeMap<String, String>, key: &str, value: &str) -> usize {
    let current: usize = items.iter().map(|(k, v)| k.len() + v.len()).sum();
    let replaced = items.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
    current - replaced + key.len() + value.len()
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.read().map_err(|_| poisoned("memory store"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write().map_err(|_| poisoned("memory store"))?;
        if let Some(quota) = self.quota_bytes {
            let used = usage_after(&items, key, value);
            if used > quota {
                return Err(CacheError::QuotaExceeded(format!(
                    "writing '{}' needs {} bytes, quota is {}",
                    key, used, quota
                )));
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write().map_err(|_| poisoned("memory store"))?;
        items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let items = self.items.read().map_err(|_| poisoned("memory store"))?;
        Ok(items.keys().cloned().collect())
    }
}

impl SessionStore for MemoryStore {
    fn clear(&self) -> Result<()> {
        let mut items = self.items.write().map_err(|_| poisoned("memory store"))?;
        items.clear();
        Ok(())
    }
}

// == Memory Worker Registry ==
/// Worker registry holding registrations in a set.
#[derive(Debug, Default)]
pub struct MemoryWorkerRegistry {
    workers: Mutex<BTreeSet<String>>,
}

impl MemoryWorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a worker for `scope`.
    pub fn register(&self, scope: impl Into<String>) {
        if let Ok(mut workers) = self.workers.lock() {
            workers.insert(scope.into());
        }
    }

    /// Number of currently registered workers.
    pub fn len(&self) -> usize {
        self.workers.lock().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WorkerRegistry for MemoryWorkerRegistry {
    async fn registrations(&self) -> Result<Vec<WorkerRegistration>> {
        let workers = self.workers.lock().map_err(|_| poisoned("worker registry"))?;
        Ok(workers.iter().map(WorkerRegistration::new).collect())
    }

    async fn unregister(&self, registration: &WorkerRegistration) -> Result<bool> {
        // Unregistration completes on a later tick
        tokio::task::yield_now().await;
        let mut workers = self.workers.lock().map_err(|_| poisoned("worker registry"))?;
        Ok(workers.remove(&registration.scope))
    }
}

// == Memory Response Caches ==
/// Named response caches, tracked by name only.
#[derive(Debug, Default)]
pub struct MemoryResponseCaches {
    names: Mutex<BTreeSet<String>>,
}

impl MemoryResponseCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (creates) the named cache.
    pub fn open(&self, name: impl Into<String>) {
        if let Ok(mut names) = self.names.lock() {
            names.insert(name.into());
        }
    }

    /// Returns true if the named cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.names.lock().map(|n| n.contains(name)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.names.lock().map(|n| n.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResponseCacheRegistry for MemoryResponseCaches {
    async fn names(&self) -> Result<Vec<String>> {
        let names = self.names.lock().map_err(|_| poisoned("response caches"))?;
        Ok(names.iter().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        tokio::task::yield_now().await;
        let mut names = self.names.lock().map_err(|_| poisoned("response caches"))?;
        Ok(names.remove(name))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();

        store.set_item("a", "1").unwrap();
        assert_eq!(store.get_item("a").unwrap(), Some("1".to_string()));

        store.remove_item("a").unwrap();
        assert_eq!(store.get_item("a").unwrap(), None);

        // Removing a missing key is fine
        store.remove_item("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_keys_sorted() {
        let store = MemoryStore::new();
        store.set_item("b", "2").unwrap();
        store.set_item("a", "1").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(10);

        store.set_item("k", "12345").unwrap(); // 6 bytes
        let result = store.set_item("j", "12345"); // would be 12
        assert!(matches!(result, Err(CacheError::QuotaExceeded(_))));

        // Replacing an existing value only counts the difference
        store.set_item("k", "123456789").unwrap(); // 10 bytes
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_session_clear() {
        let store = MemoryStore::new();
        store.set_item("a", "1").unwrap();
        store.set_item("b", "2").unwrap();

        SessionStore::clear(&store).unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_worker_registry_unregister() {
        let registry = MemoryWorkerRegistry::new();
        registry.register("/app/");
        registry.register("/admin/");

        let regs = registry.registrations().await.unwrap();
        assert_eq!(regs.len(), 2);

        assert!(registry.unregister(&regs[0]).await.unwrap());
        assert!(!registry.unregister(&regs[0]).await.unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_response_caches_delete() {
        let caches = MemoryResponseCaches::new();
        caches.open("static-v1");
        caches.open("api-v1");

        assert_eq!(caches.names().await.unwrap().len(), 2);
        assert!(caches.delete("static-v1").await.unwrap());
        assert!(!caches.has("static-v1"));
        assert!(!caches.delete("missing").await.unwrap());
        assert_eq!(caches.len(), 1);
    }
}
