//! Storage Surfaces Module
//!
//! Traits for the host storage surfaces the cache and the version guard act on,
//! plus in-memory and file-backed implementations.
//!
//! # Surfaces
//! - `KeyValueStore` - synchronous origin-scoped string store
//! - `SessionStore` - synchronous session-scoped store that can be wiped
//! - `WorkerRegistry` - asynchronous registry of background workers
//! - `ResponseCacheRegistry` - asynchronous registry of named response caches

mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use file::FileStore;
pub use memory::{MemoryResponseCaches, MemoryStore, MemoryWorkerRegistry};

// == Key-Value Store ==
/// Synchronous string key-value store scoped to one origin.
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value, or `None` when the key is absent.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Lists every key currently stored.
    fn keys(&self) -> Result<Vec<String>>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        (**self).remove_item(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

// == Session Store ==
/// Session-scoped storage. Only a full wipe is needed here.
pub trait SessionStore: Send + Sync {
    fn clear(&self) -> Result<()>;
}

// == Worker Registry ==
/// A registered background worker, identified by its scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerRegistration {
    pub scope: String,
}

impl WorkerRegistration {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

/// Asynchronous registry of background workers.
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    /// Lists the workers registered right now.
    async fn registrations(&self) -> Result<Vec<WorkerRegistration>>;

    /// Requests unregistration. Returns false if the worker was already gone.
    async fn unregister(&self, registration: &WorkerRegistration) -> Result<bool>;
}

// == Response Cache Registry ==
/// Asynchronous registry of named HTTP response caches.
#[async_trait]
pub trait ResponseCacheRegistry: Send + Sync {
    /// Lists the names of every response cache.
    async fn names(&self) -> Result<Vec<String>>;

    /// Deletes the named cache. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool>;
}
