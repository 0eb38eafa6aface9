//! Origin Cache - client-side TTL cache with version-driven invalidation
//!
//! Provides a namespaced key-value cache with lazy expiry and a boot-time
//! guard that purges client storage when the application version changes.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod storage;
pub mod tasks;

pub use cache::TtlCache;
pub use config::Config;
pub use error::{CacheError, Result};
pub use guard::{GuardOutcome, StorageSurfaces, VersionGuard};
