//! Configuration Module
//!
//! Handles loading the cache and guard configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::cache::is_cache_key;

/// Default entry lifetime: 5 minutes.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Reserved storage key holding the last-seen application version.
pub const DEFAULT_MARKER_KEY: &str = "app_version";

/// Typical per-origin storage limit.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Cache and guard configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum age of a cache entry before reads treat it as absent
    pub ttl: Duration,
    /// Version of the running application, compared against the stored marker
    pub app_version: String,
    /// Storage key of the version marker
    pub marker_key: String,
    /// Backing file for the origin key-value store (boot binary only)
    pub storage_path: PathBuf,
    /// Byte quota for the origin key-value store
    pub quota_bytes: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_SECS` - Entry lifetime in seconds (default: 300)
    /// - `APP_VERSION` - Running application version (default: crate version)
    /// - `VERSION_MARKER_KEY` - Marker storage key (default: `app_version`)
    /// - `STORAGE_PATH` - Origin store file (default: `origin_storage.json`)
    /// - `STORAGE_QUOTA_BYTES` - Origin store quota (default: 5 MiB)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl: env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            app_version: env::var("APP_VERSION")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.app_version),
            marker_key: env::var("VERSION_MARKER_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .map(marker_key_or_default)
                .unwrap_or(defaults.marker_key),
            storage_path: env::var("STORAGE_PATH")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            quota_bytes: env::var("STORAGE_QUOTA_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.quota_bytes),
        }
    }
}

/// Rejects marker keys inside the cache namespace, which a cache clear would
/// delete and so force a purge on every boot.
fn marker_key_or_default(key: String) -> String {
    if is_cache_key(&key) {
        warn!(
            "VERSION_MARKER_KEY '{}' collides with the cache namespace, using '{}'",
            key, DEFAULT_MARKER_KEY
        );
        DEFAULT_MARKER_KEY.to_string()
    } else {
        key
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            marker_key: DEFAULT_MARKER_KEY.to_string(),
            storage_path: PathBuf::from("origin_storage.json"),
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}
