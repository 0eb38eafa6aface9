//! Origin Cache - boot entry point
//!
//! Runs the version guard against a file-backed origin store, then opens the
//! cache the way an application would after boot.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use origin_cache::storage::{
    FileStore, KeyValueStore, MemoryResponseCaches, MemoryStore, MemoryWorkerRegistry,
};
use origin_cache::{Config, GuardOutcome, StorageSurfaces, TtlCache, VersionGuard};

/// Boot sequence.
///
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the origin store
/// 4. Run the version guard before anything reads the cache
/// 5. Wait for background cleanup and report it
/// 6. Open the cache and record this boot
#[tokio::main]
async fn main() {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "origin_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: version={}, ttl={}s, storage={}",
        config.app_version,
        config.ttl.as_secs(),
        config.storage_path.display()
    );

    // Boot continues on an in-memory store rather than failing
    let opened = FileStore::open(&config.storage_path, Some(config.quota_bytes))
        .with_context(|| {
            format!(
                "Failed to open origin store at {}",
                config.storage_path.display()
            )
        });
    let local: Arc<dyn KeyValueStore> = match opened {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("{:#}; using in-memory storage for this run", e);
            Arc::new(MemoryStore::new())
        }
    };

    // A native host has no session, worker or response-cache state of its own
    let surfaces = StorageSurfaces {
        local: local.clone(),
        session: Arc::new(MemoryStore::new()),
        workers: Arc::new(MemoryWorkerRegistry::new()),
        response_caches: Arc::new(MemoryResponseCaches::new()),
    };

    let outcome = VersionGuard::from_config(surfaces, &config).run();
    if let GuardOutcome::Purged(report) = &outcome {
        info!(
            "Purged client state: cache_entries={:?}, session_cleared={}, marker_written={}",
            report.cache_entries_removed, report.session_cleared, report.marker_written
        );
    }
    if let Some(summary) = outcome.wait_for_cleanup().await {
        info!(
            "Background cleanup finished: workers={}/{}, response_caches={}/{}",
            summary.workers.removed,
            summary.workers.found,
            summary.response_caches.removed,
            summary.response_caches.found
        );
    }

    let mut cache = TtlCache::from_config(local, &config);
    match cache.get::<String>("last_boot") {
        Some(at) => info!("Previous boot at {}", at),
        None => info!("No recent boot recorded"),
    }
    match cache.set("last_boot", &Utc::now().to_rfc3339()) {
        Ok(()) => {}
        Err(e) if e.is_quota() => warn!("Origin store is full, boot time not recorded: {}", e),
        Err(e) => warn!("Could not record boot time: {}", e),
    }

    info!("Boot complete: {:?}", cache.stats());
}
