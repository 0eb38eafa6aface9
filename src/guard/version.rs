//! Version Guard
//!
//! One-shot boot check that wipes client-held state when the application
//! version changes.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::cache::clear_namespace;
use crate::config::Config;
use crate::storage::{KeyValueStore, ResponseCacheRegistry, SessionStore, WorkerRegistry};
use crate::tasks::{
    spawn_response_cache_deletion, spawn_worker_unregistration, CleanupSummary, PendingCleanup,
};

// == Storage Surfaces ==
/// The host storage surfaces a purge acts on.
#[derive(Clone)]
pub struct StorageSurfaces {
    /// Origin key-value store holding cache entries and the version marker
    pub local: Arc<dyn KeyValueStore>,
    /// Session-scoped store, wiped in full
    pub session: Arc<dyn SessionStore>,
    /// Background worker registry
    pub workers: Arc<dyn WorkerRegistry>,
    /// Named response cache registry
    pub response_caches: Arc<dyn ResponseCacheRegistry>,
}

impl fmt::Debug for StorageSurfaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSurfaces").finish_non_exhaustive()
    }
}

// == Guard State ==
/// Steps of a guard run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Check,
    Match,
    Stale,
    Purging,
    Done,
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GuardState::Check => "check",
            GuardState::Match => "match",
            GuardState::Stale => "stale",
            GuardState::Purging => "purging",
            GuardState::Done => "done",
        };
        f.write_str(name)
    }
}

// == Outcome ==
/// Result of the synchronous part of a purge, plus handles to the rest.
#[derive(Debug)]
pub struct PurgeReport {
    /// Marker found in storage, if any
    pub previous_version: Option<String>,
    /// Cache entries removed, or `None` if the store could not be listed
    pub cache_entries_removed: Option<usize>,
    pub session_cleared: bool,
    pub marker_written: bool,
    /// Worker and response-cache cleanup still running in the background
    pub pending: PendingCleanup,
}

/// What a guard run did. Safe to ignore.
#[derive(Debug)]
pub enum GuardOutcome {
    /// Stored marker matched; nothing was touched
    Current,
    /// Marker was missing or different; client state was purged
    Purged(PurgeReport),
}

impl GuardOutcome {
    pub fn purged(&self) -> bool {
        matches!(self, GuardOutcome::Purged(_))
    }

    /// Waits for background cleanup, if any was started.
    pub async fn wait_for_cleanup(self) -> Option<CleanupSummary> {
        match self {
            GuardOutcome::Current => None,
            GuardOutcome::Purged(report) => Some(report.pending.wait().await),
        }
    }
}

// == Version Guard ==
/// Compares the stored version marker against the running version and purges
/// client state on mismatch.
///
/// `run` consumes the guard, so each guard runs once.
#[derive(Debug)]
pub struct VersionGuard {
    surfaces: StorageSurfaces,
    current_version: String,
    marker_key: String,
}

impl VersionGuard {
    pub fn new(
        surfaces: StorageSurfaces,
        current_version: impl Into<String>,
        marker_key: impl Into<String>,
    ) -> Self {
        Self {
            surfaces,
            current_version: current_version.into(),
            marker_key: marker_key.into(),
        }
    }

    pub fn from_config(surfaces: StorageSurfaces, config: &Config) -> Self {
        Self::new(surfaces, &config.app_version, &config.marker_key)
    }

    // == Run ==
    /// Runs the check and, on mismatch, the purge.
    ///
    /// Local steps complete before this returns. Worker unregistration and
    /// response-cache deletion are spawned on the current tokio runtime and
    /// not awaited; without a runtime they are skipped. The new marker is
    /// written once every step has been started. No failure is returned.
    pub fn run(self) -> GuardOutcome {
        let mut state = GuardState::Check;

        let stored = match self.surfaces.local.get_item(&self.marker_key) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Could not read version marker, treating as missing: {}", e);
                None
            }
        };

        if stored.as_deref() == Some(self.current_version.as_str()) {
            transition(&mut state, GuardState::Match);
            transition(&mut state, GuardState::Done);
            debug!("Client state is current for version {}", self.current_version);
            return GuardOutcome::Current;
        }

        transition(&mut state, GuardState::Stale);
        info!(
            "Version changed from {} to {}, purging client state",
            stored.as_deref().unwrap_or("<none>"),
            self.current_version
        );

        transition(&mut state, GuardState::Purging);
        let cache_entries_removed = self.purge_cache_entries();
        let session_cleared = self.purge_session();
        let pending = self.start_background_cleanup();

        transition(&mut state, GuardState::Done);
        let marker_written = self.write_marker();

        GuardOutcome::Purged(PurgeReport {
            previous_version: stored,
            cache_entries_removed,
            session_cleared,
            marker_written,
            pending,
        })
    }

    fn purge_cache_entries(&self) -> Option<usize> {
        match clear_namespace(self.surfaces.local.as_ref()) {
            Ok(removed) => {
                debug!("Purged {} cache entries", removed);
                Some(removed)
            }
            Err(e) => {
                warn!("Cache entry purge failed: {}", e);
                None
            }
        }
    }

    fn purge_session(&self) -> bool {
        match self.surfaces.session.clear() {
            Ok(()) => true,
            Err(e) => {
                warn!("Session storage purge failed: {}", e);
                false
            }
        }
    }

    fn start_background_cleanup(&self) -> PendingCleanup {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("No async runtime, skipping worker and response cache cleanup: {}", e);
                return PendingCleanup::none();
            }
        };

        PendingCleanup::new(
            Some(spawn_worker_unregistration(
                &runtime,
                self.surfaces.workers.clone(),
            )),
            Some(spawn_response_cache_deletion(
                &runtime,
                self.surfaces.response_caches.clone(),
            )),
        )
    }

    fn write_marker(&self) -> bool {
        match self
            .surfaces
            .local
            .set_item(&self.marker_key, &self.current_version)
        {
            Ok(()) => {
                info!("Recorded version marker {}", self.current_version);
                true
            }
            Err(e) => {
                // Next boot sees the stale marker and purges again
                warn!("Failed to record version marker: {}", e);
                false
            }
        }
    }
}

fn transition(state: &mut GuardState, next: GuardState) {
    debug!("Version guard: {} -> {}", state, next);
    *state = next;
}
