//! Background Cleanup Tasks
//!
//! Fire-and-forget tasks that unregister background workers and delete named
//! response caches. The spawner never waits on them; `PendingCleanup` lets a
//! caller that cares observe completion.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::storage::{ResponseCacheRegistry, WorkerRegistry};

// == Cleanup Tally ==
/// Outcome counts for one cleanup task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupTally {
    /// Items found when the registry was enumerated
    pub found: usize,
    /// Items whose removal request succeeded
    pub removed: usize,
    /// Items whose removal request failed
    pub failed: usize,
    /// False if the registry could not be enumerated at all
    pub enumerated: bool,
}

impl CleanupTally {
    fn unavailable() -> Self {
        Self::default()
    }

    fn from_results<E>(found: usize, results: Vec<Result<bool, E>>) -> Self {
        let removed = results.iter().filter(|r| r.is_ok()).count();
        Self {
            found,
            removed,
            failed: found - removed,
            enumerated: true,
        }
    }
}

/// Combined outcome of both cleanup tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub workers: CleanupTally,
    pub response_caches: CleanupTally,
}

// == Worker Unregistration ==
/// Spawns a task that unregisters every registered worker.
///
/// Unregistration requests run concurrently; a failed request is logged and
/// does not stop the others.
pub fn spawn_worker_unregistration(
    runtime: &Handle,
    workers: Arc<dyn WorkerRegistry>,
) -> JoinHandle<CleanupTally> {
    runtime.spawn(async move {
        let registrations = match workers.registrations().await {
            Ok(registrations) => registrations,
            Err(e) => {
                warn!("Could not enumerate background workers: {}", e);
                return CleanupTally::unavailable();
            }
        };

        let found = registrations.len();
        let results = join_all(registrations.into_iter().map(|registration| {
            let workers = Arc::clone(&workers);
            async move {
                let result = workers.unregister(&registration).await;
                if let Err(e) = &result {
                    warn!("Failed to unregister worker {}: {}", registration.scope, e);
                }
                result
            }
        }))
        .await;

        let tally = CleanupTally::from_results(found, results);
        info!(
            "Worker cleanup: unregistered {} of {} workers",
            tally.removed, tally.found
        );
        tally
    })
}

// == Response Cache Deletion ==
/// Spawns a task that deletes every named response cache.
pub fn spawn_response_cache_deletion(
    runtime: &Handle,
    caches: Arc<dyn ResponseCacheRegistry>,
) -> JoinHandle<CleanupTally> {
    runtime.spawn(async move {
        let names = match caches.names().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Could not enumerate response caches: {}", e);
                return CleanupTally::unavailable();
            }
        };

        let found = names.len();
        let results = join_all(names.into_iter().map(|name| {
            let caches = Arc::clone(&caches);
            async move {
                let result = caches.delete(&name).await;
                if let Err(e) = &result {
                    warn!("Failed to delete response cache {}: {}", name, e);
                }
                result
            }
        }))
        .await;

        let tally = CleanupTally::from_results(found, results);
        info!(
            "Response cache cleanup: deleted {} of {} caches",
            tally.removed, tally.found
        );
        tally
    })
}

// == Pending Cleanup ==
/// Handles to in-flight cleanup tasks.
///
/// Dropping this does not cancel anything; the tasks keep running detached.
#[derive(Debug, Default)]
pub struct PendingCleanup {
    workers: Option<JoinHandle<CleanupTally>>,
    response_caches: Option<JoinHandle<CleanupTally>>,
}

impl PendingCleanup {
    pub fn new(
        workers: Option<JoinHandle<CleanupTally>>,
        response_caches: Option<JoinHandle<CleanupTally>>,
    ) -> Self {
        Self {
            workers,
            response_caches,
        }
    }

    /// Nothing was spawned, e.g. no async runtime was available.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true once every spawned task has finished.
    pub fn is_finished(&self) -> bool {
        [&self.workers, &self.response_caches]
            .into_iter()
            .flatten()
            .all(|handle| handle.is_finished())
    }

    /// Waits for every spawned task and collects their tallies.
    pub async fn wait(self) -> CleanupSummary {
        CleanupSummary {
            workers: join_tally("worker", self.workers).await,
            response_caches: join_tally("response cache", self.response_caches).await,
        }
    }
}

async fn join_tally(what: &str, handle: Option<JoinHandle<CleanupTally>>) -> CleanupTally {
    let Some(handle) = handle else {
        debug!("No {} cleanup task was spawned", what);
        return CleanupTally::unavailable();
    };
    match handle.await {
        Ok(tally) => tally,
        Err(e) => {
            warn!("{} cleanup task did not complete: {}", what, e);
            CleanupTally::unavailable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheError, Result};
    use crate::storage::{MemoryResponseCaches, MemoryWorkerRegistry, WorkerRegistration};
    use async_trait::async_trait;

    /// Registry that lists workers but refuses to unregister one of them.
    struct StubbornRegistry {
        inner: MemoryWorkerRegistry,
    }

    #[async_trait]
    impl WorkerRegistry for StubbornRegistry {
        async fn registrations(&self) -> Result<Vec<WorkerRegistration>> {
            self.inner.registrations().await
        }

        async fn unregister(&self, registration: &WorkerRegistration) -> Result<bool> {
            if registration.scope == "/locked/" {
                return Err(CacheError::Worker("permission denied".to_string()));
            }
            self.inner.unregister(registration).await
        }
    }

    #[tokio::test]
    async fn test_worker_unregistration_removes_all() {
        let registry = Arc::new(MemoryWorkerRegistry::new());
        registry.register("/");
        registry.register("/app/");

        let handle = spawn_worker_unregistration(&Handle::current(), registry.clone());
        let tally = handle.await.unwrap();

        assert_eq!(tally.found, 2);
        assert_eq!(tally.removed, 2);
        assert_eq!(tally.failed, 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_worker_failure_does_not_stop_others() {
        let inner = MemoryWorkerRegistry::new();
        inner.register("/locked/");
        inner.register("/open/");
        let registry = Arc::new(StubbornRegistry { inner });

        let tally = spawn_worker_unregistration(&Handle::current(), registry.clone())
            .await
            .unwrap();

        assert_eq!(tally.removed, 1);
        assert_eq!(tally.failed, 1);
        assert_eq!(registry.inner.len(), 1);
    }

    #[tokio::test]
    async fn test_response_cache_deletion() {
        let caches = Arc::new(MemoryResponseCaches::new());
        caches.open("static-v1");
        caches.open("images-v1");

        let pending = PendingCleanup::new(
            None,
            Some(spawn_response_cache_deletion(&Handle::current(), caches.clone())),
        );
        let summary = pending.wait().await;

        assert_eq!(summary.response_caches.removed, 2);
        assert!(!summary.workers.enumerated);
        assert!(caches.is_empty());
    }

    #[tokio::test]
    async fn test_empty_pending_is_finished() {
        let pending = PendingCleanup::none();
        assert!(pending.is_finished());
        assert_eq!(pending.wait().await, CleanupSummary::default());
    }
}
