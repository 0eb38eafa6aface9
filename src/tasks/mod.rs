//! Background Tasks Module
//!
//! Asynchronous purge actions dispatched by the version guard.
//!
//! # Tasks
//! - Worker unregistration: unregisters every background worker
//! - Response cache deletion: deletes every named response cache

mod cleanup;

pub use cleanup::{
    spawn_response_cache_deletion, spawn_worker_unregistration, CleanupSummary, CleanupTally,
    PendingCleanup,
};
