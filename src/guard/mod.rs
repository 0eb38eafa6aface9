//! Version Guard Module
//!
//! Boot-time invalidation of client state when the application version changes.

mod version;

pub use version::{GuardOutcome, GuardState, PurgeReport, StorageSurfaces, VersionGuard};
