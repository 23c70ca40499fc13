// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod query;
pub mod record;
pub mod snapshot;
pub mod users;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::app::start;
pub use crate::snapshot::{Snapshot, SnapshotStore};
