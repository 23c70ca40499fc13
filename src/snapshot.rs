//! # Snapshot Store
//! Immutable dataset snapshots and the single-owner store that publishes them.
//!
//! Readers call [`SnapshotStore::current`] and get an `Arc<Snapshot>` without
//! taking any lock (`ArcSwap::load_full`). Publishers serialize on a writer
//! mutex only to assign the generation and swap the pointer. A reader keeps
//! whatever snapshot it captured alive until it drops the `Arc`, so a swap
//! never tears an in-flight request.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

use crate::record::{DataSource, Record};

/// One fully-built view of the dataset.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: Arc<[Record]>,
    loaded_at: Option<DateTime<Utc>>,
    source: Option<DataSource>,
    generation: u64,
    digest: Option<String>,
    dropped_rows: usize,
}

impl Snapshot {
    /// The explicit "nothing loaded yet" snapshot.
    pub fn empty() -> Self {
        Self {
            records: Arc::from(Vec::<Record>::new()),
            loaded_at: None,
            source: None,
            generation: 0,
            digest: None,
            dropped_rows: 0,
        }
    }

    /// Build a snapshot; records are sorted newest first (ties by id).
    pub fn new(mut records: Vec<Record>, source: DataSource, loaded_at: DateTime<Utc>) -> Self {
        records.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Self {
            records: Arc::from(records),
            loaded_at: Some(loaded_at),
            source: Some(source),
            generation: 0,
            digest: None,
            dropped_rows: 0,
        }
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    pub fn with_dropped_rows(mut self, dropped: usize) -> Self {
        self.dropped_rows = dropped;
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn source(&self) -> Option<DataSource> {
        self.source
    }

    /// False only for the initial empty snapshot.
    pub fn is_available(&self) -> bool {
        self.source.is_some()
    }

    /// 0 for the initial snapshot, then 1, 2, ... in publish order.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }
}

/// Health-style view derived from the current snapshot.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SnapshotStatus {
    pub available: bool,
    pub count: usize,
    pub loaded_at: Option<DateTime<Utc>>,
    pub source: Option<DataSource>,
    pub generation: u64,
}

/// Cheap to clone; all clones share the same current pointer.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<Inner>,
}

struct Inner {
    current: ArcSwap<Snapshot>,
    writer: Mutex<u64>,
}

impl SnapshotStore {
    /// Store holding the empty snapshot.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                current: ArcSwap::from_pointee(Snapshot::empty()),
                writer: Mutex::new(0),
            }),
        }
    }

    /// The latest published snapshot (or the empty one). Never blocks.
    pub fn current(&self) -> Arc<Snapshot> {
        self.inner.current.load_full()
    }

    /// Make `snapshot` visible to every later `current()` call and return the
    /// published reference. Concurrent publishers are applied in lock order.
    pub fn publish(&self, mut snapshot: Snapshot) -> Arc<Snapshot> {
        // A poisoned lock still holds a valid counter.
        let mut generation = match self.inner.writer.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        *generation += 1;
        snapshot.generation = *generation;
        let published = Arc::new(snapshot);
        self.inner.current.store(Arc::clone(&published));
        published
    }

    pub fn status(&self) -> SnapshotStatus {
        let snap = self.current();
        SnapshotStatus {
            available: snap.is_available(),
            count: snap.count(),
            loaded_at: snap.loaded_at(),
            source: snap.source(),
            generation: snap.generation(),
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
