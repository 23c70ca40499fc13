// src/ingest/scheduler.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::LoadFailure;
use crate::ingest::{ensure_metrics_described, Loader};
use crate::snapshot::{Snapshot, SnapshotStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Publishing,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Publishing => "publishing",
            Phase::Failed => "failed",
        }
    }
}

fn enter(scheduler: &'static str, phase: Phase) {
    tracing::debug!(target: "scheduler", scheduler, phase = phase.as_str(), "phase");
}

/// Wakes the refresh loop before its next tick.
#[derive(Clone, Default)]
pub struct RefreshHandle {
    notify: Arc<Notify>,
}

impl RefreshHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a refresh. Repeated triggers before the loop wakes collapse into one.
    pub fn trigger(&self) {
        self.notify.notify_one();
    }

    async fn notified(&self) {
        self.notify.notified().await
    }
}

/// Run `tick` forever, `interval` after each completion or as soon as `wake`
/// fires. Each tick runs in its own task so a panic is logged and the loop
/// keeps going. With `run_immediately = false` the first tick also waits.
pub fn spawn_supervised<F, Fut>(
    name: &'static str,
    interval: Duration,
    wake: Option<RefreshHandle>,
    run_immediately: bool,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if !run_immediately {
            pause(name, interval, wake.as_ref()).await;
        }
        loop {
            if let Err(e) = tokio::spawn(tick()).await {
                counter!("scheduler_tick_panics_total", "scheduler" => name).increment(1);
                tracing::error!(scheduler = name, error = %e, "tick aborted; continuing");
            }
            pause(name, interval, wake.as_ref()).await;
        }
    })
}

async fn pause(name: &'static str, interval: Duration, wake: Option<&RefreshHandle>) {
    match wake {
        Some(w) => {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = w.notified() => {
                    tracing::info!(scheduler = name, "manual refresh requested");
                }
            }
        }
        None => tokio::time::sleep(interval).await,
    }
}

/// One refresh tick: load, then publish on success. On failure the store is untouched.
pub async fn refresh_once(
    loader: &Loader,
    store: &SnapshotStore,
) -> Result<Arc<Snapshot>, LoadFailure> {
    ensure_metrics_described();
    enter("refresh", Phase::Loading);
    match loader.load().await {
        Ok(snapshot) => {
            enter("refresh", Phase::Publishing);
            let published = store.publish(snapshot);
            counter!("snapshot_refresh_total", "outcome" => "success").increment(1);
            gauge!("snapshot_records").set(published.count() as f64);
            if let Some(ts) = published.loaded_at() {
                gauge!("snapshot_loaded_at_ts").set(ts.timestamp() as f64);
            }
            tracing::info!(
                source = published.source().map(|s| s.as_str()).unwrap_or("none"),
                count = published.count(),
                dropped = published.dropped_rows(),
                generation = published.generation(),
                digest = published.digest().unwrap_or(""),
                "snapshot published"
            );
            enter("refresh", Phase::Idle);
            Ok(published)
        }
        Err(failure) => {
            enter("refresh", Phase::Failed);
            counter!("snapshot_refresh_total", "outcome" => "failure").increment(1);
            tracing::warn!(
                error = %failure.cause,
                fallbacks = failure.fallbacks.len(),
                "refresh failed; keeping current snapshot"
            );
            enter("refresh", Phase::Idle);
            Err(failure)
        }
    }
}

/// Startup load, awaited before serving. Returns whether a snapshot is available.
pub async fn initial_load(loader: &Loader, store: &SnapshotStore) -> bool {
    match refresh_once(loader, store).await {
        Ok(_) => true,
        Err(_) => {
            tracing::warn!("no dataset at startup; serving empty snapshot until a refresh succeeds");
            false
        }
    }
}

/// Periodic refresh. The first tick waits one interval (or a trigger), since
/// startup already ran [`initial_load`].
pub fn spawn_refresh_scheduler(
    loader: Arc<Loader>,
    store: SnapshotStore,
    interval: Duration,
    handle: RefreshHandle,
) -> JoinHandle<()> {
    spawn_supervised("refresh", interval, Some(handle), false, move || {
        let loader = loader.clone();
        let store = store.clone();
        async move {
            let _ = refresh_once(&loader, &store).await;
        }
    })
}
