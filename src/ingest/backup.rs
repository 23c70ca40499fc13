// src/ingest/backup.rs
//! Sync export: mirrors the user table into object storage as parquet.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::task::JoinHandle;

use crate::error::ExportError;
use crate::ingest::parquet::encode_users;
use crate::ingest::providers::ObjectStore;
use crate::ingest::scheduler::spawn_supervised;
use crate::ingest::ensure_metrics_described;
use crate::users::RecordStore;

pub struct SyncExporter {
    records: Arc<dyn RecordStore>,
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl SyncExporter {
    pub fn new(records: Arc<dyn RecordStore>, store: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self {
            records,
            store,
            prefix: prefix.to_string(),
        }
    }

    /// `{prefix}users_YYYYMMDD_HHMMSS.parquet`
    pub fn export_key(&self, now: DateTime<Utc>) -> String {
        format!("{}users_{}.parquet", self.prefix, now.format("%Y%m%d_%H%M%S"))
    }

    /// Read all users, encode, upload. Returns the object key written.
    pub async fn sync_once(&self) -> Result<String, ExportError> {
        self.sync_at(Utc::now()).await
    }

    pub async fn sync_at(&self, now: DateTime<Utc>) -> Result<String, ExportError> {
        let rows = self.records.read_all().await?;
        let body = tokio::task::spawn_blocking(move || encode_users(&rows))
            .await
            .map_err(|e| ExportError::Encode(format!("encoder task: {e}")))??;
        let key = self.export_key(now);
        self.store.put(&key, body).await?;
        Ok(key)
    }
}

/// Periodic export in its own task; failures are logged and retried next tick.
/// The first export happens one `interval` after start.
pub fn spawn_sync_scheduler(exporter: Arc<SyncExporter>, interval: Duration) -> JoinHandle<()> {
    ensure_metrics_described();
    spawn_supervised("sync", interval, None, false, move || {
        let exporter = exporter.clone();
        async move {
            tracing::debug!(target: "scheduler", scheduler = "sync", phase = "loading", "phase");
            match exporter.sync_once().await {
                Ok(key) => {
                    counter!("sync_export_total", "outcome" => "success").increment(1);
                    gauge!("sync_last_run_ts").set(Utc::now().timestamp() as f64);
                    tracing::info!(key = %key, "user table exported");
                }
                Err(e) => {
                    counter!("sync_export_total", "outcome" => "failure").increment(1);
                    tracing::warn!(error = %e, "sync export failed");
                }
            }
        }
    })
}
