// src/ingest/mod.rs
pub mod backup;
pub mod parquet;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};

use crate::error::{LoadError, LoadFailure};
use crate::ingest::types::DatasetSource;
use crate::record::{RawRow, Record};
use crate::snapshot::Snapshot;

/// What one load attempt produces; failures never touch the store.
pub type RefreshOutcome = Result<Snapshot, LoadFailure>;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "snapshot_refresh_total",
            "Refresh ticks by outcome (success/failure)."
        );
        describe_counter!(
            "snapshot_rows_dropped_total",
            "Rows dropped during normalization."
        );
        describe_gauge!("snapshot_records", "Records in the current snapshot.");
        describe_gauge!(
            "snapshot_loaded_at_ts",
            "Unix ts when the current snapshot was loaded."
        );
        describe_counter!(
            "loader_source_errors_total",
            "Dataset source fetch/parse errors."
        );
        describe_histogram!("loader_fetch_ms", "Dataset fetch time in milliseconds.");
        describe_histogram!("loader_load_ms", "Full load (fetch + decode + normalize) time.");
        describe_counter!("sync_export_total", "Sync export ticks by outcome.");
        describe_counter!(
            "scheduler_tick_panics_total",
            "Scheduler ticks that panicked or were cancelled."
        );
        describe_gauge!("sync_last_run_ts", "Unix ts when the sync export last succeeded.");
    });
}

/// First 6 bytes of SHA-256, hex.
pub fn short_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)[..6]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Turn raw rows into records, dropping the ones that fail a row rule.
/// Returns (records, dropped).
pub fn normalize_rows(raw: Vec<RawRow>) -> (Vec<Record>, usize) {
    let total = raw.len();
    let mut seen: HashSet<i64> = HashSet::with_capacity(total);
    let mut out = Vec::with_capacity(total);

    for (ordinal, row) in raw.into_iter().enumerate() {
        match normalize_row(row) {
            Ok(rec) => {
                if seen.insert(rec.id) {
                    out.push(rec);
                } else {
                    tracing::trace!(id = rec.id, "duplicate id dropped");
                }
            }
            Err(e) => tracing::trace!(ordinal, error = %e, "row dropped"),
        }
    }

    let dropped = total - out.len();
    (out, dropped)
}

// Decoders fill `id` from the row ordinal only when the file has no id column,
// so a missing id here is a bad cell.
fn normalize_row(row: RawRow) -> Result<Record, LoadError> {
    let id = row.id.ok_or_else(|| LoadError::Parse("id".into()))?;
    let published_at = row
        .published_at
        .as_ref()
        .and_then(|t| t.to_instant())
        .ok_or_else(|| LoadError::Parse("timestamp".into()))?;
    let sentiment = row
        .sentiment
        .filter(|s| s.is_finite() && (-1.0..=1.0).contains(s))
        .ok_or_else(|| LoadError::Parse("sentiment".into()))?;

    Ok(Record {
        id,
        title: row.title.ok_or_else(|| LoadError::Parse("title".into()))?,
        body: row.body.unwrap_or_default(),
        published_at,
        company: row.company.ok_or_else(|| LoadError::Parse("company".into()))?,
        category: row
            .category
            .ok_or_else(|| LoadError::Parse("category".into()))?,
        sentiment,
        url: row.url.unwrap_or_default(),
    })
}

/// Tries each source in order; the first success becomes the new snapshot.
pub struct Loader {
    sources: Vec<Arc<dyn DatasetSource>>,
    fetch_timeout: Duration,
}

impl Loader {
    pub fn new(sources: Vec<Arc<dyn DatasetSource>>, fetch_timeout: Duration) -> Self {
        Self {
            sources,
            fetch_timeout,
        }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Build a fresh snapshot. Does not publish it.
    pub async fn load(&self) -> RefreshOutcome {
        ensure_metrics_described();
        let t0 = Instant::now();

        let mut errors: Vec<(String, LoadError)> = Vec::new();
        for src in &self.sources {
            let fetched = match tokio::time::timeout(self.fetch_timeout, src.fetch_dataset()).await
            {
                Ok(Ok(f)) => f,
                Ok(Err(e)) => {
                    self.note_source_error(src.as_ref(), &e);
                    errors.push((src.name().to_string(), e));
                    continue;
                }
                Err(_) => {
                    let e = LoadError::Timeout(self.fetch_timeout);
                    self.note_source_error(src.as_ref(), &e);
                    errors.push((src.name().to_string(), e));
                    continue;
                }
            };

            let (records, dropped) = normalize_rows(fetched.rows);
            if dropped > 0 {
                tracing::warn!(source = src.name(), dropped, "rows dropped during normalization");
                counter!("snapshot_rows_dropped_total").increment(dropped as u64);
            }
            histogram!("loader_load_ms").record(t0.elapsed().as_secs_f64() * 1000.0);

            return Ok(Snapshot::new(records, src.origin(), Utc::now())
                .with_digest(fetched.digest)
                .with_dropped_rows(dropped));
        }

        let mut errors = errors.into_iter();
        let cause = errors
            .next()
            .map(|(_, e)| e)
            .unwrap_or_else(|| LoadError::SourceUnavailable("no dataset sources configured".into()));
        Err(LoadFailure {
            cause,
            fallbacks: errors.collect(),
        })
    }

    fn note_source_error(&self, src: &dyn DatasetSource, e: &LoadError) {
        tracing::warn!(source = src.name(), error = %e, "dataset source failed");
        counter!("loader_source_errors_total", "source" => src.name().to_string()).increment(1);
    }
}
