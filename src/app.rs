//! Process wiring: builds the store, sources, schedulers and router from a
//! [`ServiceConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::{self, AppState};
use crate::config::{LogFormat, ServiceConfig};
use crate::ingest::backup::{spawn_sync_scheduler, SyncExporter};
use crate::ingest::providers::{from_endpoint, LocalFileSource, ObjectStore, RemoteDatasetSource};
use crate::ingest::scheduler::{initial_load, spawn_refresh_scheduler, RefreshHandle};
use crate::ingest::types::DatasetSource;
use crate::ingest::Loader;
use crate::metrics::Metrics;
use crate::snapshot::SnapshotStore;
use crate::users::SqliteUserStore;

const DEFAULT_FILTER: &str = "news_snapshot_api=info,warn";

/// Install a `fmt` subscriber. A no-op if one is already set (e.g. by the host runtime).
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let res = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init(),
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Remote (if configured) then local, in that order.
pub fn build_sources(
    cfg: &ServiceConfig,
    remote: Option<Arc<dyn ObjectStore>>,
) -> Vec<Arc<dyn DatasetSource>> {
    let mut sources: Vec<Arc<dyn DatasetSource>> = Vec::with_capacity(2);
    if let Some(store) = remote {
        sources.push(Arc::new(RemoteDatasetSource::new(
            store,
            cfg.remote.dataset_key.clone(),
        )));
    }
    sources.push(Arc::new(LocalFileSource::new(cfg.local.dataset_path.clone())));
    sources
}

/// Run the startup load, spawn the background schedulers and return the router.
pub async fn start(cfg: ServiceConfig) -> Result<Router> {
    let cfg = Arc::new(cfg);
    let remote: Option<Arc<dyn ObjectStore>> = cfg
        .remote
        .endpoint
        .as_deref()
        .map(|endpoint| {
            from_endpoint(endpoint, cfg.remote.token.clone(), cfg.schedule.fetch_timeout())
        })
        .transpose()
        .context("building object store client")?;

    let loader = Arc::new(Loader::new(
        build_sources(&cfg, remote.clone()),
        cfg.schedule.fetch_timeout(),
    ));
    tracing::info!(sources = ?loader.source_names(), "loader configured");

    let store = SnapshotStore::new();
    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = %e, "metrics disabled");
            None
        }
    };

    initial_load(&loader, &store).await;

    let refresh = RefreshHandle::new();
    spawn_refresh_scheduler(
        loader,
        store.clone(),
        cfg.schedule.refresh_interval(),
        refresh.clone(),
    );

    let users = Arc::new(
        SqliteUserStore::open(&cfg.database.sqlite_path).context("opening user store")?,
    );

    match remote {
        Some(object_store) => {
            let exporter = Arc::new(SyncExporter::new(
                users.clone(),
                object_store,
                &cfg.remote.export_prefix,
            ));
            spawn_sync_scheduler(exporter, cfg.schedule.sync_interval());
        }
        None => tracing::info!("no remote endpoint; sync export disabled"),
    }

    let state = AppState {
        store,
        refresh,
        users,
        remote_configured: cfg.remote_configured(),
    };
    let mut router = api::router(state);
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }
    Ok(router)
}
