//! News Snapshot API: binary entrypoint.
//! Loads config, runs the startup load, and serves the Axum router through Shuttle.

use news_snapshot_api::{app, config::ServiceConfig};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let cfg = ServiceConfig::load().map_err(shuttle_runtime::Error::Custom)?;
    app::init_tracing(cfg.logging.format);
    tracing::info!(
        remote = cfg.remote_configured(),
        local = %cfg.local.dataset_path.display(),
        refresh_secs = cfg.schedule.refresh_interval_secs,
        "starting news snapshot service"
    );

    let router = app::start(cfg)
        .await
        .map_err(shuttle_runtime::Error::Custom)?;
    Ok(router.into())
}
