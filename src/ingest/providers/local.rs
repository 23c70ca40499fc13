// src/ingest/providers/local.rs
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::histogram;

use super::decode_fetched;
use crate::error::LoadError;
use crate::ingest::types::{DatasetSource, SourceFetch};
use crate::record::DataSource;

/// Fallback source: a parquet file on local disk.
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DatasetSource for LocalFileSource {
    async fn fetch_dataset(&self) -> Result<SourceFetch, LoadError> {
        let t0 = std::time::Instant::now();
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            LoadError::SourceUnavailable(format!("{}: {e}", self.path.display()))
        })?;
        histogram!("loader_fetch_ms", "source" => "local")
            .record(t0.elapsed().as_secs_f64() * 1000.0);
        decode_fetched(Bytes::from(data)).await
    }

    fn name(&self) -> &str {
        "local"
    }

    fn origin(&self) -> DataSource {
        DataSource::Local
    }
}
