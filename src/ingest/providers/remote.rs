// src/ingest/providers/remote.rs
use std::sync::Arc;

use async_trait::async_trait;
use metrics::histogram;

use super::{decode_fetched, ObjectStore};
use crate::error::LoadError;
use crate::ingest::types::{DatasetSource, SourceFetch};
use crate::record::DataSource;

/// Primary source: one parquet object in the configured bucket.
pub struct RemoteDatasetSource {
    store: Arc<dyn ObjectStore>,
    key: String,
}

impl RemoteDatasetSource {
    pub fn new(store: Arc<dyn ObjectStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

#[async_trait]
impl DatasetSource for RemoteDatasetSource {
    async fn fetch_dataset(&self) -> Result<SourceFetch, LoadError> {
        let t0 = std::time::Instant::now();
        let data = self.store.get(&self.key).await?;
        histogram!("loader_fetch_ms", "source" => "remote")
            .record(t0.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(
            key = %self.key,
            backend = self.store.backend(),
            bytes = data.len(),
            "remote dataset fetched"
        );
        decode_fetched(data).await
    }

    fn name(&self) -> &str {
        "remote"
    }

    fn origin(&self) -> DataSource {
        DataSource::Remote
    }
}
