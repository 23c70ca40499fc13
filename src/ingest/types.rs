// src/ingest/types.rs
use crate::error::LoadError;
use crate::record::{DataSource, RawRow};

/// Raw rows from one successful fetch, with a short digest of the source bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFetch {
    pub rows: Vec<RawRow>,
    pub digest: String,
}

#[async_trait::async_trait]
pub trait DatasetSource: Send + Sync {
    async fn fetch_dataset(&self) -> Result<SourceFetch, LoadError>;
    fn name(&self) -> &str;
    /// Tag carried by snapshots built from this source.
    fn origin(&self) -> DataSource;
}
