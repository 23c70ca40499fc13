// src/ingest/providers/mod.rs
pub mod local;
pub mod object_store;
pub mod remote;

pub use local::LocalFileSource;
pub use object_store::{from_endpoint, FsObjectStore, HttpObjectStore, MemoryObjectStore, ObjectStore};
pub use remote::RemoteDatasetSource;

use bytes::Bytes;

use crate::error::LoadError;
use crate::ingest::parquet::decode_articles;
use crate::ingest::short_digest;
use crate::ingest::types::SourceFetch;

/// Digest + decode off the async workers; parquet decoding is CPU-bound.
pub(crate) async fn decode_fetched(data: Bytes) -> Result<SourceFetch, LoadError> {
    tokio::task::spawn_blocking(move || {
        let digest = short_digest(&data);
        let rows = decode_articles(data)?;
        Ok(SourceFetch { rows, digest })
    })
    .await
    .map_err(|e| LoadError::Parse(format!("decode task: {e}")))?
}
