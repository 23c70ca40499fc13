// src/error.rs
use std::time::Duration;
use thiserror::Error;

/// Errors a dataset source or the row normalizer can produce.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Network, storage or filesystem failure.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    /// Malformed file or cell. Per-row occurrences drop the row only.
    #[error("parse error: {0}")]
    Parse(String),
    /// A required column is absent; the whole source is rejected.
    #[error("schema mismatch: missing column `{0}`")]
    SchemaMismatch(String),
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl From<parquet::errors::ParquetError> for LoadError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        LoadError::Parse(format!("parquet: {e}"))
    }
}

impl From<arrow::error::ArrowError> for LoadError {
    fn from(e: arrow::error::ArrowError) -> Self {
        LoadError::Parse(format!("arrow: {e}"))
    }
}

/// Every configured source failed. `cause` is the first (primary) source's error.
#[derive(Debug, Error)]
#[error("all dataset sources failed; primary cause: {cause}")]
pub struct LoadFailure {
    pub cause: LoadError,
    /// Errors from the fallback sources, in the order they were tried.
    pub fallbacks: Vec<(String, LoadError)>,
}

/// Caller input error on filter parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("limit must be within [1, 100], got {0}")]
    InvalidLimit(u32),
    #[error("days must be within [1, 365], got {0}")]
    InvalidDays(u32),
}

/// Failures of one sync tick.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("record store: {0}")]
    RecordStore(String),
    #[error("encode: {0}")]
    Encode(String),
    #[error("upload: {0}")]
    Upload(String),
}

impl From<parquet::errors::ParquetError> for ExportError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        ExportError::Encode(format!("parquet: {e}"))
    }
}

impl From<arrow::error::ArrowError> for ExportError {
    fn from(e: arrow::error::ArrowError) -> Self {
        ExportError::Encode(format!("arrow: {e}"))
    }
}

/// Object store failures, mapped into the load or export taxonomy by callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("http: {0}")]
    Http(String),
}

impl From<StoreError> for LoadError {
    fn from(e: StoreError) -> Self {
        LoadError::SourceUnavailable(e.to_string())
    }
}

impl From<StoreError> for ExportError {
    fn from(e: StoreError) -> Self {
        ExportError::Upload(e.to_string())
    }
}
