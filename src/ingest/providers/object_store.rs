// src/ingest/providers/object_store.rs
//! Object storage seam: S3-compatible HTTP, a plain directory, and an
//! in-memory store for tests.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;

use crate::error::StoreError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError>;
    /// Short backend tag for logs ("http", "fs", "memory").
    fn backend(&self) -> &'static str;
}

/// Pick a backend from an endpoint string: `http(s)://` → HTTP, anything
/// else (optionally `file://`-prefixed) → directory.
pub fn from_endpoint(
    endpoint: &str,
    bearer: Option<String>,
    timeout: Duration,
) -> Result<Arc<dyn ObjectStore>, StoreError> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(Arc::new(HttpObjectStore::new(endpoint, bearer, timeout)?))
    } else {
        let root = endpoint.strip_prefix("file://").unwrap_or(endpoint);
        Ok(Arc::new(FsObjectStore::new(root)))
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 200,
        }
    }
}

/// GET/PUT against `{base_url}/{key}`, e.g. a bucket's virtual-host URL or a
/// presigning gateway.
pub struct HttpObjectStore {
    base_url: String,
    auth_bearer: Option<String>,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(
        base_url: &str,
        auth_bearer: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Http(format!("client build failed: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_bearer: auth_bearer.filter(|t| !t.is_empty()),
            retry: RetryPolicy::default(),
            client,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    fn auth_headers(&self) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.auth_bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| StoreError::Http(format!("invalid auth header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    #[tracing::instrument(name = "object_store_http_get", skip(self))]
    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let url = self.object_url(key);
        let headers = self.auth_headers()?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(&url).headers(headers.clone()).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .bytes()
                        .await
                        .map_err(|e| StoreError::Http(format!("read body failed: {e}")));
                }
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    return Err(StoreError::NotFound(url));
                }
                // Only 5xx is worth another attempt.
                Ok(resp) if !resp.status().is_server_error() => {
                    return Err(StoreError::Http(format!(
                        "get rejected status={} url={url}",
                        resp.status()
                    )));
                }
                Ok(resp) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(StoreError::Http(format!(
                            "get failed status={} url={url}",
                            resp.status()
                        )));
                    }
                }
                Err(e) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(StoreError::Http(format!("get failed url={url}: {e}")));
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(
                self.retry.base_backoff_ms.saturating_mul(attempt as u64),
            ))
            .await;
        }
    }

    #[tracing::instrument(name = "object_store_http_put", skip(self, body))]
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let url = self.object_url(key);
        self.client
            .put(&url)
            .headers(self.auth_headers()?)
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Http(format!("put failed url={url}: {e}")))?
            .error_for_status()
            .map_err(|e| StoreError::Http(format!("put rejected url={url}: {e}")))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "http"
    }
}

/// Objects as files under `root`; keys map to relative paths.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key.trim_start_matches('/'));
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || rel.as_os_str().is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        // Write-then-rename so readers never see a half-written object.
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "fs"
    }
}

// --- Test helper ---
#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        let mut keys: Vec<String> = objects.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        objects
            .get(key)
            .map(|v| Bytes::from(v.clone()))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        objects.insert(key.to_string(), body);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
