// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use news_snapshot_api::api::{self, AppState};
use news_snapshot_api::error::ExportError;
use news_snapshot_api::ingest::scheduler::RefreshHandle;
use news_snapshot_api::record::{DataSource, Record};
use news_snapshot_api::snapshot::{Snapshot, SnapshotStore};
use news_snapshot_api::users::{RecordStore, SqliteUserStore, UserRow};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

struct BrokenUsers;

#[async_trait]
impl RecordStore for BrokenUsers {
    async fn read_all(&self) -> Result<Vec<UserRow>, ExportError> {
        Err(ExportError::RecordStore("disk I/O error".into()))
    }
}

fn article(id: i64, days_ago: i64, company: &str, category: &str, body_len: usize) -> Record {
    Record {
        id,
        title: format!("{company} headline {id}"),
        body: "z".repeat(body_len),
        published_at: Utc::now() - Duration::days(days_ago),
        company: company.into(),
        category: category.into(),
        sentiment: if id % 2 == 0 { 0.5 } else { -0.25 },
        url: format!("https://news.test/{id}"),
    }
}

fn loaded_store() -> SnapshotStore {
    let store = SnapshotStore::new();
    store.publish(Snapshot::new(
        vec![
            article(1, 0, "Microsoft", "Cloud", 250),
            article(2, 3, "Apple", "Devices", 150),
            article(3, 10, "Microsoft", "Earnings", 10),
            article(4, 40, "Tesla", "Automotive", 10),
        ],
        DataSource::Local,
        Utc::now(),
    ));
    store
}

fn test_router(store: SnapshotStore, users: Arc<dyn RecordStore>) -> (Router, RefreshHandle) {
    let refresh = RefreshHandle::new();
    let state = AppState {
        store,
        refresh: refresh.clone(),
        users,
        remote_configured: false,
    };
    (api::router(state), refresh)
}

fn default_router() -> Router {
    test_router(loaded_store(), Arc::new(BrokenUsers)).0
}

async fn send_raw(app: Router, method: &str, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, String::from_utf8(bytes.to_vec()).expect("utf8 body"))
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Json) {
    let (status, text) = send_raw(app, method, uri).await;
    let v: Json = serde_json::from_str(&text).expect("json body");
    (status, v)
}

#[tokio::test]
async fn root_lists_endpoints() {
    let (status, v) = send(default_router(), "GET", "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["endpoints"]["news"], "/news");
}

#[tokio::test]
async fn health_reports_loaded_snapshot() {
    let (status, v) = send(default_router(), "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "healthy");
    assert_eq!(v["data_loaded"], true);
    assert_eq!(v["total_articles"], 4);
    assert_eq!(v["data_source"], "local");
    assert_eq!(v["generation"], 1);
    assert_eq!(v["remote_configured"], false);
    assert!(v["last_refresh"].is_string());
}

#[tokio::test]
async fn health_before_first_load_is_not_loaded() {
    let (app, _) = test_router(SnapshotStore::new(), Arc::new(BrokenUsers));
    let (status, v) = send(app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data_loaded"], false);
    assert_eq!(v["total_articles"], 0);
    assert!(v["last_refresh"].is_null());
}

#[tokio::test]
async fn news_defaults_to_thirty_days() {
    let (status, v) = send(default_router(), "GET", "/news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total_found"], 3);
    assert_eq!(v["returned"], 3);
    let ids: Vec<i64> = v["articles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(v["filters_applied"]["days"], 30);
    assert_eq!(v["filters_applied"]["limit"], 10);
}

#[tokio::test]
async fn news_filters_and_truncates() {
    let (status, v) = send(default_router(), "GET", "/news?company=micro&days=7&limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total_found"], 1);
    let a = &v["articles"][0];
    assert_eq!(a["company"], "Microsoft");
    assert_eq!(a["content"], format!("{}...", "z".repeat(200)));
    assert_eq!(v["filters_applied"]["company"], "micro");
}

#[tokio::test]
async fn news_total_found_counts_beyond_limit() {
    let (_, v) = send(default_router(), "GET", "/news?limit=2").await;
    assert_eq!(v["total_found"], 3);
    assert_eq!(v["returned"], 2);
}

#[tokio::test]
async fn news_rejects_out_of_range_params() {
    for uri in ["/news?limit=0", "/news?limit=101", "/news?days=366", "/news?days=abc"] {
        let (status, v) = send(default_router(), "GET", uri).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        assert!(v["detail"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn data_endpoints_are_503_without_snapshot() {
    for uri in ["/news", "/companies", "/categories", "/stats"] {
        let (app, _) = test_router(SnapshotStore::new(), Arc::new(BrokenUsers));
        let (status, v) = send(app, "GET", uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
        assert_eq!(v["detail"], "Data not available");
    }
}

#[tokio::test]
async fn companies_and_categories_count_whole_snapshot() {
    let (_, v) = send(default_router(), "GET", "/companies").await;
    assert_eq!(v["companies"]["Microsoft"], 2);
    assert_eq!(v["companies"]["Tesla"], 1);
    assert_eq!(v["total_companies"], 3);

    let (_, v) = send(default_router(), "GET", "/categories").await;
    assert_eq!(v["total_categories"], 4);
    assert_eq!(v["categories"]["Cloud"], 1);
}

#[tokio::test]
async fn company_counts_list_most_covered_first() {
    let (status, text) = send_raw(default_router(), "GET", "/companies").await;
    assert_eq!(status, StatusCode::OK);
    let pos = |name: &str| text.find(&format!("\"{name}\"")).expect(name);
    assert!(pos("Microsoft") < pos("Apple"), "{text}");
    assert!(pos("Apple") < pos("Tesla"), "{text}");
}

#[tokio::test]
async fn stats_summarize_snapshot() {
    let (status, v) = send(default_router(), "GET", "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total_articles"], 4);
    assert_eq!(v["recent_articles_7_days"], 2);
    assert_eq!(v["sentiment_statistics"]["min"], -0.25);
    assert_eq!(v["sentiment_statistics"]["max"], 0.5);
    assert!(v["date_range"]["earliest"].is_string());
    assert_eq!(v["data_source"], "local");
}

#[tokio::test]
async fn refresh_is_accepted() {
    let (app, _handle) = test_router(loaded_store(), Arc::new(BrokenUsers));
    let (status, v) = send(app, "POST", "/refresh").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(v["status"], "processing");
}

#[tokio::test]
async fn users_lists_seeded_rows() {
    let dir = tempfile::tempdir().unwrap();
    let users = SqliteUserStore::open(dir.path().join("users.db")).unwrap();
    let (app, _) = test_router(loaded_store(), Arc::new(users));
    let (status, v) = send(app, "GET", "/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total_users"], 3);
    assert_eq!(v["users"][0]["username"], "demo_user");
}

#[tokio::test]
async fn users_store_error_is_500() {
    let (status, v) = send(default_router(), "GET", "/users").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(v["detail"].as_str().unwrap().starts_with("Database error"));
}
