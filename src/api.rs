use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::QueryError;
use crate::ingest::scheduler::RefreshHandle;
use crate::query::{self, FilterCriteria};
use crate::record::{ArticleView, DataSource};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::users::{RecordStore, UserRow};

#[derive(Clone)]
pub struct AppState {
    pub store: SnapshotStore,
    pub refresh: RefreshHandle,
    pub users: Arc<dyn RecordStore>,
    pub remote_configured: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/news", get(news))
        .route("/companies", get(companies))
        .route("/categories", get(categories))
        .route("/stats", get(stats))
        .route("/refresh", post(refresh))
        .route("/users", get(users))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    /// Bad query parameter; 422 like a validation failure.
    Invalid(String),
    Unavailable,
    Internal(String),
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        ApiError::Invalid(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Invalid(d) => (StatusCode::UNPROCESSABLE_ENTITY, d),
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "Data not available".into()),
            ApiError::Internal(d) => (StatusCode::INTERNAL_SERVER_ERROR, d),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Current snapshot, or 503 before the first successful load.
fn loaded(state: &AppState) -> Result<Arc<Snapshot>, ApiError> {
    let snap = state.store.current();
    if snap.is_available() {
        Ok(snap)
    } else {
        Err(ApiError::Unavailable)
    }
}

fn source_label(source: Option<DataSource>) -> Option<&'static str> {
    source.map(|s| s.as_str())
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "News Snapshot API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "news": "/news",
            "companies": "/companies",
            "categories": "/categories",
            "stats": "/stats",
            "refresh": "/refresh",
            "users": "/users",
            "metrics": "/metrics"
        }
    }))
}

#[derive(Serialize)]
struct HealthOut {
    status: &'static str,
    data_loaded: bool,
    total_articles: usize,
    last_refresh: Option<DateTime<Utc>>,
    data_source: Option<&'static str>,
    generation: u64,
    remote_configured: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthOut> {
    let st = state.store.status();
    Json(HealthOut {
        status: "healthy",
        data_loaded: st.available,
        total_articles: st.count,
        last_refresh: st.loaded_at,
        data_source: source_label(st.source),
        generation: st.generation,
        remote_configured: state.remote_configured,
    })
}

fn parse_param(q: &HashMap<String, String>, name: &str) -> Result<Option<u32>, ApiError> {
    match q.get(name).map(|s| s.trim()) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ApiError::Invalid(format!("{name} must be a positive integer, got `{v}`"))),
    }
}

#[derive(Serialize)]
struct NewsOut {
    articles: Vec<ArticleView>,
    total_found: usize,
    returned: usize,
    filters_applied: FilterCriteria,
}

async fn news(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<NewsOut>, ApiError> {
    let criteria = FilterCriteria::new(
        q.get("company").cloned(),
        q.get("category").cloned(),
        parse_param(&q, "days")?,
        parse_param(&q, "limit")?,
    )?;
    let snap = loaded(&state)?;
    let result = query::query(&snap, &criteria)?;
    Ok(Json(NewsOut {
        returned: result.articles.len(),
        total_found: result.total_matched,
        articles: result.articles,
        filters_applied: criteria,
    }))
}

#[derive(Serialize)]
struct CompaniesOut {
    companies: query::Counts,
    total_companies: usize,
}

async fn companies(State(state): State<AppState>) -> Result<Json<CompaniesOut>, ApiError> {
    let snap = loaded(&state)?;
    let companies = query::company_counts(&snap);
    Ok(Json(CompaniesOut {
        total_companies: companies.len(),
        companies,
    }))
}

#[derive(Serialize)]
struct CategoriesOut {
    categories: query::Counts,
    total_categories: usize,
}

async fn categories(State(state): State<AppState>) -> Result<Json<CategoriesOut>, ApiError> {
    let snap = loaded(&state)?;
    let categories = query::category_counts(&snap);
    Ok(Json(CategoriesOut {
        total_categories: categories.len(),
        categories,
    }))
}

#[derive(Serialize)]
struct DateRange {
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct SentimentStats {
    average: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

#[derive(Serialize)]
struct StatsOut {
    total_articles: usize,
    date_range: DateRange,
    sentiment_statistics: SentimentStats,
    recent_articles_7_days: usize,
    last_refresh: Option<DateTime<Utc>>,
    data_source: Option<&'static str>,
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsOut>, ApiError> {
    let snap = loaded(&state)?;
    let s = query::statistics(&snap);
    Ok(Json(StatsOut {
        total_articles: s.count,
        date_range: DateRange {
            earliest: s.date_range_min,
            latest: s.date_range_max,
        },
        sentiment_statistics: SentimentStats {
            average: s.sentiment_mean,
            min: s.sentiment_min,
            max: s.sentiment_max,
        },
        recent_articles_7_days: s.recent_count,
        last_refresh: snap.loaded_at(),
        data_source: source_label(snap.source()),
    }))
}

async fn refresh(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    state.refresh.trigger();
    (
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Data refresh initiated", "status": "processing" })),
    )
}

#[derive(Serialize)]
struct UsersOut {
    users: Vec<UserRow>,
    total_users: usize,
}

async fn users(State(state): State<AppState>) -> Result<Json<UsersOut>, ApiError> {
    let users = state
        .users
        .read_all()
        .await
        .map_err(|e| ApiError::Internal(format!("Database error: {e}")))?;
    Ok(Json(UsersOut {
        total_users: users.len(),
        users,
    }))
}
