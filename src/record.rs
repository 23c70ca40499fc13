//! # Record Schema
//! One news article as held in a snapshot, plus the raw row shape produced by
//! dataset sources before normalization.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

/// Body previews longer than this (in chars) are cut and suffixed with `...`.
pub const CONTENT_PREVIEW_CHARS: usize = 200;
pub const ELLIPSIS: &str = "...";

/// Where a snapshot's rows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataSource {
    Remote,
    Local,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Remote => "remote",
            DataSource::Local => "local",
        }
    }
}

/// A normalized, immutable article.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub published_at: DateTime<Utc>,
    pub company: String,
    pub category: String,
    /// In `[-1.0, 1.0]`.
    pub sentiment: f64,
    pub url: String,
}

impl Record {
    /// Response-shaped view with the body cut to a preview.
    pub fn preview(&self) -> ArticleView {
        ArticleView {
            id: self.id,
            title: self.title.clone(),
            content: truncate_content(&self.body),
            company: self.company.clone(),
            category: self.category.clone(),
            date: self.published_at,
            sentiment: self.sentiment,
            url: self.url.clone(),
        }
    }
}

/// What `/news` returns per article.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub company: String,
    pub category: String,
    pub date: DateTime<Utc>,
    pub sentiment: f64,
    pub url: String,
}

/// First `CONTENT_PREVIEW_CHARS` chars plus `...` if the text is longer.
pub fn truncate_content(body: &str) -> String {
    match body.char_indices().nth(CONTENT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}{}", &body[..cut], ELLIPSIS),
        None => body.to_string(),
    }
}

/// Timestamp cell as decoded from the columnar file.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    Instant(DateTime<Utc>),
    Text(String),
}

impl RawTimestamp {
    /// Canonical UTC instant. Naive values are taken as UTC.
    pub fn to_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Instant(ts) => Some(*ts),
            RawTimestamp::Text(s) => parse_timestamp_text(s),
        }
    }
}

fn parse_timestamp_text(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// One undecoded row as a source hands it to the loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub published_at: Option<RawTimestamp>,
    pub company: Option<String>,
    pub category: Option<String>,
    pub sentiment: Option<f64>,
    pub url: Option<String>,
}
