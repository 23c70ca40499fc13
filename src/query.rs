//! # Query Engine
//! Pure filter/aggregate operations over a captured [`Snapshot`].
//! No I/O and no shared state: the caller passes the snapshot it read from
//! the store, so a concurrent publish never changes an in-flight result.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

use crate::error::QueryError;
use crate::record::{ArticleView, Record};
use crate::snapshot::Snapshot;

pub const DEFAULT_DAYS: u32 = 30;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_DAYS: u32 = 365;
pub const MAX_LIMIT: u32 = 100;
/// Window used by `statistics().recent_count`.
pub const RECENT_DAYS: i64 = 7;

/// Request-scoped filter parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterCriteria {
    /// Case-insensitive substring of the company name.
    pub company: Option<String>,
    /// Case-insensitive substring of the category.
    pub category: Option<String>,
    pub days: u32,
    pub limit: u32,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            company: None,
            category: None,
            days: DEFAULT_DAYS,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl FilterCriteria {
    /// Build validated criteria; empty filter strings count as unset.
    pub fn new(
        company: Option<String>,
        category: Option<String>,
        days: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Self, QueryError> {
        let c = Self {
            company: company.filter(|s| !s.is_empty()),
            category: category.filter(|s| !s.is_empty()),
            days: days.unwrap_or(DEFAULT_DAYS),
            limit: limit.unwrap_or(DEFAULT_LIMIT),
        };
        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(QueryError::InvalidLimit(self.limit));
        }
        if !(1..=MAX_DAYS).contains(&self.days) {
            return Err(QueryError::InvalidDays(self.days));
        }
        Ok(())
    }
}

/// Result of [`query`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub articles: Vec<ArticleView>,
    /// Matches before `limit` was applied.
    pub total_matched: usize,
}

/// Filter the snapshot relative to the current time.
pub fn query(snapshot: &Snapshot, criteria: &FilterCriteria) -> Result<QueryResult, QueryError> {
    query_at(snapshot, criteria, Utc::now())
}

/// Same as [`query`] with an explicit "now"; deterministic for fixed inputs.
pub fn query_at(
    snapshot: &Snapshot,
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> Result<QueryResult, QueryError> {
    criteria.validate()?;

    let cutoff = now - Duration::days(i64::from(criteria.days));
    let company = criteria.company.as_deref().map(str::to_lowercase);
    let category = criteria.category.as_deref().map(str::to_lowercase);

    // Records are newest first, so everything past the first too-old one is older still.
    let matched: Vec<&Record> = snapshot
        .records()
        .iter()
        .take_while(|r| r.published_at >= cutoff)
        .filter(|r| contains_ci(&r.company, company.as_deref()))
        .filter(|r| contains_ci(&r.category, category.as_deref()))
        .collect();

    let total_matched = matched.len();
    let articles = matched
        .into_iter()
        .take(criteria.limit as usize)
        .map(Record::preview)
        .collect();

    Ok(QueryResult {
        articles,
        total_matched,
    })
}

fn contains_ci(haystack: &str, needle_lower: Option<&str>) -> bool {
    match needle_lower {
        None => true,
        Some(n) => haystack.to_lowercase().contains(n),
    }
}

/// Name → article count, most frequent first (ties by name).
/// Serializes as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counts(Vec<(String, usize)>);

impl Counts {
    pub fn get(&self, name: &str) -> Option<usize> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, c)| *c)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(n, c)| (n.as_str(), *c))
    }
}

impl Serialize for Counts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(n, c)| (n, c)))
    }
}

/// Articles per company over the whole snapshot.
pub fn company_counts(snapshot: &Snapshot) -> Counts {
    count_by(snapshot, |r| &r.company)
}

/// Articles per category over the whole snapshot.
pub fn category_counts(snapshot: &Snapshot) -> Counts {
    count_by(snapshot, |r| &r.category)
}

fn count_by<F>(snapshot: &Snapshot, key: F) -> Counts
where
    F: Fn(&Record) -> &String,
{
    let mut tally: HashMap<&str, usize> = HashMap::new();
    for r in snapshot.records() {
        *tally.entry(key(r).as_str()).or_insert(0) += 1;
    }
    let mut out: Vec<(String, usize)> = tally
        .into_iter()
        .map(|(n, c)| (n.to_string(), c))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Counts(out)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub count: usize,
    pub date_range_min: Option<DateTime<Utc>>,
    pub date_range_max: Option<DateTime<Utc>>,
    pub sentiment_mean: Option<f64>,
    pub sentiment_min: Option<f64>,
    pub sentiment_max: Option<f64>,
    /// Articles published within the last 7 days.
    pub recent_count: usize,
}

pub fn statistics(snapshot: &Snapshot) -> Statistics {
    statistics_at(snapshot, Utc::now())
}

pub fn statistics_at(snapshot: &Snapshot, now: DateTime<Utc>) -> Statistics {
    let records = snapshot.records();
    let recent_cutoff = now - Duration::days(RECENT_DAYS);

    let mut sum = 0.0f64;
    let mut min: Option<f64> = None;
    let mut max: Option<f64> = None;
    let mut recent = 0usize;
    for r in records {
        sum += r.sentiment;
        min = Some(min.map_or(r.sentiment, |m| m.min(r.sentiment)));
        max = Some(max.map_or(r.sentiment, |m| m.max(r.sentiment)));
        if r.published_at >= recent_cutoff {
            recent += 1;
        }
    }

    Statistics {
        count: records.len(),
        // Sorted newest first.
        date_range_min: records.last().map(|r| r.published_at),
        date_range_max: records.first().map(|r| r.published_at),
        sentiment_mean: (!records.is_empty()).then(|| sum / records.len() as f64),
        sentiment_min: min,
        sentiment_max: max,
        recent_count: recent,
    }
}
