//! Writes a deterministic sample news dataset to the configured local path,
//! so the service can start without remote storage.
//!
//! Usage: `seed_dataset [COUNT] [OUTPUT]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use news_snapshot_api::config::ServiceConfig;
use news_snapshot_api::ingest::parquet::encode_articles;
use news_snapshot_api::record::Record;

const COMPANIES: &[&str] = &[
    "Microsoft", "Apple", "Google", "Amazon", "Tesla", "Meta", "Netflix", "Nvidia",
];
const CATEGORIES: &[&str] = &[
    "Technology", "Finance", "Healthcare", "Energy", "Retail", "Automotive",
];
const HEADLINES: &[&str] = &[
    "{c} Announces New {k} Initiative",
    "{c} Partners with Industry Leader in {k}",
    "{c} Reports Strong {k} Growth",
    "{c} Launches Revolutionary {k} Platform",
    "{c} Expands {k} Operations Globally",
];
const DEFAULT_COUNT: usize = 200;

fn sample_records(count: usize, now: DateTime<Utc>) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let company = COMPANIES[i % COMPANIES.len()];
            // Offset by i / len so every company meets every category.
            let category = CATEGORIES[(i + i / COMPANIES.len()) % CATEGORIES.len()];
            let title = HEADLINES[i % HEADLINES.len()]
                .replace("{c}", company)
                .replace("{k}", category);
            // Spread over the last 30 days, one step every 3.6 hours.
            let published_at = now - Duration::minutes((i as i64 * 216) % (30 * 24 * 60));
            // Deterministic pseudo-sentiment in [-1, 1].
            let sentiment = ((i * 37) % 201) as f64 / 100.0 - 1.0;
            Record {
                id: i as i64 + 1,
                body: format!(
                    "{title}. {company} shared an update on its {} strategy today, \
                     outlining plans for the coming quarters and commenting on market \
                     conditions, competition and expected demand across key regions.",
                    category.to_lowercase()
                ),
                title,
                published_at,
                company: company.to_string(),
                category: category.to_string(),
                sentiment,
                url: format!("https://news.example.com/articles/{}", i + 1),
            }
        })
        .collect()
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let mut args = std::env::args().skip(1);
    let count = match args.next() {
        Some(n) => n.parse::<usize>().context("COUNT must be a number")?,
        None => DEFAULT_COUNT,
    };
    let output = match args.next() {
        Some(p) => PathBuf::from(p),
        None => ServiceConfig::load()?.local.dataset_path,
    };

    let records = sample_records(count, Utc::now());
    let bytes = encode_articles(&records)?;
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    std::fs::write(&output, &bytes).with_context(|| format!("writing {}", output.display()))?;

    tracing::info!(count, bytes = bytes.len(), path = %output.display(), "sample dataset written");
    Ok(())
}
