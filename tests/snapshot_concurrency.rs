// tests/snapshot_concurrency.rs
//
// Readers racing a publish must each see one whole snapshot, never a mix.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tokio::sync::Barrier;

use news_snapshot_api::query::{query, FilterCriteria};
use news_snapshot_api::record::{DataSource, Record};
use news_snapshot_api::snapshot::{Snapshot, SnapshotStore};

/// Every record in a snapshot carries the same tag in `company`.
fn tagged(tag: &str, n: i64) -> Snapshot {
    let base = Utc::now();
    let records = (0..n)
        .map(|i| Record {
            id: i,
            title: format!("{tag}-{i}"),
            body: tag.repeat(300),
            published_at: base - Duration::minutes(i),
            company: tag.to_string(),
            category: "Markets".into(),
            sentiment: 0.0,
            url: String::new(),
        })
        .collect();
    Snapshot::new(records, DataSource::Remote, base)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundred_readers_see_whole_snapshots_during_publish() {
    let store = SnapshotStore::new();
    store.publish(tagged("AAA", 500));

    let barrier = Arc::new(Barrier::new(101));
    let mut readers = Vec::new();
    for _ in 0..100 {
        let store = store.clone();
        let barrier = barrier.clone();
        readers.push(tokio::spawn(async move {
            barrier.wait().await;
            let snap = store.current();
            let tag = snap.records()[0].company.clone();
            let criteria = FilterCriteria::new(None, None, Some(30), Some(100)).unwrap();
            let out = query(&snap, &criteria).unwrap();
            assert_eq!(out.total_matched, snap.count());
            assert!(snap.records().iter().all(|r| r.company == tag));
            assert!(out.articles.iter().all(|a| a.company == tag));
            (tag, snap.generation())
        }));
    }

    barrier.wait().await;
    let published = store.publish(tagged("BBB", 700));
    assert_eq!(store.current().generation(), published.generation());

    for r in readers {
        let (tag, generation) = r.await.expect("reader task");
        match tag.as_str() {
            "AAA" => assert_eq!(generation, 1),
            "BBB" => assert_eq!(generation, 2),
            other => panic!("unexpected tag {other}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishers_serialize_with_distinct_generations() {
    let store = SnapshotStore::new();
    let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let snap = Snapshot::new(Vec::new(), DataSource::Local, ts + Duration::seconds(i));
            store.publish(snap).generation()
        }));
    }
    let mut gens = Vec::new();
    for h in handles {
        gens.push(h.await.unwrap());
    }
    gens.sort_unstable();
    assert_eq!(gens, (1..=16).collect::<Vec<u64>>());
    assert_eq!(store.current().generation(), 16);
}

#[test]
fn publish_then_current_returns_the_published_snapshot() {
    let store = SnapshotStore::new();
    for i in 0..50 {
        let published = store.publish(tagged(&format!("T{i}"), 3));
        assert!(Arc::ptr_eq(&published, &store.current()));
    }
}
