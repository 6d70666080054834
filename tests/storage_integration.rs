//! Integration tests for the SQLite store backend.

use chrono::NaiveDate;
use vantage::storage::{CacheEntry, DailySnapshot, SnapshotMetrics, SqliteStore, Store};

async fn store() -> SqliteStore {
    let store = SqliteStore::new("sqlite::memory:").await.unwrap();
    store.init().await.unwrap();
    store
}

fn entry(key: &str, stored_at: i64, payload: serde_json::Value) -> CacheEntry {
    CacheEntry {
        key: key.to_string(),
        property: "properties/123".to_string(),
        lane: "overview".to_string(),
        range_start: "30daysAgo".to_string(),
        range_end: "today".to_string(),
        payload,
        stored_at,
    }
}

fn snapshot(day: NaiveDate, sessions: i64) -> DailySnapshot {
    DailySnapshot {
        property: "properties/123".to_string(),
        day,
        metrics: SnapshotMetrics {
            sessions,
            users: sessions / 2,
            page_views: sessions * 4,
            bounce_rate: 0.42,
            avg_session_duration: 77.5,
        },
        captured_at: 1_700_000_000_000,
    }
}

#[tokio::test]
async fn cache_entries_round_trip() {
    let store = store().await;
    let key = "properties/123:overview:30daysAgo:today";

    assert!(store.cache_get(key).await.unwrap().is_none());

    store
        .cache_put(&entry(key, 1000, serde_json::json!({"sessions": 120})))
        .await
        .unwrap();

    let read = store.cache_get(key).await.unwrap().unwrap();
    assert_eq!(read.key, key);
    assert_eq!(read.lane, "overview");
    assert_eq!(read.stored_at, 1000);
    assert_eq!(read.payload["sessions"], 120);
}

#[tokio::test]
async fn cache_put_supersedes_the_previous_entry() {
    let store = store().await;
    let key = "properties/123:overview:30daysAgo:today";

    store
        .cache_put(&entry(key, 1000, serde_json::json!({"sessions": 120})))
        .await
        .unwrap();
    store
        .cache_put(&entry(key, 2000, serde_json::json!({"sessions": 150})))
        .await
        .unwrap();

    let read = store.cache_get(key).await.unwrap().unwrap();
    assert_eq!(read.stored_at, 2000);
    assert_eq!(read.payload["sessions"], 150);
}

#[tokio::test]
async fn snapshots_upsert_and_read_back_in_day_order() {
    let store = store().await;
    let d1 = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
    let d2 = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap();

    store.upsert_daily_snapshot(&snapshot(d2, 40)).await.unwrap();
    store.upsert_daily_snapshot(&snapshot(d1, 20)).await.unwrap();
    // Same-day rewrite merges instead of duplicating.
    store.upsert_daily_snapshot(&snapshot(d1, 30)).await.unwrap();

    let rows = store
        .daily_snapshots("properties/123", d1, d2)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].day, d1);
    assert_eq!(rows[0].metrics.sessions, 30);
    assert_eq!(rows[1].day, d2);
    assert_eq!(rows[1].metrics.sessions, 40);
    assert_eq!(rows[1].metrics.bounce_rate, 0.42);
}

#[tokio::test]
async fn snapshot_reads_are_scoped_to_the_property() {
    let store = store().await;
    let day = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();

    store.upsert_daily_snapshot(&snapshot(day, 20)).await.unwrap();

    let rows = store
        .daily_snapshots("properties/999", day, day)
        .await
        .unwrap();
    assert!(rows.is_empty());
}
