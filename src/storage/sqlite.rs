use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::storage::models::{CacheEntry, DailySnapshot, SnapshotMetrics};
use crate::storage::trait_def::Store;

pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[derive(sqlx::FromRow)]
struct CacheEntryRow {
    key: String,
    property: String,
    lane: String,
    range_start: String,
    range_end: String,
    payload: String,
    stored_at: i64,
}

impl CacheEntryRow {
    fn into_entry(self) -> Result<CacheEntry> {
        Ok(CacheEntry {
            payload: serde_json::from_str(&self.payload)?,
            key: self.key,
            property: self.property,
            lane: self.lane,
            range_start: self.range_start,
            range_end: self.range_end,
            stored_at: self.stored_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    property: String,
    day: String,
    sessions: i64,
    users: i64,
    page_views: i64,
    bounce_rate: f64,
    avg_session_duration: f64,
    captured_at: i64,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<DailySnapshot> {
        Ok(DailySnapshot {
            day: NaiveDate::parse_from_str(&self.day, "%Y-%m-%d")?,
            property: self.property,
            metrics: SnapshotMetrics {
                sessions: self.sessions,
                users: self.users,
                page_views: self.page_views,
                bounce_rate: self.bounce_rate,
                avg_session_duration: self.avg_session_duration,
            },
            captured_at: self.captured_at,
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                property TEXT NOT NULL,
                lane TEXT NOT NULL,
                range_start TEXT NOT NULL,
                range_end TEXT NOT NULL,
                payload TEXT NOT NULL,
                stored_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_property ON cache_entries(property)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_snapshots (
                property TEXT NOT NULL,
                day TEXT NOT NULL,
                sessions INTEGER NOT NULL,
                users INTEGER NOT NULL,
                page_views INTEGER NOT NULL,
                bounce_rate REAL NOT NULL,
                avg_session_duration REAL NOT NULL,
                captured_at INTEGER NOT NULL,
                PRIMARY KEY (property, day)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, CacheEntryRow>(
            r#"
            SELECT key, property, lane, range_start, range_end, payload, stored_at
            FROM cache_entries
            WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(CacheEntryRow::into_entry).transpose()
    }

    async fn cache_put(&self, entry: &CacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, property, lane, range_start, range_end, payload, stored_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                stored_at = excluded.stored_at
            "#,
        )
        .bind(&entry.key)
        .bind(&entry.property)
        .bind(&entry.lane)
        .bind(&entry.range_start)
        .bind(&entry.range_end)
        .bind(serde_json::to_string(&entry.payload)?)
        .bind(entry.stored_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn upsert_daily_snapshot(&self, snapshot: &DailySnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_snapshots
                (property, day, sessions, users, page_views, bounce_rate, avg_session_duration, captured_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(property, day) DO UPDATE SET
                sessions = excluded.sessions,
                users = excluded.users,
                page_views = excluded.page_views,
                bounce_rate = excluded.bounce_rate,
                avg_session_duration = excluded.avg_session_duration,
                captured_at = excluded.captured_at
            "#,
        )
        .bind(&snapshot.property)
        .bind(snapshot.day.format("%Y-%m-%d").to_string())
        .bind(snapshot.metrics.sessions)
        .bind(snapshot.metrics.users)
        .bind(snapshot.metrics.page_views)
        .bind(snapshot.metrics.bounce_rate)
        .bind(snapshot.metrics.avg_session_duration)
        .bind(snapshot.captured_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn daily_snapshots(
        &self,
        property: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT property, day, sessions, users, page_views, bounce_rate, avg_session_duration, captured_at
            FROM daily_snapshots
            WHERE property = ? AND day >= ? AND day <= ?
            ORDER BY day ASC
            "#,
        )
        .bind(property)
        .bind(start.format("%Y-%m-%d").to_string())
        .bind(end.format("%Y-%m-%d").to_string())
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }
}
