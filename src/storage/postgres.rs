use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

use crate::storage::models::{CacheEntry, DailySnapshot, SnapshotMetrics};
use crate::storage::trait_def::Store;

pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
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

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    property: String,
    day: NaiveDate,
    sessions: i64,
    users: i64,
    page_views: i64,
    bounce_rate: f64,
    avg_session_duration: f64,
    captured_at: i64,
}

#[async_trait]
impl Store for PostgresStore {
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
                stored_at BIGINT NOT NULL
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
                day DATE NOT NULL,
                sessions BIGINT NOT NULL,
                users BIGINT NOT NULL,
                page_views BIGINT NOT NULL,
                bounce_rate DOUBLE PRECISION NOT NULL,
                avg_session_duration DOUBLE PRECISION NOT NULL,
                captured_at BIGINT NOT NULL,
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
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(|row| {
            Ok(CacheEntry {
                payload: serde_json::from_str(&row.payload)?,
                key: row.key,
                property: row.property,
                lane: row.lane,
                range_start: row.range_start,
                range_end: row.range_end,
                stored_at: row.stored_at,
            })
        })
        .transpose()
    }

    async fn cache_put(&self, entry: &CacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, property, lane, range_start, range_end, payload, stored_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (key) DO UPDATE SET
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (property, day) DO UPDATE SET
                sessions = excluded.sessions,
                users = excluded.users,
                page_views = excluded.page_views,
                bounce_rate = excluded.bounce_rate,
                avg_session_duration = excluded.avg_session_duration,
                captured_at = excluded.captured_at
            "#,
        )
        .bind(&snapshot.property)
        .bind(snapshot.day)
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
            WHERE property = $1 AND day >= $2 AND day <= $3
            ORDER BY day ASC
            "#,
        )
        .bind(property)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DailySnapshot {
                property: row.property,
                day: row.day,
                metrics: SnapshotMetrics {
                    sessions: row.sessions,
                    users: row.users,
                    page_views: row.page_views,
                    bounce_rate: row.bounce_rate,
                    avg_session_duration: row.avg_session_duration,
                },
                captured_at: row.captured_at,
            })
            .collect())
    }
}
