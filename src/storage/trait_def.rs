use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::storage::models::{CacheEntry, DailySnapshot};

/// Key/value document boundary. Any store with get-by-key, set-by-key
/// (with merge) and a millisecond timestamp column can back this; nothing
/// relational is required.
#[async_trait]
pub trait Store: Send + Sync {
    /// Initialize the store (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Get a cache entry by key.
    async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Unconditionally overwrite a cache entry.
    async fn cache_put(&self, entry: &CacheEntry) -> Result<()>;

    /// Merge-write the daily snapshot for `(property, day)`. Metrics
    /// overwrite, `captured_at` refreshes; the key stays unique.
    async fn upsert_daily_snapshot(&self, snapshot: &DailySnapshot) -> Result<()>;

    /// Snapshots for a property within an inclusive day range, oldest first.
    async fn daily_snapshots(
        &self,
        property: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySnapshot>>;
}
