//! In-memory store used by tests and as a degraded single-process mode.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;

use crate::storage::models::{CacheEntry, DailySnapshot};
use crate::storage::trait_def::Store;

#[derive(Default)]
pub struct MemoryStore {
    cache: DashMap<String, CacheEntry>,
    snapshots: DashMap<(String, NaiveDate), DailySnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.cache.get(key).map(|entry| entry.value().clone()))
    }

    async fn cache_put(&self, entry: &CacheEntry) -> Result<()> {
        self.cache.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn upsert_daily_snapshot(&self, snapshot: &DailySnapshot) -> Result<()> {
        self.snapshots.insert(
            (snapshot.property.clone(), snapshot.day),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn daily_snapshots(
        &self,
        property: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySnapshot>> {
        let mut rows: Vec<DailySnapshot> = self
            .snapshots
            .iter()
            .filter(|entry| {
                let (prop, day) = entry.key();
                prop == property && *day >= start && *day <= end
            })
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|s| s.day);
        Ok(rows)
    }
}
