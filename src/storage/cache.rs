//! Timestamped cache layer over the document store.
//!
//! One entry per `(property, lane, date-range)` key. Freshness is judged
//! purely on the stored timestamp. Store failures never reach callers: a
//! failed read is a miss and a failed write is logged and dropped, since
//! the freshly computed value has already been handed back.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::report::{DateRange, PropertyId};
use crate::storage::models::CacheEntry;
use crate::storage::trait_def::Store;

/// Cache key: one slot per subject, lane and date range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub property: PropertyId,
    pub lane: String,
    pub range: DateRange,
}

impl CacheKey {
    pub fn new(property: PropertyId, lane: impl Into<String>, range: DateRange) -> Self {
        Self {
            property,
            lane: lane.into(),
            range,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.property, self.lane, self.range.start, self.range.end
        )
    }
}

/// `now - stored_at` strictly less than the window means fresh.
fn entry_is_fresh(stored_at_ms: i64, now_ms: i64, max_age: Duration) -> bool {
    let age = now_ms.saturating_sub(stored_at_ms);
    (age as i128) < max_age.as_millis() as i128
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Clone)]
pub struct ReportCache {
    store: Arc<dyn Store>,
}

impl ReportCache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fresh payload for `key`, or `None` on absence, staleness, store
    /// failure or an undeserializable payload.
    pub async fn get_if_fresh<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
        max_age: Duration,
    ) -> Option<T> {
        let entry = match self.store.cache_get(&key.to_string()).await {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!("cache read failed for {key}, treating as miss: {e}");
                return None;
            }
        };

        if !entry_is_fresh(entry.stored_at, now_ms(), max_age) {
            return None;
        }

        match serde_json::from_value(entry.payload) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!("cache payload for {key} failed to deserialize, treating as miss: {e}");
                None
            }
        }
    }

    /// Overwrite the entry for `key`, stamping the current time. Write
    /// failures are logged and swallowed.
    pub async fn put<T: Serialize>(&self, key: &CacheKey, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("cache payload for {key} failed to serialize, skipping write: {e}");
                return;
            }
        };

        let entry = CacheEntry {
            key: key.to_string(),
            property: key.property.resource_name().to_string(),
            lane: key.lane.clone(),
            range_start: key.range.start.clone(),
            range_end: key.range.end.clone(),
            payload,
            stored_at: now_ms(),
        };

        if let Err(e) = self.store.cache_put(&entry).await {
            tracing::warn!("cache write failed for {key}: {e}");
        }
    }
}
