//! Persisted shapes: cache entries and daily metric snapshots.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One cached payload. Overwritten in place on refresh, never versioned,
/// never explicitly deleted; a stale entry is superseded by the next write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// `property:lane:start:end`
    pub key: String,
    pub property: String,
    /// View name, or `insights` for the insight lane.
    pub lane: String,
    pub range_start: String,
    pub range_end: String,
    /// Serialized aggregate or insight set.
    pub payload: serde_json::Value,
    /// Unix milliseconds at write time.
    pub stored_at: i64,
}

/// The five core metrics captured per property per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetrics {
    pub sessions: i64,
    pub users: i64,
    pub page_views: i64,
    pub bounce_rate: f64,
    pub avg_session_duration: f64,
}

/// Append-only daily record keyed by `(property, day)`. Both the sync job
/// and the opportunistic overview-refresh path write through the same
/// upsert, so repeated intraday refreshes merge instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub property: String,
    pub day: NaiveDate,
    pub metrics: SnapshotMetrics,
    /// Unix milliseconds of the most recent capture.
    pub captured_at: i64,
}
