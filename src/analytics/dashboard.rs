//! Cached aggregation façade.
//!
//! The read path the API serves from: try a fresh cache read, fall back to
//! the aggregator, persist the result, and opportunistically capture
//! today's daily snapshot when an overview was refreshed. Concurrent
//! refreshes of the same key may both compute and both write; last write
//! wins.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::report::{DateRange, PropertyId};
use crate::storage::{CacheKey, DailySnapshot, ReportCache, SnapshotMetrics, Store};

use super::models::{Aggregate, OverviewAggregate, VersusAggregate, View};
use super::views::Aggregator;

/// Freshness windows per view. The default applies unless a view has an
/// explicit override; realtime never consults the cache at all.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    default_ttl: Duration,
    overrides: HashMap<View, Duration>,
}

impl CachePolicy {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            overrides: HashMap::new(),
        }
    }

    pub fn with_view_ttl(mut self, view: View, ttl: Duration) -> Self {
        self.overrides.insert(view, ttl);
        self
    }

    pub fn ttl_for(&self, view: View) -> Duration {
        self.overrides
            .get(&view)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

/// Map an overview aggregate onto the daily snapshot shape. Both the sync
/// job and the opportunistic refresh path go through this and the store's
/// single upsert, so the two write paths cannot diverge.
pub fn snapshot_from_overview(
    property: &PropertyId,
    day: NaiveDate,
    overview: &OverviewAggregate,
) -> DailySnapshot {
    DailySnapshot {
        property: property.resource_name().to_string(),
        day,
        metrics: SnapshotMetrics {
            sessions: overview.sessions,
            users: overview.users,
            page_views: overview.page_views,
            bounce_rate: overview.bounce_rate,
            avg_session_duration: overview.avg_session_duration,
        },
        captured_at: Utc::now().timestamp_millis(),
    }
}

pub struct Dashboard {
    aggregator: Aggregator,
    cache: ReportCache,
    store: Arc<dyn Store>,
    policy: CachePolicy,
}

impl Dashboard {
    pub fn new(
        aggregator: Aggregator,
        cache: ReportCache,
        store: Arc<dyn Store>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            aggregator,
            cache,
            store,
            policy,
        }
    }

    /// Serve one view, from cache when fresh. A hit makes no upstream
    /// call; a miss computes, persists and returns the fresh aggregate.
    pub async fn get_aggregate(
        &self,
        property: &PropertyId,
        view: View,
        range: &DateRange,
        force_refresh: bool,
    ) -> Result<Aggregate> {
        // Realtime reflects the current moment; caching it would only
        // serve stale "now".
        if view == View::Realtime {
            return self.aggregator.aggregate(view, property, range).await;
        }

        let key = CacheKey::new(property.clone(), view.as_str(), range.clone());

        if !force_refresh {
            if let Some(aggregate) = self
                .cache
                .get_if_fresh::<Aggregate>(&key, self.policy.ttl_for(view))
                .await
            {
                tracing::debug!("cache hit for {key}");
                return Ok(aggregate);
            }
        }

        let aggregate = self.aggregator.aggregate(view, property, range).await?;
        self.cache.put(&key, &aggregate).await;

        if let Aggregate::Overview(overview) = &aggregate {
            self.record_today(property, overview).await;
        }

        Ok(aggregate)
    }

    /// Overview metrics for two ranges, diffed. Both legs go through the
    /// cached path, so a versus load reuses any fresh overview entries.
    pub async fn get_versus(
        &self,
        property: &PropertyId,
        current: &DateRange,
        comparison: &DateRange,
        force_refresh: bool,
    ) -> Result<VersusAggregate> {
        let (current_agg, comparison_agg) = tokio::try_join!(
            self.get_aggregate(property, View::Overview, current, force_refresh),
            self.get_aggregate(property, View::Overview, comparison, force_refresh),
        )?;

        match (&current_agg, &comparison_agg) {
            (Aggregate::Overview(now), Aggregate::Overview(then)) => {
                Ok(VersusAggregate::from_overviews(now, then))
            }
            _ => anyhow::bail!("overview aggregation returned a non-overview payload"),
        }
    }

    /// Merge-write today's snapshot. Snapshot failures are absorbed like
    /// cache write failures; the fresh aggregate has already been served.
    async fn record_today(&self, property: &PropertyId, overview: &OverviewAggregate) {
        let snapshot = snapshot_from_overview(property, Utc::now().date_naive(), overview);
        if let Err(e) = self.store.upsert_daily_snapshot(&snapshot).await {
            tracing::warn!(
                "daily snapshot write failed for {}: {e}",
                property.resource_name()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_falls_back_to_default_ttl() {
        let policy = CachePolicy::new(Duration::from_secs(3600))
            .with_view_ttl(View::Pages, Duration::from_secs(120));

        assert_eq!(policy.ttl_for(View::Pages), Duration::from_secs(120));
        assert_eq!(policy.ttl_for(View::Overview), Duration::from_secs(3600));
    }

    #[test]
    fn snapshot_carries_the_five_core_metrics() {
        let overview = OverviewAggregate {
            sessions: 120,
            users: 80,
            page_views: 500,
            bounce_rate: 0.35,
            avg_session_duration: 95.2,
            traffic_sources: Vec::new(),
        };
        let day = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
        let snapshot =
            snapshot_from_overview(&PropertyId::new("9").unwrap(), day, &overview);

        assert_eq!(snapshot.property, "properties/9");
        assert_eq!(snapshot.day, day);
        assert_eq!(snapshot.metrics.sessions, 120);
        assert_eq!(snapshot.metrics.users, 80);
        assert_eq!(snapshot.metrics.page_views, 500);
        assert_eq!(snapshot.metrics.bounce_rate, 0.35);
        assert_eq!(snapshot.metrics.avg_session_duration, 95.2);
    }
}
