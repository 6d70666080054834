//! Daily metrics sync.
//!
//! Batch driver that captures one overview snapshot per property for a
//! target day, independent of the read-path cache. Subjects run
//! sequentially to bound simultaneous upstream load; one subject failing
//! never aborts the batch.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::analytics::{snapshot_from_overview, Aggregator};
use crate::report::{DateRange, PropertyId};
use crate::storage::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSubject {
    pub property: PropertyId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Failed,
}

/// Per-subject result. The job never reports a single pass/fail verdict;
/// callers get one outcome per subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub property: PropertyId,
    pub name: String,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct SyncJob {
    aggregator: Aggregator,
    store: Arc<dyn Store>,
}

impl SyncJob {
    pub fn new(aggregator: Aggregator, store: Arc<dyn Store>) -> Self {
        Self { aggregator, store }
    }

    pub async fn run(&self, subjects: &[SyncSubject], target_date: NaiveDate) -> Vec<SyncOutcome> {
        info!(
            "starting daily sync for {} properties, target date {target_date}",
            subjects.len()
        );

        let mut outcomes = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let outcome = match self.sync_one(&subject.property, target_date).await {
                Ok(()) => SyncOutcome {
                    property: subject.property.clone(),
                    name: subject.name.clone(),
                    status: SyncStatus::Synced,
                    error: None,
                },
                Err(e) => {
                    warn!(
                        "sync failed for {} ({}): {e:#}",
                        subject.name,
                        subject.property.resource_name()
                    );
                    SyncOutcome {
                        property: subject.property.clone(),
                        name: subject.name.clone(),
                        status: SyncStatus::Failed,
                        error: Some(format!("{e:#}")),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let failed = outcomes
            .iter()
            .filter(|o| o.status == SyncStatus::Failed)
            .count();
        info!(
            "daily sync finished: {} synced, {failed} failed",
            outcomes.len() - failed
        );

        outcomes
    }

    async fn sync_one(&self, property: &PropertyId, date: NaiveDate) -> anyhow::Result<()> {
        let range = DateRange::single_day(date);
        let overview = self.aggregator.overview(property, &range).await?;
        let snapshot = snapshot_from_overview(property, date, &overview);
        self.store.upsert_daily_snapshot(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{BearerToken, StaticTokenProvider};
    use crate::report::{
        PropertyDetails, ReportError, ReportQuery, ReportResult, ReportRow, ReportingClient,
    };
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    /// Upstream fake that fails every query for one property.
    struct PartialOutage {
        broken_property: PropertyId,
    }

    #[async_trait]
    impl ReportingClient for PartialOutage {
        async fn fetch_report(
            &self,
            query: &ReportQuery,
            _token: &BearerToken,
        ) -> ReportResult<Vec<ReportRow>> {
            if query.property == self.broken_property {
                return Err(ReportError::Upstream {
                    status: reqwest::StatusCode::TOO_MANY_REQUESTS,
                    body: "quota exceeded".to_string(),
                });
            }
            Ok(vec![ReportRow {
                dimensions: Vec::new(),
                metrics: vec![
                    "10".to_string(),
                    "8".to_string(),
                    "25".to_string(),
                    "0.5".to_string(),
                    "60.0".to_string(),
                ],
            }])
        }

        async fn fetch_realtime_report(
            &self,
            _query: &ReportQuery,
            _token: &BearerToken,
        ) -> ReportResult<Vec<ReportRow>> {
            Ok(Vec::new())
        }

        async fn fetch_property_details(
            &self,
            _property: &PropertyId,
            _token: &BearerToken,
        ) -> ReportResult<PropertyDetails> {
            Err(ReportError::Upstream {
                status: reqwest::StatusCode::NOT_FOUND,
                body: "not stubbed".to_string(),
            })
        }
    }

    fn subjects() -> Vec<SyncSubject> {
        [("1", "Alpha"), ("2", "Beta"), ("3", "Gamma")]
            .into_iter()
            .map(|(id, name)| SyncSubject {
                property: PropertyId::new(id).unwrap(),
                name: name.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn one_failing_subject_does_not_abort_the_batch() {
        let client = PartialOutage {
            broken_property: PropertyId::new("2").unwrap(),
        };
        let tokens = StaticTokenProvider::new(BearerToken::new("t").unwrap());
        let store = Arc::new(MemoryStore::new());
        let job = SyncJob::new(
            Aggregator::new(Arc::new(client), Arc::new(tokens)),
            Arc::clone(&store) as Arc<dyn Store>,
        );

        let date = NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();
        let outcomes = job.run(&subjects(), date).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].status, SyncStatus::Synced);
        assert_eq!(outcomes[1].status, SyncStatus::Failed);
        assert!(outcomes[1].error.as_deref().unwrap().contains("429"));
        assert_eq!(outcomes[2].status, SyncStatus::Synced);

        // The healthy subjects' snapshots landed; the broken one wrote
        // nothing.
        let ok = store
            .daily_snapshots("properties/1", date, date)
            .await
            .unwrap();
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].metrics.sessions, 10);
        let broken = store
            .daily_snapshots("properties/2", date, date)
            .await
            .unwrap();
        assert!(broken.is_empty());
    }

    #[tokio::test]
    async fn rerunning_the_job_merges_rather_than_duplicates() {
        let client = PartialOutage {
            broken_property: PropertyId::new("999").unwrap(),
        };
        let tokens = StaticTokenProvider::new(BearerToken::new("t").unwrap());
        let store = Arc::new(MemoryStore::new());
        let job = SyncJob::new(
            Aggregator::new(Arc::new(client), Arc::new(tokens)),
            Arc::clone(&store) as Arc<dyn Store>,
        );

        let date = NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();
        let subjects = subjects();
        job.run(&subjects, date).await;
        job.run(&subjects, date).await;

        let rows = store
            .daily_snapshots("properties/1", date, date)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
