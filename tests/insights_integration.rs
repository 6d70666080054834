//! Integration tests for the insight lane: caching, parsing and the
//! degrade-not-fail fallback.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vantage::analytics::{Aggregator, CachePolicy, Dashboard};
use vantage::auth::{BearerToken, StaticTokenProvider};
use vantage::insights::{InsightGenerator, InsightKind, TextGenerator};
use vantage::report::{
    DateRange, PropertyDetails, PropertyId, ReportQuery, ReportResult, ReportRow,
    ReportingClient,
};
use vantage::storage::{MemoryStore, ReportCache, Store};

/// Upstream fake serving a fixed overview.
struct FixedClient;

#[async_trait]
impl ReportingClient for FixedClient {
    async fn fetch_report(
        &self,
        query: &ReportQuery,
        _token: &BearerToken,
    ) -> ReportResult<Vec<ReportRow>> {
        if query.dimensions.is_empty() {
            Ok(vec![ReportRow {
                dimensions: Vec::new(),
                metrics: ["120", "80", "500", "0.35", "95.2"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }])
        } else {
            Ok(vec![ReportRow {
                dimensions: vec!["google".to_string()],
                metrics: vec!["120".to_string()],
            }])
        }
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
        property: &PropertyId,
        _token: &BearerToken,
    ) -> ReportResult<PropertyDetails> {
        Ok(PropertyDetails {
            property: property.clone(),
            display_name: "Test".to_string(),
            time_zone: None,
            currency_code: None,
        })
    }
}

/// Scripted generative-text service.
struct ScriptedGenerator {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn succeeding(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // The prompt must embed the aggregate, whatever the outcome.
        assert!(user_prompt.contains("Sessions: 120"));
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => anyhow::bail!("model overloaded"),
        }
    }
}

fn insight_generator(generator: Arc<ScriptedGenerator>) -> InsightGenerator {
    let store = Arc::new(MemoryStore::new()) as Arc<dyn Store>;
    let tokens = Arc::new(StaticTokenProvider::new(BearerToken::new("t").unwrap()));
    let dashboard = Arc::new(Dashboard::new(
        Aggregator::new(Arc::new(FixedClient), tokens),
        ReportCache::new(Arc::clone(&store)),
        Arc::clone(&store),
        CachePolicy::new(Duration::from_secs(3600)),
    ));
    InsightGenerator::new(
        dashboard,
        generator,
        ReportCache::new(store),
        Duration::from_secs(86_400),
    )
}

fn property() -> PropertyId {
    PropertyId::new("123").unwrap()
}

const GOOD_REPLY: &str = r#"{"insights": [
    {"type": "Insight", "title": "Search drives traffic", "description": "d", "content": "c"},
    {"type": "Suggestion", "title": "Reduce bounce", "description": "d", "content": "c"}
]}"#;

#[tokio::test]
async fn generated_insights_are_cached_for_the_day() {
    let generator = Arc::new(ScriptedGenerator::succeeding(GOOD_REPLY));
    let insights = insight_generator(Arc::clone(&generator));
    let range = DateRange::last_30_days();

    let first = insights.get_insights(&property(), &range).await;
    assert_eq!(first.insights.len(), 2);
    assert_eq!(generator.call_count(), 1);

    // Second read comes from the cache lane, not the model.
    let second = insights.get_insights(&property(), &range).await;
    assert_eq!(second, first);
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn distinct_ranges_generate_independently() {
    let generator = Arc::new(ScriptedGenerator::succeeding(GOOD_REPLY));
    let insights = insight_generator(Arc::clone(&generator));

    insights
        .get_insights(&property(), &DateRange::last_30_days())
        .await;
    insights
        .get_insights(&property(), &DateRange::new("7daysAgo", "today").unwrap())
        .await;

    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn a_failing_model_degrades_to_fallback_content() {
    let generator = Arc::new(ScriptedGenerator::failing());
    let insights = insight_generator(Arc::clone(&generator));

    let set = insights
        .get_insights(&property(), &DateRange::last_30_days())
        .await;

    assert!(!set.insights.is_empty());
    assert!(set
        .insights
        .iter()
        .any(|i| matches!(i.kind, InsightKind::Insight | InsightKind::Suggestion)));
}

#[tokio::test]
async fn fallback_content_is_not_cached() {
    let generator = Arc::new(ScriptedGenerator::failing());
    let insights = insight_generator(Arc::clone(&generator));
    let range = DateRange::last_30_days();

    insights.get_insights(&property(), &range).await;
    insights.get_insights(&property(), &range).await;

    // Each read retried the model instead of pinning the canned content
    // for a day.
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn garbled_model_output_also_degrades_to_fallback() {
    let generator = Arc::new(ScriptedGenerator::succeeding("definitely not json"));
    let insights = insight_generator(Arc::clone(&generator));

    let set = insights
        .get_insights(&property(), &DateRange::last_30_days())
        .await;

    assert!(!set.insights.is_empty());
    assert!(set
        .insights
        .iter()
        .any(|i| matches!(i.kind, InsightKind::Insight | InsightKind::Suggestion)));
}
