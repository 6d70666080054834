//! AI-written insight summaries over the overview aggregate.
//!
//! Insights are supplementary: a failed or garbled generation degrades to
//! canned fallback content, never to an error the UI has to render. Results
//! cache on their own lane with a daily freshness window.

pub mod llm;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::{Aggregate, Dashboard, OverviewAggregate, View};
use crate::report::{DateRange, PropertyId};
use crate::storage::{CacheKey, ReportCache};

pub use llm::{HttpTextGenerator, TextGenerator};

/// Cache lane for insight sets; report views use their view name.
const INSIGHTS_LANE: &str = "insights";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsightKind {
    Insight,
    Trend,
    Suggestion,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSet {
    pub insights: Vec<Insight>,
}

const SYSTEM_PROMPT: &str = "You are an analytics assistant for a website dashboard. \
Given traffic metrics for a date range, write a handful of short, concrete takeaways. \
Respond with a single JSON object of the form \
{\"insights\": [{\"type\": \"Insight\" | \"Trend\" | \"Suggestion\" | \"Alert\", \
\"title\": string, \"description\": string, \"content\": string}]} \
and nothing else. Two to four entries.";

fn build_user_prompt(overview: &OverviewAggregate, range: &DateRange) -> String {
    let mut prompt = format!(
        "Date range: {} to {}\n\
         Sessions: {}\n\
         Users: {}\n\
         Page views: {}\n\
         Bounce rate: {:.2}\n\
         Avg session duration: {:.1}s\n",
        range.start,
        range.end,
        overview.sessions,
        overview.users,
        overview.page_views,
        overview.bounce_rate,
        overview.avg_session_duration,
    );

    if !overview.traffic_sources.is_empty() {
        prompt.push_str("Top traffic sources:\n");
        for source in &overview.traffic_sources {
            prompt.push_str(&format!(
                "- {}: {} sessions ({:.1}%)\n",
                source.source, source.sessions, source.percentage
            ));
        }
    }

    prompt
}

/// Parse the model's reply into an insight set. Entries with an
/// unrecognized type are dropped; an unparsable reply or one with no
/// usable entries is an error (the caller falls back).
fn parse_insights(raw: &str) -> Result<InsightSet> {
    let trimmed = strip_code_fences(raw);
    let value: serde_json::Value = serde_json::from_str(trimmed)?;

    let Some(entries) = value.get("insights").and_then(|v| v.as_array()) else {
        bail!("generative reply is missing the 'insights' array");
    };

    let insights: Vec<Insight> = entries
        .iter()
        .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
        .collect();

    if insights.is_empty() {
        bail!("generative reply contained no usable insights");
    }

    Ok(InsightSet { insights })
}

/// Models occasionally wrap JSON in a markdown fence despite instructions.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Fixed content served when generation is unavailable.
fn fallback_insights() -> InsightSet {
    InsightSet {
        insights: vec![
            Insight {
                kind: InsightKind::Insight,
                title: "Insights are taking a moment".to_string(),
                description: "The insight service is busy right now.".to_string(),
                content: "Your report data is up to date; automatic takeaways will return \
                          shortly. Check back in a few minutes."
                    .to_string(),
            },
            Insight {
                kind: InsightKind::Suggestion,
                title: "Explore the dashboard".to_string(),
                description: "Dig into the detailed views while you wait.".to_string(),
                content: "The pages, devices and acquisition views are refreshed and ready."
                    .to_string(),
            },
        ],
    }
}

pub struct InsightGenerator {
    dashboard: Arc<Dashboard>,
    generator: Arc<dyn TextGenerator>,
    cache: ReportCache,
    ttl: Duration,
}

impl InsightGenerator {
    pub fn new(
        dashboard: Arc<Dashboard>,
        generator: Arc<dyn TextGenerator>,
        cache: ReportCache,
        ttl: Duration,
    ) -> Self {
        Self {
            dashboard,
            generator,
            cache,
            ttl,
        }
    }

    /// Cached insight set for the property and range. Never fails: any
    /// aggregation, generation or parse problem degrades to fallback
    /// content, which is returned but not cached.
    pub async fn get_insights(&self, property: &PropertyId, range: &DateRange) -> InsightSet {
        let key = CacheKey::new(property.clone(), INSIGHTS_LANE, range.clone());

        if let Some(set) = self.cache.get_if_fresh::<InsightSet>(&key, self.ttl).await {
            return set;
        }

        match self.generate(property, range).await {
            Ok(set) => {
                self.cache.put(&key, &set).await;
                set
            }
            Err(e) => {
                tracing::warn!(
                    "insight generation failed for {}, serving fallback: {e}",
                    property.resource_name()
                );
                fallback_insights()
            }
        }
    }

    async fn generate(&self, property: &PropertyId, range: &DateRange) -> Result<InsightSet> {
        let aggregate = self
            .dashboard
            .get_aggregate(property, View::Overview, range, false)
            .await?;
        let Aggregate::Overview(overview) = &aggregate else {
            bail!("overview aggregation returned a non-overview payload");
        };

        let user_prompt = build_user_prompt(overview, range);
        let reply = self.generator.generate(SYSTEM_PROMPT, &user_prompt).await?;
        parse_insights(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_reply() {
        let raw = r#"{"insights": [
            {"type": "Insight", "title": "Traffic is steady", "description": "d", "content": "c"},
            {"type": "Trend", "title": "Mobile rising", "description": "d", "content": "c"}
        ]}"#;

        let set = parse_insights(raw).unwrap();
        assert_eq!(set.insights.len(), 2);
        assert_eq!(set.insights[0].kind, InsightKind::Insight);
        assert_eq!(set.insights[1].kind, InsightKind::Trend);
    }

    #[test]
    fn tolerates_markdown_fences() {
        let raw = "```json\n{\"insights\": [{\"type\": \"Alert\", \"title\": \"t\", \"description\": \"d\", \"content\": \"c\"}]}\n```";
        let set = parse_insights(raw).unwrap();
        assert_eq!(set.insights[0].kind, InsightKind::Alert);
    }

    #[test]
    fn drops_entries_with_unrecognized_types() {
        let raw = r#"{"insights": [
            {"type": "Prophecy", "title": "t", "description": "d", "content": "c"},
            {"type": "Suggestion", "title": "t", "description": "d", "content": "c"}
        ]}"#;

        let set = parse_insights(raw).unwrap();
        assert_eq!(set.insights.len(), 1);
        assert_eq!(set.insights[0].kind, InsightKind::Suggestion);
    }

    #[test]
    fn rejects_replies_with_no_usable_entries() {
        assert!(parse_insights("not json at all").is_err());
        assert!(parse_insights(r#"{"insights": []}"#).is_err());
        assert!(
            parse_insights(r#"{"insights": [{"type": "Prophecy", "title": "t", "description": "d", "content": "c"}]}"#)
                .is_err()
        );
        assert!(parse_insights(r#"{"summary": "no insights key"}"#).is_err());
    }

    #[test]
    fn fallback_content_is_non_empty_and_well_typed() {
        let set = fallback_insights();
        assert!(!set.insights.is_empty());
        assert!(set
            .insights
            .iter()
            .any(|i| matches!(i.kind, InsightKind::Insight | InsightKind::Suggestion)));
    }

    #[test]
    fn user_prompt_embeds_metrics_and_sources() {
        let overview = OverviewAggregate {
            sessions: 120,
            users: 80,
            page_views: 500,
            bounce_rate: 0.35,
            avg_session_duration: 95.2,
            traffic_sources: vec![crate::analytics::TrafficSource {
                source: "google".to_string(),
                sessions: 120,
                percentage: 100.0,
            }],
        };
        let prompt = build_user_prompt(&overview, &DateRange::last_30_days());

        assert!(prompt.contains("Sessions: 120"));
        assert!(prompt.contains("google: 120 sessions (100.0%)"));
        assert!(prompt.contains("30daysAgo to today"));
    }
}
