//! HTTP client for the upstream reporting API.
//!
//! Pure I/O wrapper: one request per call, errors surfaced as-is, no
//! retries. Retry policy, if any, belongs to callers.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::auth::BearerToken;
use crate::report::query::{ReportQuery, SortOrder};
use crate::report::rows::ReportRow;
use crate::report::PropertyDetails;
use crate::report::PropertyId;

#[derive(Debug, Error)]
pub enum ReportError {
    /// Non-success HTTP status from the upstream API.
    #[error("upstream reporting API returned {status}: {body}")]
    Upstream { status: StatusCode, body: String },

    /// The call could not complete at all.
    #[error("network error talking to the reporting API: {0}")]
    Network(#[from] reqwest::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Boundary to the upstream reporting API. The HTTP implementation is
/// [`HttpReportingClient`]; tests substitute call-counting fakes.
#[async_trait]
pub trait ReportingClient: Send + Sync {
    /// Run one report query and return raw rows.
    async fn fetch_report(
        &self,
        query: &ReportQuery,
        token: &BearerToken,
    ) -> ReportResult<Vec<ReportRow>>;

    /// Run one realtime query (no date range; reflects the last ~30 min).
    async fn fetch_realtime_report(
        &self,
        query: &ReportQuery,
        token: &BearerToken,
    ) -> ReportResult<Vec<ReportRow>>;

    /// Fetch display metadata for a property.
    async fn fetch_property_details(
        &self,
        property: &PropertyId,
        token: &BearerToken,
    ) -> ReportResult<PropertyDetails>;
}

pub struct HttpReportingClient {
    base_url: String,
    client: Client,
}

impl HttpReportingClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("vantage/0.1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post_report(
        &self,
        url: &str,
        body: &WireRequest,
        token: &BearerToken,
    ) -> ReportResult<Vec<ReportRow>> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token.as_str())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Upstream { status, body });
        }

        let wire: WireResponse = response.json().await?;
        Ok(wire.into_rows())
    }
}

#[async_trait]
impl ReportingClient for HttpReportingClient {
    async fn fetch_report(
        &self,
        query: &ReportQuery,
        token: &BearerToken,
    ) -> ReportResult<Vec<ReportRow>> {
        let url = format!(
            "{}/v1beta/{}:runReport",
            self.base_url,
            query.property.resource_name()
        );
        self.post_report(&url, &WireRequest::from_query(query, true), token)
            .await
    }

    async fn fetch_realtime_report(
        &self,
        query: &ReportQuery,
        token: &BearerToken,
    ) -> ReportResult<Vec<ReportRow>> {
        let url = format!(
            "{}/v1beta/{}:runRealtimeReport",
            self.base_url,
            query.property.resource_name()
        );
        self.post_report(&url, &WireRequest::from_query(query, false), token)
            .await
    }

    async fn fetch_property_details(
        &self,
        property: &PropertyId,
        token: &BearerToken,
    ) -> ReportResult<PropertyDetails> {
        let url = format!("{}/v1beta/{}", self.base_url, property.resource_name());
        let response = self
            .client
            .get(&url)
            .bearer_auth(token.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Upstream { status, body });
        }

        let wire: WirePropertyDetails = response.json().await?;
        Ok(PropertyDetails {
            property: property.clone(),
            display_name: wire.display_name.unwrap_or_else(|| "Untitled".to_string()),
            time_zone: wire.time_zone,
            currency_code: wire.currency_code,
        })
    }
}

// Wire types. All upstream values are strings regardless of logical type;
// parsing happens in the aggregation layer.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    date_ranges: Vec<WireDateRange>,
    dimensions: Vec<WireName>,
    metrics: Vec<WireName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    order_bys: Vec<WireOrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDateRange {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Serialize)]
struct WireName {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireOrderBy {
    metric: WireOrderByMetric,
    desc: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireOrderByMetric {
    metric_name: String,
}

impl WireRequest {
    fn from_query(query: &ReportQuery, with_date_range: bool) -> Self {
        let date_ranges = if with_date_range {
            vec![WireDateRange {
                start_date: query.date_range.start.clone(),
                end_date: query.date_range.end.clone(),
            }]
        } else {
            Vec::new()
        };

        Self {
            date_ranges,
            dimensions: query
                .dimensions
                .iter()
                .map(|name| WireName { name: name.clone() })
                .collect(),
            metrics: query
                .metrics
                .iter()
                .map(|name| WireName { name: name.clone() })
                .collect(),
            order_bys: query
                .order_by
                .iter()
                .map(|ob| WireOrderBy {
                    metric: WireOrderByMetric {
                        metric_name: ob.metric.clone(),
                    },
                    desc: matches!(ob.order, SortOrder::Descending),
                })
                .collect(),
            limit: query.limit,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    rows: Vec<WireRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRow {
    #[serde(default)]
    dimension_values: Vec<WireValue>,
    #[serde(default)]
    metric_values: Vec<WireValue>,
}

#[derive(Debug, Deserialize)]
struct WireValue {
    #[serde(default)]
    value: String,
}

impl WireResponse {
    fn into_rows(self) -> Vec<ReportRow> {
        // Upstream ordering is preserved; no re-sorting here.
        self.rows
            .into_iter()
            .map(|row| ReportRow {
                dimensions: row.dimension_values.into_iter().map(|v| v.value).collect(),
                metrics: row.metric_values.into_iter().map(|v| v.value).collect(),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePropertyDetails {
    display_name: Option<String>,
    time_zone: Option<String>,
    currency_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::query::{DateRange, PropertyId};

    #[test]
    fn wire_request_carries_query_clauses() {
        let query = ReportQuery::new(
            PropertyId::new("123").unwrap(),
            DateRange::new("7daysAgo", "today").unwrap(),
        )
        .dimensions(["country"])
        .metrics(["sessions"])
        .order_by_metric_desc("sessions")
        .limit(10);

        let wire = WireRequest::from_query(&query, true);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json["dateRanges"][0]["startDate"], "7daysAgo");
        assert_eq!(json["dateRanges"][0]["endDate"], "today");
        assert_eq!(json["dimensions"][0]["name"], "country");
        assert_eq!(json["metrics"][0]["name"], "sessions");
        assert_eq!(json["orderBys"][0]["metric"]["metricName"], "sessions");
        assert_eq!(json["orderBys"][0]["desc"], true);
        assert_eq!(json["limit"], 10);
    }

    #[test]
    fn realtime_request_omits_date_ranges() {
        let query = ReportQuery::new(
            PropertyId::new("123").unwrap(),
            DateRange::last_30_days(),
        )
        .dimensions(["country"])
        .metrics(["activeUsers"]);

        let wire = WireRequest::from_query(&query, false);
        let json = serde_json::to_value(&wire).unwrap();
        assert!(json.get("dateRanges").is_none());
    }

    #[test]
    fn wire_response_preserves_row_order_and_positions() {
        let raw = serde_json::json!({
            "rows": [
                {
                    "dimensionValues": [{"value": "google"}],
                    "metricValues": [{"value": "120"}]
                },
                {
                    "dimensionValues": [{"value": "direct"}],
                    "metricValues": [{"value": "80"}]
                }
            ]
        });
        let wire: WireResponse = serde_json::from_value(raw).unwrap();
        let rows = wire.into_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].dimensions, vec!["google"]);
        assert_eq!(rows[0].metrics, vec!["120"]);
        assert_eq!(rows[1].dimensions, vec!["direct"]);
    }

    #[test]
    fn empty_response_body_yields_no_rows() {
        let wire: WireResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(wire.into_rows().is_empty());
    }
}
