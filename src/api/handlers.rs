use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::{Aggregate, Dashboard, VersusAggregate, View};
use crate::insights::{InsightGenerator, InsightSet};
use crate::report::{DateRange, PropertyCache, PropertyDetails, PropertyId, ReportError};
use crate::storage::{DailySnapshot, Store};
use crate::sync::{SyncJob, SyncOutcome, SyncSubject};

pub struct AppState {
    pub dashboard: Arc<Dashboard>,
    pub insights: Arc<InsightGenerator>,
    pub sync: Arc<SyncJob>,
    pub properties: Arc<PropertyCache>,
    pub store: Arc<dyn Store>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map an aggregation failure onto a response. Upstream and transport
/// failures surface as retryable 502s so the UI can distinguish "fetch
/// failed" from "no data in range"; everything else is a 500.
fn aggregate_error(e: anyhow::Error) -> ApiError {
    if let Some(report_err) = e.downcast_ref::<ReportError>() {
        tracing::warn!("report fetch failed: {report_err}");
        return (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: "The reporting service could not be reached. Please retry shortly."
                    .to_string(),
            }),
        );
    }
    tracing::error!("aggregation failed: {e:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal error while aggregating report data".to_string(),
        }),
    )
}

fn parse_property(raw: &str) -> Result<PropertyId, ApiError> {
    PropertyId::new(raw).map_err(|e| bad_request(e.to_string()))
}

fn parse_range(start: Option<String>, end: Option<String>) -> Result<DateRange, ApiError> {
    match (start, end) {
        (Some(start), Some(end)) => {
            DateRange::new(start, end).map_err(|e| bad_request(e.to_string()))
        }
        (None, None) => Ok(DateRange::last_30_days()),
        _ => Err(bad_request("start and end must be provided together")),
    }
}

#[derive(Deserialize)]
pub struct ViewQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

/// Serve one aggregated view for a property.
pub async fn get_view(
    State(state): State<Arc<AppState>>,
    Path((id, view)): Path<(String, String)>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<Aggregate>, ApiError> {
    let property = parse_property(&id)?;
    let view: View = view.parse().map_err(|e: anyhow::Error| bad_request(e.to_string()))?;
    let range = parse_range(query.start, query.end)?;

    state
        .dashboard
        .get_aggregate(&property, view, &range, query.refresh)
        .await
        .map(Json)
        .map_err(aggregate_error)
}

#[derive(Deserialize)]
pub struct VersusQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub prev_start: String,
    pub prev_end: String,
    #[serde(default)]
    pub refresh: bool,
}

/// Overview metrics diffed against a comparison range.
pub async fn get_versus(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<VersusQuery>,
) -> Result<Json<VersusAggregate>, ApiError> {
    let property = parse_property(&id)?;
    let current = parse_range(query.start, query.end)?;
    let comparison = DateRange::new(query.prev_start, query.prev_end)
        .map_err(|e| bad_request(e.to_string()))?;

    state
        .dashboard
        .get_versus(&property, &current, &comparison, query.refresh)
        .await
        .map(Json)
        .map_err(aggregate_error)
}

#[derive(Deserialize)]
pub struct InsightsQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// AI-written insight summaries. Always returns a valid set; degraded
/// generation serves fallback content instead of an error state.
pub async fn get_insights(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<InsightsQuery>,
) -> Result<Json<InsightSet>, ApiError> {
    let property = parse_property(&id)?;
    let range = parse_range(query.start, query.end)?;

    Ok(Json(state.insights.get_insights(&property, &range).await))
}

/// Display metadata for a property, served from the scoped cache.
pub async fn get_property_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PropertyDetails>, ApiError> {
    let property = parse_property(&id)?;

    state
        .properties
        .get(&property)
        .await
        .map(Json)
        .map_err(aggregate_error)
}

#[derive(Deserialize)]
pub struct TrendsQuery {
    pub start_day: Option<NaiveDate>,
    pub end_day: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct TrendsResponse {
    pub snapshots: Vec<DailySnapshot>,
}

/// Daily snapshots captured by the sync job, for trend charts.
pub async fn get_trends(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<TrendsResponse>, ApiError> {
    let property = parse_property(&id)?;
    let end = query.end_day.unwrap_or_else(|| Utc::now().date_naive());
    let start = query
        .start_day
        .unwrap_or_else(|| end - ChronoDuration::days(29));
    if start > end {
        return Err(bad_request("start_day must not be after end_day"));
    }

    match state
        .store
        .daily_snapshots(property.resource_name(), start, end)
        .await
    {
        Ok(snapshots) => Ok(Json(TrendsResponse { snapshots })),
        Err(e) => {
            tracing::error!("failed to read daily snapshots: {e:#}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to read trend data".to_string(),
                }),
            ))
        }
    }
}

#[derive(Deserialize)]
pub struct SyncRequest {
    pub subjects: Vec<SyncSubject>,
    /// Defaults to yesterday, the usual nightly target.
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub outcomes: Vec<SyncOutcome>,
}

/// Manual trigger for the daily sync batch.
pub async fn run_sync(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    if payload.subjects.is_empty() {
        return Err(bad_request("subjects must not be empty"));
    }

    let target = payload
        .date
        .unwrap_or_else(|| Utc::now().date_naive() - ChronoDuration::days(1));

    let outcomes = state.sync.run(&payload.subjects, target).await;
    Ok(Json(SyncResponse { outcomes }))
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
