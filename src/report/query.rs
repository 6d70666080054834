//! Request descriptors for the upstream reporting API.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated property identifier.
///
/// The upstream API addresses properties as `properties/{id}`. Callers may
/// hand us either that resource form or a bare numeric id; both normalize
/// to the resource form. Anything else is rejected before a request is
/// built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropertyId(String);

impl PropertyId {
    pub fn new(raw: &str) -> Result<Self> {
        let digits = raw.strip_prefix("properties/").unwrap_or(raw);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            bail!("invalid property id '{raw}': expected a numeric id or 'properties/{{id}}'");
        }
        Ok(Self(format!("properties/{digits}")))
    }

    /// The full `properties/{id}` resource name.
    pub fn resource_name(&self) -> &str {
        &self.0
    }

    /// The bare numeric id.
    pub fn numeric(&self) -> &str {
        self.0.trim_start_matches("properties/")
    }
}

impl FromStr for PropertyId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for PropertyId {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<PropertyId> for String {
    fn from(id: PropertyId) -> String {
        id.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive date range. Each bound is either an absolute `YYYY-MM-DD`
/// date or a relative token the upstream understands (`today`,
/// `yesterday`, `NdaysAgo`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self> {
        let start = start.into();
        let end = end.into();
        validate_date_token(&start)?;
        validate_date_token(&end)?;
        Ok(Self { start, end })
    }

    /// The default dashboard window.
    pub fn last_30_days() -> Self {
        Self {
            start: "30daysAgo".to_string(),
            end: "today".to_string(),
        }
    }

    /// Single-day range used by the sync job.
    pub fn single_day(date: NaiveDate) -> Self {
        let day = date.format("%Y-%m-%d").to_string();
        Self {
            start: day.clone(),
            end: day,
        }
    }
}

fn validate_date_token(token: &str) -> Result<()> {
    if token == "today" || token == "yesterday" {
        return Ok(());
    }
    if let Some(days) = token.strip_suffix("daysAgo") {
        if !days.is_empty() && days.chars().all(|c| c.is_ascii_digit()) {
            return Ok(());
        }
        bail!("invalid relative date token '{token}'");
    }
    if NaiveDate::parse_from_str(token, "%Y-%m-%d").is_err() {
        bail!("invalid date '{token}': expected YYYY-MM-DD, 'today', 'yesterday' or 'NdaysAgo'");
    }
    Ok(())
}

/// Sort direction for an order-by clause. The upstream default is
/// ascending; every ranked view here asks for descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub metric: String,
    pub order: SortOrder,
}

/// Immutable descriptor for one upstream report request. Built fresh per
/// aggregation call.
#[derive(Debug, Clone)]
pub struct ReportQuery {
    pub property: PropertyId,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub date_range: DateRange,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
}

impl ReportQuery {
    pub fn new(property: PropertyId, date_range: DateRange) -> Self {
        Self {
            property,
            dimensions: Vec::new(),
            metrics: Vec::new(),
            date_range,
            order_by: None,
            limit: None,
        }
    }

    pub fn dimensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn metrics<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn order_by_metric_desc(mut self, metric: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            metric: metric.into(),
            order: SortOrder::Descending,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}
