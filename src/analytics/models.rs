//! Typed aggregates served to the UI.
//!
//! These shapes are the stable boundary: upstream field names never leak
//! through them. Every ranked sequence carries a percentage share computed
//! against the sum of the returned rows' primary metric.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dashboard views served by the aggregation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Overview,
    Pages,
    Devices,
    Locations,
    Acquisition,
    Realtime,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Overview => "overview",
            View::Pages => "pages",
            View::Devices => "devices",
            View::Locations => "locations",
            View::Acquisition => "acquisition",
            View::Realtime => "realtime",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" => Ok(View::Overview),
            "pages" => Ok(View::Pages),
            "devices" => Ok(View::Devices),
            "locations" => Ok(View::Locations),
            "acquisition" => Ok(View::Acquisition),
            "realtime" => Ok(View::Realtime),
            other => anyhow::bail!("unknown view '{other}'"),
        }
    }
}

/// `part / total * 100`, with a zero total mapping to 0 rather than
/// NaN or infinity.
pub fn percentage(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSource {
    pub source: String,
    pub sessions: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewAggregate {
    pub sessions: i64,
    pub users: i64,
    pub page_views: i64,
    pub bounce_rate: f64,
    pub avg_session_duration: f64,
    pub traffic_sources: Vec<TrafficSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageStat {
    pub path: String,
    pub title: String,
    pub views: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagesAggregate {
    pub pages: Vec<PageStat>,
    pub total_page_views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStat {
    pub device: String,
    pub sessions: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserStat {
    pub browser: String,
    pub sessions: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicesAggregate {
    pub devices: Vec<DeviceStat>,
    pub browsers: Vec<BrowserStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryStat {
    pub country: String,
    pub sessions: i64,
    pub users: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationsAggregate {
    pub countries: Vec<CountryStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStat {
    pub channel: String,
    pub sessions: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStat {
    pub source: String,
    pub sessions: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionAggregate {
    pub channels: Vec<ChannelStat>,
    pub sources: Vec<SourceStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeCountry {
    pub country: String,
    pub active_users: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeAggregate {
    pub active_users: i64,
    pub by_country: Vec<RealtimeCountry>,
}

/// One per-view aggregate, tagged for cache round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum Aggregate {
    Overview(OverviewAggregate),
    Pages(PagesAggregate),
    Devices(DevicesAggregate),
    Locations(LocationsAggregate),
    Acquisition(AcquisitionAggregate),
    Realtime(RealtimeAggregate),
}

impl Aggregate {
    pub fn view(&self) -> View {
        match self {
            Aggregate::Overview(_) => View::Overview,
            Aggregate::Pages(_) => View::Pages,
            Aggregate::Devices(_) => View::Devices,
            Aggregate::Locations(_) => View::Locations,
            Aggregate::Acquisition(_) => View::Acquisition,
            Aggregate::Realtime(_) => View::Realtime,
        }
    }
}

/// One metric compared across two date ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub value: f64,
    pub previous: f64,
    /// Percent change from `previous` to `value`; 0 when `previous` is 0.
    pub delta_pct: f64,
}

impl MetricDelta {
    pub fn compute(value: f64, previous: f64) -> Self {
        let delta_pct = if previous == 0.0 {
            0.0
        } else {
            (value - previous) / previous * 100.0
        };
        Self {
            value,
            previous,
            delta_pct,
        }
    }
}

/// Overview metrics diffed against a comparison range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersusAggregate {
    pub sessions: MetricDelta,
    pub users: MetricDelta,
    pub page_views: MetricDelta,
    pub bounce_rate: MetricDelta,
    pub avg_session_duration: MetricDelta,
}

impl VersusAggregate {
    pub fn from_overviews(current: &OverviewAggregate, previous: &OverviewAggregate) -> Self {
        Self {
            sessions: MetricDelta::compute(current.sessions as f64, previous.sessions as f64),
            users: MetricDelta::compute(current.users as f64, previous.users as f64),
            page_views: MetricDelta::compute(
                current.page_views as f64,
                previous.page_views as f64,
            ),
            bounce_rate: MetricDelta::compute(current.bounce_rate, previous.bounce_rate),
            avg_session_duration: MetricDelta::compute(
                current.avg_session_duration,
                previous.avg_session_duration,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_of_zero_total_is_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn percentage_is_part_over_total() {
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(120, 120), 100.0);
    }

    #[test]
    fn delta_is_zero_when_previous_is_zero() {
        let d = MetricDelta::compute(42.0, 0.0);
        assert_eq!(d.delta_pct, 0.0);
        assert!(d.delta_pct.is_finite());
    }

    #[test]
    fn delta_is_signed_percent_change() {
        assert_eq!(MetricDelta::compute(150.0, 100.0).delta_pct, 50.0);
        assert_eq!(MetricDelta::compute(50.0, 100.0).delta_pct, -50.0);
    }

    #[test]
    fn aggregate_round_trips_through_json() {
        let aggregate = Aggregate::Overview(OverviewAggregate {
            sessions: 120,
            users: 80,
            page_views: 500,
            bounce_rate: 0.35,
            avg_session_duration: 95.2,
            traffic_sources: vec![TrafficSource {
                source: "google".to_string(),
                sessions: 120,
                percentage: 100.0,
            }],
        });

        let json = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(json["view"], "overview");
        let back: Aggregate = serde_json::from_value(json).unwrap();
        assert_eq!(back, aggregate);
        assert_eq!(back.view(), View::Overview);
    }

    #[test]
    fn view_parses_from_path_segments() {
        assert_eq!("overview".parse::<View>().unwrap(), View::Overview);
        assert_eq!("realtime".parse::<View>().unwrap(), View::Realtime);
        assert!("weekly".parse::<View>().is_err());
    }
}
