//! Report aggregation layer.
//!
//! Turns raw upstream rows into the typed per-view aggregates the UI
//! consumes, and fronts them with a freshness-checked cache.

pub mod dashboard;
pub mod models;
pub mod views;

pub use dashboard::{snapshot_from_overview, CachePolicy, Dashboard};
pub use models::{
    AcquisitionAggregate, Aggregate, BrowserStat, ChannelStat, CountryStat, DeviceStat,
    DevicesAggregate, LocationsAggregate, MetricDelta, OverviewAggregate, PageStat,
    PagesAggregate, RealtimeAggregate, RealtimeCountry, SourceStat, TrafficSource,
    VersusAggregate, View,
};
pub use views::Aggregator;
