//! Per-view aggregation over the upstream reporting API.
//!
//! Each view issues one or two report queries concurrently, normalizes the
//! positional rows into its typed aggregate, and computes percentage shares
//! against the sum of the returned rows' primary metric. When a query
//! carries a limit, the share base is the returned top-N, not the true
//! population total.

use anyhow::Result;
use std::sync::Arc;

use crate::auth::TokenProvider;
use crate::report::{DateRange, PropertyId, ReportQuery, ReportRow, ReportingClient};

use super::models::{
    AcquisitionAggregate, Aggregate, BrowserStat, ChannelStat, CountryStat, DeviceStat,
    DevicesAggregate, LocationsAggregate, OverviewAggregate, PageStat, PagesAggregate,
    RealtimeAggregate, RealtimeCountry, SourceStat, TrafficSource, View, percentage,
};

pub struct Aggregator {
    client: Arc<dyn ReportingClient>,
    tokens: Arc<dyn TokenProvider>,
}

impl Aggregator {
    pub fn new(client: Arc<dyn ReportingClient>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { client, tokens }
    }

    /// Aggregate one view. Upstream and network failures propagate to the
    /// caller as retryable errors; they are not retried here.
    pub async fn aggregate(
        &self,
        view: View,
        property: &PropertyId,
        range: &DateRange,
    ) -> Result<Aggregate> {
        Ok(match view {
            View::Overview => Aggregate::Overview(self.overview(property, range).await?),
            View::Pages => Aggregate::Pages(self.pages(property, range).await?),
            View::Devices => Aggregate::Devices(self.devices(property, range).await?),
            View::Locations => Aggregate::Locations(self.locations(property, range).await?),
            View::Acquisition => {
                Aggregate::Acquisition(self.acquisition(property, range).await?)
            }
            View::Realtime => Aggregate::Realtime(self.realtime(property).await?),
        })
    }

    pub async fn overview(
        &self,
        property: &PropertyId,
        range: &DateRange,
    ) -> Result<OverviewAggregate> {
        let token = self.tokens.bearer_token().await?;

        let totals_query = ReportQuery::new(property.clone(), range.clone()).metrics([
            "sessions",
            "activeUsers",
            "screenPageViews",
            "bounceRate",
            "averageSessionDuration",
        ]);
        let channels_query = ReportQuery::new(property.clone(), range.clone())
            .dimensions(["sessionDefaultChannelGroup"])
            .metrics(["sessions"])
            .order_by_metric_desc("sessions")
            .limit(5);

        let (totals, channels) = tokio::try_join!(
            self.client.fetch_report(&totals_query, &token),
            self.client.fetch_report(&channels_query, &token),
        )?;

        let totals_row = totals.into_iter().next().unwrap_or_default();
        let session_base: i64 = channels.iter().map(|row| row.int_metric(0)).sum();
        let traffic_sources = channels
            .iter()
            .map(|row| TrafficSource {
                source: row.dimension_or(0, "Unknown").to_string(),
                sessions: row.int_metric(0),
                percentage: percentage(row.int_metric(0), session_base),
            })
            .collect();

        Ok(OverviewAggregate {
            sessions: totals_row.int_metric(0),
            users: totals_row.int_metric(1),
            page_views: totals_row.int_metric(2),
            bounce_rate: totals_row.float_metric(3),
            avg_session_duration: totals_row.float_metric(4),
            traffic_sources,
        })
    }

    pub async fn pages(
        &self,
        property: &PropertyId,
        range: &DateRange,
    ) -> Result<PagesAggregate> {
        let token = self.tokens.bearer_token().await?;

        let query = ReportQuery::new(property.clone(), range.clone())
            .dimensions(["pagePath", "pageTitle"])
            .metrics(["screenPageViews"])
            .order_by_metric_desc("screenPageViews")
            .limit(10);

        let rows = self.client.fetch_report(&query, &token).await?;
        let total_page_views: i64 = rows.iter().map(|row| row.int_metric(0)).sum();
        let pages = rows
            .iter()
            .map(|row| PageStat {
                path: row.dimension_or(0, "/").to_string(),
                title: row.dimension_or(1, "Untitled").to_string(),
                views: row.int_metric(0),
                percentage: percentage(row.int_metric(0), total_page_views),
            })
            .collect();

        Ok(PagesAggregate {
            pages,
            total_page_views,
        })
    }

    pub async fn devices(
        &self,
        property: &PropertyId,
        range: &DateRange,
    ) -> Result<DevicesAggregate> {
        let token = self.tokens.bearer_token().await?;

        let devices_query = ReportQuery::new(property.clone(), range.clone())
            .dimensions(["deviceCategory"])
            .metrics(["sessions"])
            .order_by_metric_desc("sessions");
        let browsers_query = ReportQuery::new(property.clone(), range.clone())
            .dimensions(["browser"])
            .metrics(["sessions"])
            .order_by_metric_desc("sessions")
            .limit(10);

        let (device_rows, browser_rows) = tokio::try_join!(
            self.client.fetch_report(&devices_query, &token),
            self.client.fetch_report(&browsers_query, &token),
        )?;

        let device_base: i64 = device_rows.iter().map(|row| row.int_metric(0)).sum();
        let devices = device_rows
            .iter()
            .map(|row| DeviceStat {
                device: row.dimension_or(0, "Unknown").to_string(),
                sessions: row.int_metric(0),
                percentage: percentage(row.int_metric(0), device_base),
            })
            .collect();

        let browser_base: i64 = browser_rows.iter().map(|row| row.int_metric(0)).sum();
        let browsers = browser_rows
            .iter()
            .map(|row| BrowserStat {
                browser: row.dimension_or(0, "Unknown").to_string(),
                sessions: row.int_metric(0),
                percentage: percentage(row.int_metric(0), browser_base),
            })
            .collect();

        Ok(DevicesAggregate { devices, browsers })
    }

    pub async fn locations(
        &self,
        property: &PropertyId,
        range: &DateRange,
    ) -> Result<LocationsAggregate> {
        let token = self.tokens.bearer_token().await?;

        let query = ReportQuery::new(property.clone(), range.clone())
            .dimensions(["country"])
            .metrics(["sessions", "activeUsers"])
            .order_by_metric_desc("sessions")
            .limit(10);

        let rows = self.client.fetch_report(&query, &token).await?;
        let session_base: i64 = rows.iter().map(|row| row.int_metric(0)).sum();
        let countries = rows
            .iter()
            .map(|row| CountryStat {
                country: row.dimension_or(0, "Unknown").to_string(),
                sessions: row.int_metric(0),
                users: row.int_metric(1),
                percentage: percentage(row.int_metric(0), session_base),
            })
            .collect();

        Ok(LocationsAggregate { countries })
    }

    pub async fn acquisition(
        &self,
        property: &PropertyId,
        range: &DateRange,
    ) -> Result<AcquisitionAggregate> {
        let token = self.tokens.bearer_token().await?;

        let channels_query = ReportQuery::new(property.clone(), range.clone())
            .dimensions(["sessionDefaultChannelGroup"])
            .metrics(["sessions"])
            .order_by_metric_desc("sessions")
            .limit(10);
        let sources_query = ReportQuery::new(property.clone(), range.clone())
            .dimensions(["sessionSource"])
            .metrics(["sessions"])
            .order_by_metric_desc("sessions")
            .limit(10);

        let (channel_rows, source_rows) = tokio::try_join!(
            self.client.fetch_report(&channels_query, &token),
            self.client.fetch_report(&sources_query, &token),
        )?;

        let channel_base: i64 = channel_rows.iter().map(|row| row.int_metric(0)).sum();
        let channels = channel_rows
            .iter()
            .map(|row| ChannelStat {
                channel: row.dimension_or(0, "Unknown").to_string(),
                sessions: row.int_metric(0),
                percentage: percentage(row.int_metric(0), channel_base),
            })
            .collect();

        let source_base: i64 = source_rows.iter().map(|row| row.int_metric(0)).sum();
        let sources = source_rows
            .iter()
            .map(|row| SourceStat {
                source: row.dimension_or(0, "Unknown").to_string(),
                sessions: row.int_metric(0),
                percentage: percentage(row.int_metric(0), source_base),
            })
            .collect();

        Ok(AcquisitionAggregate { channels, sources })
    }

    pub async fn realtime(&self, property: &PropertyId) -> Result<RealtimeAggregate> {
        let token = self.tokens.bearer_token().await?;

        // The realtime endpoint ignores date ranges; the range here only
        // satisfies the query shape.
        let query = ReportQuery::new(property.clone(), DateRange::last_30_days())
            .dimensions(["country"])
            .metrics(["activeUsers"]);

        let rows = self.client.fetch_realtime_report(&query, &token).await?;
        let active_users: i64 = rows.iter().map(|row| row.int_metric(0)).sum();
        let by_country = rows
            .iter()
            .map(|row| RealtimeCountry {
                country: row.dimension_or(0, "Unknown").to_string(),
                active_users: row.int_metric(0),
            })
            .collect();

        Ok(RealtimeAggregate {
            active_users,
            by_country,
        })
    }
}

#[cfg(test)]
fn test_row(dims: &[&str], metrics: &[&str]) -> ReportRow {
    ReportRow {
        dimensions: dims.iter().map(|s| s.to_string()).collect(),
        metrics: metrics.iter().map(|s| s.to_string()).collect(),
    }
}
