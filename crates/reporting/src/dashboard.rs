//! Campaign performance dashboard built from daily aggregates.

use chrono::{DateTime, NaiveDate, Utc};
use mediahub_core::types::{click_through_rate, Channel, DailyAggregate};
use mediahub_core::MediaHubResult;
use mediahub_store::{AggregateFilter, AggregateStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Summed delivery counters. `reach` is the sum of daily reach, not a
/// deduplicated audience. Sums saturate at `u64::MAX`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeliveryTotals {
    pub impressions: u64,
    pub clicks: u64,
    pub units_delivered: u64,
    pub reach: u64,
    pub entry_count: u64,
    pub ctr: f64,
}

impl DeliveryTotals {
    fn add(&mut self, row: &DailyAggregate) {
        self.impressions = self.impressions.saturating_add(row.impressions);
        self.clicks = self.clicks.saturating_add(row.clicks);
        self.units_delivered = self.units_delivered.saturating_add(row.units_delivered);
        self.reach = self.reach.saturating_add(row.reach);
        self.entry_count = self.entry_count.saturating_add(row.entry_count);
        self.ctr = click_through_rate(self.clicks, self.impressions);
    }

    fn sum<'a>(rows: impl IntoIterator<Item = &'a DailyAggregate>) -> Self {
        let mut totals = Self::default();
        for row in rows {
            totals.add(row);
        }
        totals
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelBreakdown {
    pub channel: Channel,
    pub totals: DeliveryTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationBreakdown {
    pub publication_id: i64,
    pub publication_name: String,
    pub totals: DeliveryTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub impressions: u64,
    pub clicks: u64,
    pub units_delivered: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignPerformance {
    pub campaign_id: String,
    pub totals: DeliveryTotals,
    pub channel_breakdown: Vec<ChannelBreakdown>,
    pub publication_breakdown: Vec<PublicationBreakdown>,
    pub daily: Vec<TimeSeriesPoint>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardOverview {
    pub total_campaigns: u64,
    pub total_publications: u64,
    pub totals: DeliveryTotals,
    pub channel_breakdown: Vec<ChannelBreakdown>,
    pub generated_at: DateTime<Utc>,
}

pub struct PerformanceDashboard {
    aggregates: Arc<dyn AggregateStore>,
}

impl PerformanceDashboard {
    pub fn new(aggregates: Arc<dyn AggregateStore>) -> Self {
        Self { aggregates }
    }

    pub async fn campaign_performance(
        &self,
        campaign_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> MediaHubResult<CampaignPerformance> {
        let mut filter = AggregateFilter::new().campaign(campaign_id);
        filter.date_from = from;
        filter.date_to = to;
        let rows = self.aggregates.find(&filter).await?;
        debug!(campaign_id, rows = rows.len(), "Building campaign performance");

        let mut by_publication: BTreeMap<i64, (String, DeliveryTotals)> = BTreeMap::new();
        for row in &rows {
            by_publication
                .entry(row.publication_id)
                .or_insert_with(|| (row.publication_name.clone(), DeliveryTotals::default()))
                .1
                .add(row);
        }

        let mut by_day: BTreeMap<NaiveDate, TimeSeriesPoint> = BTreeMap::new();
        for row in &rows {
            let point = by_day.entry(row.date).or_insert_with(|| TimeSeriesPoint {
                date: row.date,
                impressions: 0,
                clicks: 0,
                units_delivered: 0,
            });
            point.impressions = point.impressions.saturating_add(row.impressions);
            point.clicks = point.clicks.saturating_add(row.clicks);
            point.units_delivered = point.units_delivered.saturating_add(row.units_delivered);
        }

        Ok(CampaignPerformance {
            campaign_id: campaign_id.to_string(),
            totals: DeliveryTotals::sum(&rows),
            channel_breakdown: channel_breakdown(&rows),
            publication_breakdown: by_publication
                .into_iter()
                .map(|(publication_id, (publication_name, totals))| PublicationBreakdown {
                    publication_id,
                    publication_name,
                    totals,
                })
                .collect(),
            daily: by_day.into_values().collect(),
            generated_at: Utc::now(),
        })
    }

    pub async fn overview(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> MediaHubResult<DashboardOverview> {
        let filter = AggregateFilter {
            date_from: from,
            date_to: to,
            ..Default::default()
        };
        let rows = self.aggregates.find(&filter).await?;

        let campaigns: BTreeSet<&str> = rows.iter().map(|r| r.campaign_id.as_str()).collect();
        let publications: BTreeSet<i64> = rows.iter().map(|r| r.publication_id).collect();

        Ok(DashboardOverview {
            total_campaigns: campaigns.len() as u64,
            total_publications: publications.len() as u64,
            totals: DeliveryTotals::sum(&rows),
            channel_breakdown: channel_breakdown(&rows),
            generated_at: Utc::now(),
        })
    }
}

fn channel_breakdown(rows: &[DailyAggregate]) -> Vec<ChannelBreakdown> {
    let mut by_channel: BTreeMap<Channel, DeliveryTotals> = BTreeMap::new();
    for row in rows {
        by_channel.entry(row.channel.clone()).or_default().add(row);
    }
    by_channel
        .into_iter()
        .map(|(channel, totals)| ChannelBreakdown { channel, totals })
        .collect()
}
