//! In-process map/reduce of performance entries into daily groups.

use chrono::{DateTime, Utc};
use mediahub_core::types::{click_through_rate, AggregateKey, DailyAggregate, PerformanceEntry};
use std::collections::BTreeMap;

/// Running sums for one (day, campaign, publication, channel) group. Metric
/// sums saturate at `u64::MAX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTotals {
    /// Name carried by the first entry folded into the group. Later entries
    /// with a different name do not change it.
    pub publication_name: String,
    pub impressions: u64,
    pub clicks: u64,
    pub reach: u64,
    pub units_delivered: u64,
    pub entry_count: u64,
}

impl GroupTotals {
    fn seeded(entry: &PerformanceEntry) -> Self {
        Self {
            publication_name: entry.publication_name.clone(),
            impressions: 0,
            clicks: 0,
            reach: 0,
            units_delivered: 0,
            entry_count: 0,
        }
    }

    fn add(&mut self, entry: &PerformanceEntry) {
        let m = &entry.metrics;
        self.impressions = self.impressions.saturating_add(m.impressions.unwrap_or(0));
        self.clicks = self.clicks.saturating_add(m.clicks.unwrap_or(0));
        self.reach = self.reach.saturating_add(m.reach.unwrap_or(0));
        self.units_delivered = self.units_delivered.saturating_add(m.units_delivered());
        self.entry_count += 1;
    }

    pub fn ctr(&self) -> f64 {
        click_through_rate(self.clicks, self.impressions)
    }

    pub fn into_aggregate(self, key: AggregateKey, computed_at: DateTime<Utc>) -> DailyAggregate {
        let ctr = self.ctr();
        DailyAggregate {
            date: key.date,
            campaign_id: key.campaign_id,
            publication_id: key.publication_id,
            publication_name: self.publication_name,
            channel: key.channel,
            impressions: self.impressions,
            clicks: self.clicks,
            units_delivered: self.units_delivered,
            reach: self.reach,
            ctr,
            entry_count: self.entry_count,
            computed_at,
        }
    }
}

/// Group entries by aggregate key and sum their metrics.
///
/// Soft-deleted entries are skipped. Iteration order of the result is the
/// key order, so upserts are issued deterministically.
pub fn fold_entries<'a, I>(entries: I) -> BTreeMap<AggregateKey, GroupTotals>
where
    I: IntoIterator<Item = &'a PerformanceEntry>,
{
    let mut groups: BTreeMap<AggregateKey, GroupTotals> = BTreeMap::new();
    for entry in entries {
        if entry.is_deleted() {
            continue;
        }
        groups
            .entry(entry.aggregate_key())
            .or_insert_with(|| GroupTotals::seeded(entry))
            .add(entry);
    }
    groups
}
