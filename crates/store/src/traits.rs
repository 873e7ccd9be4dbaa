//! Document-store boundary used by the aggregation service.
//!
//! Two collections are involved: raw performance entries (read-only here)
//! and daily aggregates (owned by the aggregator). Backends implement these
//! traits; the service receives them as `Arc<dyn ...>` handles.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mediahub_core::types::{DailyAggregate, PerformanceEntry};
use mediahub_core::MediaHubResult;

/// Predicate over performance entries. Soft-deleted entries never match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    /// Inclusive lower bound on `date_start`.
    pub date_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `date_start`.
    pub date_to: Option<DateTime<Utc>>,
    pub campaign_id: Option<String>,
    pub publication_id: Option<i64>,
    pub order_id: Option<String>,
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    pub fn campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    pub fn publication(mut self, publication_id: i64) -> Self {
        self.publication_id = Some(publication_id);
        self
    }

    pub fn order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn matches(&self, entry: &PerformanceEntry) -> bool {
        if entry.is_deleted() {
            return false;
        }
        if let Some(from) = self.date_from {
            if entry.date_start < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if entry.date_start >= to {
                return false;
            }
        }
        if let Some(ref campaign_id) = self.campaign_id {
            if &entry.campaign_id != campaign_id {
                return false;
            }
        }
        if let Some(publication_id) = self.publication_id {
            if entry.publication_id != publication_id {
                return false;
            }
        }
        if let Some(ref order_id) = self.order_id {
            if entry.order_id.as_ref() != Some(order_id) {
                return false;
            }
        }
        true
    }
}

/// Predicate over daily aggregate rows. Date bounds are inclusive days.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub campaign_id: Option<String>,
    pub entry_count: Option<u64>,
}

impl AggregateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn days(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    pub fn campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    pub fn entry_count(mut self, count: u64) -> Self {
        self.entry_count = Some(count);
        self
    }

    pub fn matches(&self, row: &DailyAggregate) -> bool {
        self.date_from.map_or(true, |from| row.date >= from)
            && self.date_to.map_or(true, |to| row.date <= to)
            && self
                .campaign_id
                .as_ref()
                .map_or(true, |c| &row.campaign_id == c)
            && self.entry_count.map_or(true, |n| row.entry_count == n)
    }
}

/// Result of a create-or-replace write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// `true` when the key did not exist before the write.
    pub inserted: bool,
}

/// Read access to raw performance entries.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// All non-deleted entries matching `filter`.
    async fn query(&self, filter: &EntryFilter) -> MediaHubResult<Vec<PerformanceEntry>>;

    /// Earliest and latest `date_start` among matching entries.
    async fn date_span(
        &self,
        filter: &EntryFilter,
    ) -> MediaHubResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let entries = self.query(filter).await?;
        let min = entries.iter().map(|e| e.date_start).min();
        let max = entries.iter().map(|e| e.date_start).max();
        Ok(min.zip(max))
    }

    /// A single representative entry (earliest `date_start`) matching `filter`.
    async fn find_one(&self, filter: &EntryFilter) -> MediaHubResult<Option<PerformanceEntry>> {
        let entries = self.query(filter).await?;
        Ok(entries.into_iter().min_by_key(|e| e.date_start))
    }
}

/// Read/write access to the daily aggregate collection.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Atomically create or fully replace the row at the aggregate's key.
    async fn upsert(&self, aggregate: DailyAggregate) -> MediaHubResult<UpsertOutcome>;

    /// Matching rows ordered by key.
    async fn find(&self, filter: &AggregateFilter) -> MediaHubResult<Vec<DailyAggregate>>;

    /// Remove every matching row, returning how many were removed.
    async fn delete_where(&self, filter: &AggregateFilter) -> MediaHubResult<u64>;
}
