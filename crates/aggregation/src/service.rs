//! Daily performance aggregation service.
//!
//! Reads raw performance entries, folds them into (day, campaign,
//! publication, channel) groups and upserts one daily aggregate per group.
//! Every operation is a single pass that converges to the same rows when the
//! source entries are unchanged. No lock is taken: overlapping runs are
//! last-writer-wins per key.

use crate::grouping::fold_entries;
use chrono::{DateTime, Days, Duration, Utc};
use mediahub_core::types::{start_of_day, start_of_next_day, AggregationRunResult, DateRange};
use mediahub_core::MediaHubResult;
use mediahub_store::{AggregateFilter, AggregateStore, EntryFilter, EntryStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct AggregationService {
    entries: Arc<dyn EntryStore>,
    aggregates: Arc<dyn AggregateStore>,
}

impl AggregationService {
    pub fn new(entries: Arc<dyn EntryStore>, aggregates: Arc<dyn AggregateStore>) -> Self {
        Self {
            entries,
            aggregates,
        }
    }

    /// Aggregate every non-deleted entry whose `date_start` falls on a day in
    /// `[date_from, date_to]`, optionally narrowed to one campaign and/or
    /// publication.
    pub async fn run_aggregation(
        &self,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        campaign_id: Option<&str>,
        publication_id: Option<i64>,
    ) -> AggregationRunResult {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let date_range = DateRange {
            from: date_from,
            to: date_to,
        };
        metrics::counter!("aggregation.runs").increment(1);

        info!(
            run_id = %run_id,
            from = %date_from,
            to = %date_to,
            campaign_id = ?campaign_id,
            publication_id = ?publication_id,
            "Starting aggregation run"
        );

        let mut filter =
            EntryFilter::new().date_range(start_of_day(date_from), start_of_next_day(date_to));
        if let Some(campaign_id) = campaign_id {
            filter = filter.campaign(campaign_id);
        }
        if let Some(publication_id) = publication_id {
            filter = filter.publication(publication_id);
        }

        let groups = match self.entries.query(&filter).await {
            Ok(entries) => {
                debug!(run_id = %run_id, entries = entries.len(), "Entries selected");
                fold_entries(&entries)
            }
            Err(e) => {
                metrics::counter!("aggregation.failed_runs").increment(1);
                error!(run_id = %run_id, error = %e, "Aggregation run failed during entry selection");
                return AggregationRunResult::failed(
                    run_id,
                    date_range,
                    e.to_string(),
                    elapsed_ms(started),
                );
            }
        };

        let computed_at = Utc::now();
        let mut created = 0u64;
        let mut updated = 0u64;
        let mut errors = Vec::new();

        for (key, totals) in groups {
            let label = key.to_string();
            match self.aggregates.upsert(totals.into_aggregate(key, computed_at)).await {
                Ok(outcome) if outcome.inserted => created += 1,
                Ok(_) => updated += 1,
                Err(e) => {
                    metrics::counter!("aggregation.group_errors").increment(1);
                    warn!(run_id = %run_id, key = %label, error = %e, "Failed to upsert aggregate");
                    errors.push(format!("Failed to upsert aggregate for {label}: {e}"));
                }
            }
        }

        let duration_ms = elapsed_ms(started);
        metrics::counter!("aggregation.created").increment(created);
        metrics::counter!("aggregation.updated").increment(updated);
        metrics::histogram!("aggregation.duration_ms").record(duration_ms as f64);

        info!(
            run_id = %run_id,
            created,
            updated,
            errors = errors.len(),
            duration_ms,
            "Aggregation run complete"
        );

        AggregationRunResult {
            run_id,
            success: true,
            aggregates_created: created,
            aggregates_updated: updated,
            date_range,
            duration_ms,
            errors,
        }
    }

    /// Aggregate yesterday. Meant to be triggered once per day.
    pub async fn run_daily_aggregation(&self) -> AggregationRunResult {
        self.run_daily_aggregation_at(Utc::now()).await
    }

    pub async fn run_daily_aggregation_at(&self, now: DateTime<Utc>) -> AggregationRunResult {
        let yesterday = start_of_day(now) - Duration::days(1);
        info!(day = %yesterday.date_naive(), "Running daily aggregation");
        self.run_aggregation(yesterday, yesterday, None, None).await
    }

    /// Rebuild every aggregate for one campaign over the span its entries cover.
    pub async fn recompute_for_campaign(&self, campaign_id: &str) -> AggregationRunResult {
        let filter = EntryFilter::new().campaign(campaign_id);
        match self.entries.date_span(&filter).await {
            Ok(Some((min, max))) => {
                info!(campaign_id, from = %min, to = %max, "Recomputing campaign aggregates");
                self.run_aggregation(min, max, Some(campaign_id), None).await
            }
            Ok(None) => {
                debug!(campaign_id, "No entries for campaign, nothing to recompute");
                AggregationRunResult::noop(Utc::now())
            }
            Err(e) => span_lookup_failed(e),
        }
    }

    /// Rebuild the aggregates touched by one order's entries.
    pub async fn recompute_for_order(&self, order_id: &str) -> AggregationRunResult {
        let filter = EntryFilter::new().order(order_id);

        let representative = match self.entries.find_one(&filter).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(order_id, "No entries for order, nothing to recompute");
                return AggregationRunResult::noop(Utc::now());
            }
            Err(e) => return span_lookup_failed(e),
        };

        match self.entries.date_span(&filter).await {
            Ok(Some((min, max))) => {
                info!(
                    order_id,
                    campaign_id = %representative.campaign_id,
                    publication_id = representative.publication_id,
                    from = %min,
                    to = %max,
                    "Recomputing order aggregates"
                );
                self.run_aggregation(
                    min,
                    max,
                    Some(&representative.campaign_id),
                    Some(representative.publication_id),
                )
                .await
            }
            Ok(None) => AggregationRunResult::noop(Utc::now()),
            Err(e) => span_lookup_failed(e),
        }
    }

    /// Re-aggregate the trailing `days` days ending with today (today
    /// included), across all campaigns and publications. `days == 0` is a
    /// no-op.
    pub async fn backfill(&self, days: u32) -> AggregationRunResult {
        self.backfill_at(days, Utc::now()).await
    }

    pub async fn backfill_at(&self, days: u32, now: DateTime<Utc>) -> AggregationRunResult {
        let to = start_of_day(now);
        if days == 0 {
            debug!("Backfill of zero days requested, nothing to do");
            return AggregationRunResult::noop(to);
        }

        let Some(from) = to.checked_sub_days(Days::new(u64::from(days - 1))) else {
            metrics::counter!("aggregation.failed_runs").increment(1);
            error!(days, to = %to, "Backfill window starts before the earliest representable date");
            return AggregationRunResult::failed(
                Uuid::new_v4(),
                DateRange { from: to, to },
                format!("Backfill window of {days} days is out of range"),
                0,
            );
        };

        info!(days, from = %from, to = %to, "Running aggregation backfill");
        self.run_aggregation(from, to, None, None).await
    }

    /// Delete aggregate rows that folded zero entries.
    pub async fn cleanup_stale_aggregates(&self) -> MediaHubResult<u64> {
        let removed = self
            .aggregates
            .delete_where(&AggregateFilter::new().entry_count(0))
            .await?;
        metrics::counter!("aggregation.stale_removed").increment(removed);
        info!(removed, "Stale aggregate cleanup complete");
        Ok(removed)
    }
}

fn span_lookup_failed(e: mediahub_core::MediaHubError) -> AggregationRunResult {
    let now = Utc::now();
    metrics::counter!("aggregation.failed_runs").increment(1);
    error!(error = %e, "Failed to resolve recompute range");
    AggregationRunResult::failed(Uuid::new_v4(), DateRange { from: now, to: now }, e.to_string(), 0)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
