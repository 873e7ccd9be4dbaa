//! In-memory collections backed by DashMap.
//!
//! Used by the job runner over JSON snapshots and throughout the tests.
//! Each aggregate upsert is a single map insert, so a key is never observed
//! half-written.

use crate::traits::{AggregateFilter, AggregateStore, EntryFilter, EntryStore, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mediahub_core::types::{AggregateKey, DailyAggregate, PerformanceEntry};
use mediahub_core::MediaHubResult;
use tracing::debug;

/// Raw performance entries keyed by entry id.
#[derive(Default)]
pub struct InMemoryEntryStore {
    entries: DashMap<String, PerformanceEntry>,
}

impl InMemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = PerformanceEntry>) -> Self {
        let store = Self::new();
        for entry in entries {
            store.insert(entry);
        }
        store
    }

    pub fn insert(&self, entry: PerformanceEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Mark an entry deleted. Returns false when the id is unknown.
    pub fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> bool {
        self.entries
            .get_mut(id)
            .map(|mut entry| entry.value_mut().deleted_at = Some(at))
            .is_some()
    }
}

#[async_trait]
impl EntryStore for InMemoryEntryStore {
    async fn query(&self, filter: &EntryFilter) -> MediaHubResult<Vec<PerformanceEntry>> {
        let mut matched: Vec<PerformanceEntry> = self
            .entries
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        // Stable order so "first entry in group" is deterministic.
        matched.sort_by(|a, b| a.date_start.cmp(&b.date_start).then_with(|| a.id.cmp(&b.id)));
        debug!(matched = matched.len(), "Entry query complete");
        Ok(matched)
    }
}

/// Daily aggregates keyed by their composite key.
#[derive(Default)]
pub struct InMemoryAggregateStore {
    rows: DashMap<AggregateKey, DailyAggregate>,
}

impl InMemoryAggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = DailyAggregate>) -> Self {
        let store = Self::new();
        for row in rows {
            store.rows.insert(row.key(), row);
        }
        store
    }

    pub fn get(&self, key: &AggregateKey) -> Option<DailyAggregate> {
        self.rows.get(key).map(|r| r.value().clone())
    }

    /// Every row, ordered by key.
    pub fn all(&self) -> Vec<DailyAggregate> {
        let mut rows: Vec<DailyAggregate> = self.rows.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|r| r.key());
        rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl AggregateStore for InMemoryAggregateStore {
    async fn upsert(&self, aggregate: DailyAggregate) -> MediaHubResult<UpsertOutcome> {
        let inserted = match self.rows.entry(aggregate.key()) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(aggregate);
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(aggregate);
                true
            }
        };
        Ok(UpsertOutcome { inserted })
    }

    async fn find(&self, filter: &AggregateFilter) -> MediaHubResult<Vec<DailyAggregate>> {
        let mut rows: Vec<DailyAggregate> = self
            .rows
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.key());
        Ok(rows)
    }

    async fn delete_where(&self, filter: &AggregateFilter) -> MediaHubResult<u64> {
        let mut removed = 0u64;
        self.rows.retain(|_, row| {
            if filter.matches(row) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}
