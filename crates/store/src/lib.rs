//! Document-store access for performance entries and daily aggregates.

pub mod memory;
pub mod snapshot;
pub mod traits;

pub use memory::{InMemoryAggregateStore, InMemoryEntryStore};
pub use traits::{AggregateFilter, AggregateStore, EntryFilter, EntryStore, UpsertOutcome};
