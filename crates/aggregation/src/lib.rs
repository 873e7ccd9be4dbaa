//! Daily rollup of raw performance entries into per-day aggregates keyed by
//! campaign, publication and channel.

pub mod grouping;
pub mod service;

pub use grouping::{fold_entries, GroupTotals};
pub use service::AggregationService;
