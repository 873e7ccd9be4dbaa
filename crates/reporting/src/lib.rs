//! Campaign reporting over daily aggregates — per-campaign performance,
//! channel and publication breakdowns, and a cross-campaign overview.

pub mod dashboard;

pub use dashboard::{CampaignPerformance, DashboardOverview, PerformanceDashboard};
