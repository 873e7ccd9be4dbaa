//! Media Hub aggregator — job runner for daily performance rollups.
//!
//! Loads the performance-entry and daily-aggregate collections from JSON
//! snapshots, runs one aggregation operation (or the daily schedule) and
//! writes the aggregate collection back.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use mediahub_aggregation::AggregationService;
use mediahub_core::config::AppConfig;
use mediahub_core::types::AggregationRunResult;
use mediahub_reporting::PerformanceDashboard;
use mediahub_store::{snapshot, InMemoryAggregateStore, InMemoryEntryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "mediahub-aggregator")]
#[command(about = "Daily performance aggregation jobs for Chicago Media Hub")]
#[command(version)]
struct Cli {
    /// Performance entry snapshot (overrides config)
    #[arg(long, global = true, env = "MEDIA_HUB__STORE__ENTRIES_PATH")]
    entries: Option<String>,

    /// Daily aggregate snapshot (overrides config)
    #[arg(long, global = true, env = "MEDIA_HUB__STORE__AGGREGATES_PATH")]
    aggregates: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate an inclusive day range
    Run {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        campaign: Option<String>,
        #[arg(long)]
        publication: Option<i64>,
    },
    /// Aggregate yesterday
    Daily,
    /// Re-aggregate the trailing N days through today
    Backfill {
        #[arg(long)]
        days: Option<u32>,
    },
    /// Rebuild all aggregates for one campaign
    RecomputeCampaign { campaign_id: String },
    /// Rebuild the aggregates touched by one order
    RecomputeOrder { order_id: String },
    /// Delete aggregate rows with zero folded entries
    Cleanup,
    /// Print a campaign performance summary
    Report {
        campaign_id: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Run the daily aggregation on a fixed interval until interrupted
    Schedule,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mediahub_aggregator=info,mediahub_aggregation=info,mediahub_store=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(path) = cli.entries {
        config.store.entries_path = path;
    }
    if let Some(path) = cli.aggregates {
        config.store.aggregates_path = path;
    }

    info!(
        node_id = %config.node_id,
        entries_path = %config.store.entries_path,
        aggregates_path = %config.store.aggregates_path,
        "Configuration loaded"
    );

    let aggregates = Arc::new(InMemoryAggregateStore::from_rows(
        snapshot::load_aggregates(&config.store.aggregates_path).await?,
    ));

    match cli.command {
        Command::Schedule => run_schedule(&config, aggregates).await,
        Command::Report {
            campaign_id,
            from,
            to,
        } => {
            let dashboard = PerformanceDashboard::new(aggregates);
            let perf = dashboard.campaign_performance(&campaign_id, from, to).await?;
            println!("{}", serde_json::to_string_pretty(&perf)?);
            Ok(())
        }
        Command::Cleanup => {
            let removed = run_cleanup(&config, aggregates).await?;
            println!("{}", serde_json::json!({ "removed": removed }));
            Ok(())
        }
        Command::Run {
            from,
            to,
            campaign,
            publication,
        } => {
            let service = load_service(&config, aggregates.clone()).await?;
            let result = service
                .run_aggregation(day_start(from), day_start(to), campaign.as_deref(), publication)
                .await;
            finish(&config, &aggregates, result).await
        }
        Command::Daily => {
            let service = load_service(&config, aggregates.clone()).await?;
            let result = service.run_daily_aggregation().await;
            finish(&config, &aggregates, result).await
        }
        Command::Backfill { days } => {
            let service = load_service(&config, aggregates.clone()).await?;
            let days = days.unwrap_or(config.aggregation.backfill_days);
            let result = service.backfill(days).await;
            finish(&config, &aggregates, result).await
        }
        Command::RecomputeCampaign { campaign_id } => {
            let service = load_service(&config, aggregates.clone()).await?;
            let result = service.recompute_for_campaign(&campaign_id).await;
            finish(&config, &aggregates, result).await
        }
        Command::RecomputeOrder { order_id } => {
            let service = load_service(&config, aggregates.clone()).await?;
            let result = service.recompute_for_order(&order_id).await;
            finish(&config, &aggregates, result).await
        }
    }
}

async fn load_service(
    config: &AppConfig,
    aggregates: Arc<InMemoryAggregateStore>,
) -> anyhow::Result<AggregationService> {
    let entries = snapshot::load_entries(&config.store.entries_path).await?;
    Ok(AggregationService::new(
        Arc::new(InMemoryEntryStore::from_entries(entries)),
        aggregates,
    ))
}

/// Cleanup only touches aggregates, so the entries snapshot is not read.
async fn run_cleanup(
    config: &AppConfig,
    aggregates: Arc<InMemoryAggregateStore>,
) -> anyhow::Result<u64> {
    let service = AggregationService::new(Arc::new(InMemoryEntryStore::new()), aggregates.clone());
    let removed = service.cleanup_stale_aggregates().await?;
    save(config, &aggregates).await?;
    Ok(removed)
}

async fn save(config: &AppConfig, aggregates: &InMemoryAggregateStore) -> anyhow::Result<()> {
    snapshot::save_aggregates(&config.store.aggregates_path, &aggregates.all()).await?;
    Ok(())
}

/// Persist the aggregate collection, print the run summary and fail the
/// process when the run did not succeed.
async fn finish(
    config: &AppConfig,
    aggregates: &InMemoryAggregateStore,
    result: AggregationRunResult,
) -> anyhow::Result<()> {
    save(config, aggregates).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        anyhow::bail!(
            "Aggregation run {} failed: {}",
            result.run_id,
            result.errors.join("; ")
        );
    }
    Ok(())
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

async fn run_schedule(
    config: &AppConfig,
    aggregates: Arc<InMemoryAggregateStore>,
) -> anyhow::Result<()> {
    if config.metrics.enabled {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(config.metrics.host.parse()?, config.metrics.port))
            .install()?;
        info!(port = config.metrics.port, "Metrics exporter started");
    }

    if config.aggregation.schedule_interval_secs == 0 {
        anyhow::bail!("aggregation.schedule_interval_secs must be greater than zero");
    }
    let period = std::time::Duration::from_secs(config.aggregation.schedule_interval_secs);
    let mut interval = tokio::time::interval(period);
    info!(interval_secs = period.as_secs(), "Daily aggregation schedule started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Entries are reloaded each tick so new reports are picked up.
                let service = match load_service(config, aggregates.clone()).await {
                    Ok(service) => service,
                    Err(e) => {
                        error!(error = %e, "Failed to load performance entries, skipping run");
                        continue;
                    }
                };
                let result = service.run_daily_aggregation().await;
                if !result.success {
                    error!(run_id = %result.run_id, errors = ?result.errors, "Scheduled daily aggregation failed");
                }
                if let Err(e) = save(config, &aggregates).await {
                    error!(error = %e, "Failed to persist daily aggregates");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping schedule");
                return Ok(());
            }
        }
    }
}
