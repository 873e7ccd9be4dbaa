use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `MEDIA_HUB__` and an optional `mediahub.toml` file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    /// Trailing window used by `backfill` when no day count is given.
    #[serde(default = "default_backfill_days")]
    pub backfill_days: u32,
    /// Interval between daily runs in `schedule` mode.
    #[serde(default = "default_schedule_interval_secs")]
    pub schedule_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_entries_path")]
    pub entries_path: String,
    #[serde(default = "default_aggregates_path")]
    pub aggregates_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_node_id() -> String {
    "aggregator-01".to_string()
}
fn default_backfill_days() -> u32 {
    30
}
fn default_schedule_interval_secs() -> u64 {
    86_400
}
fn default_entries_path() -> String {
    "data/performance_entries.json".to_string()
}
fn default_aggregates_path() -> String {
    "data/daily_aggregates.json".to_string()
}
fn default_metrics_enabled() -> bool {
    false
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            backfill_days: default_backfill_days(),
            schedule_interval_secs: default_schedule_interval_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            entries_path: default_entries_path(),
            aggregates_path: default_aggregates_path(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            host: default_host(),
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            aggregation: AggregationConfig::default(),
            store: StoreConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("mediahub").required(false))
            .add_source(
                config::Environment::with_prefix("MEDIA_HUB")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.aggregation.backfill_days, 30);
        assert_eq!(config.aggregation.schedule_interval_secs, 86_400);
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.port, 9091);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig = config::Config::builder()
            .set_override("aggregation.backfill_days", 7)
            .unwrap()
            .set_override("store.entries_path", "/tmp/entries.json")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.aggregation.backfill_days, 7);
        assert_eq!(config.aggregation.schedule_interval_secs, 86_400);
        assert_eq!(config.store.entries_path, "/tmp/entries.json");
        assert_eq!(config.store.aggregates_path, "data/daily_aggregates.json");
        assert_eq!(config.node_id, "aggregator-01");
    }
}
