//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Every section is optional; missing keys take the defaults below.

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "tourguide".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Sleep between two tracking cycles
    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,
    /// Users tracked concurrently within one cycle
    #[serde(default = "default_tracker_concurrency")]
    pub concurrency: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            polling_interval_secs: default_polling_interval_secs(),
            concurrency: default_tracker_concurrency(),
        }
    }
}

fn default_polling_interval_secs() -> u64 {
    300
}

fn default_tracker_concurrency() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewardsConfig {
    /// Max distance (miles) between a visit and an attraction to earn a reward
    #[serde(default = "default_proximity_buffer_miles")]
    pub proximity_buffer_miles: f64,
    /// Max distance (miles) for an attraction to count as nearby
    #[serde(default = "default_attraction_proximity_range_miles")]
    pub attraction_proximity_range_miles: f64,
    /// Concurrent reward oracle calls across the whole process
    #[serde(default = "default_oracle_concurrency")]
    pub oracle_concurrency: usize,
    /// Users computed concurrently by a batch
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            proximity_buffer_miles: default_proximity_buffer_miles(),
            attraction_proximity_range_miles: default_attraction_proximity_range_miles(),
            oracle_concurrency: default_oracle_concurrency(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

fn default_proximity_buffer_miles() -> f64 {
    10.0
}

fn default_attraction_proximity_range_miles() -> f64 {
    200.0
}

fn default_oracle_concurrency() -> usize {
    100
}

fn default_batch_concurrency() -> usize {
    100
}

/// Simulated provider behaviour and the internal test users
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_internal_user_count")]
    pub internal_user_count: usize,
    #[serde(default = "default_gps_min_latency_ms")]
    pub gps_min_latency_ms: u64,
    #[serde(default = "default_gps_max_latency_ms")]
    pub gps_max_latency_ms: u64,
    #[serde(default = "default_oracle_min_latency_ms")]
    pub oracle_min_latency_ms: u64,
    #[serde(default = "default_oracle_max_latency_ms")]
    pub oracle_max_latency_ms: u64,
    #[serde(default = "default_pricer_min_latency_ms")]
    pub pricer_min_latency_ms: u64,
    #[serde(default = "default_pricer_max_latency_ms")]
    pub pricer_max_latency_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            internal_user_count: default_internal_user_count(),
            gps_min_latency_ms: default_gps_min_latency_ms(),
            gps_max_latency_ms: default_gps_max_latency_ms(),
            oracle_min_latency_ms: default_oracle_min_latency_ms(),
            oracle_max_latency_ms: default_oracle_max_latency_ms(),
            pricer_min_latency_ms: default_pricer_min_latency_ms(),
            pricer_max_latency_ms: default_pricer_max_latency_ms(),
        }
    }
}

fn default_internal_user_count() -> usize {
    100
}

fn default_gps_min_latency_ms() -> u64 {
    30
}

fn default_gps_max_latency_ms() -> u64 {
    100
}

fn default_oracle_min_latency_ms() -> u64 {
    1
}

fn default_oracle_max_latency_ms() -> u64 {
    1000
}

fn default_pricer_min_latency_ms() -> u64 {
    1
}

fn default_pricer_max_latency_ms() -> u64 {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripPricerConfig {
    #[serde(default = "default_trip_pricer_api_key")]
    pub api_key: String,
}

impl Default for TripPricerConfig {
    fn default() -> Self {
        Self { api_key: default_trip_pricer_api_key() }
    }
}

fn default_trip_pricer_api_key() -> String {
    "test-server-api-key".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_metrics_interval_secs(),
            prometheus_port: default_prometheus_port(),
        }
    }
}

fn default_metrics_interval_secs() -> u64 {
    10
}

fn default_prometheus_port() -> u16 {
    9090
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub trip_pricer: TripPricerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    tracking_interval: Duration,
    tracker_concurrency: usize,
    proximity_buffer_miles: f64,
    attraction_proximity_range_miles: f64,
    oracle_concurrency: usize,
    batch_concurrency: usize,
    internal_user_count: usize,
    gps_latency_ms: (u64, u64),
    oracle_latency_ms: (u64, u64),
    pricer_latency_ms: (u64, u64),
    trip_pricer_api_key: String,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        let sim = toml_config.simulation;
        Self {
            site_id: toml_config.site.id,
            tracking_interval: Duration::from_secs(toml_config.tracker.polling_interval_secs),
            tracker_concurrency: toml_config.tracker.concurrency.max(1),
            proximity_buffer_miles: toml_config.rewards.proximity_buffer_miles,
            attraction_proximity_range_miles: toml_config.rewards.attraction_proximity_range_miles,
            oracle_concurrency: toml_config.rewards.oracle_concurrency.max(1),
            batch_concurrency: toml_config.rewards.batch_concurrency.max(1),
            internal_user_count: sim.internal_user_count,
            gps_latency_ms: ordered(sim.gps_min_latency_ms, sim.gps_max_latency_ms),
            oracle_latency_ms: ordered(sim.oracle_min_latency_ms, sim.oracle_max_latency_ms),
            pricer_latency_ms: ordered(sim.pricer_min_latency_ms, sim.pricer_max_latency_ms),
            trip_pricer_api_key: toml_config.trip_pricer.api_key,
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            prometheus_port: toml_config.metrics.prometheus_port,
            config_file,
        }
    }

    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        // Check for --config argument
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let config = Self::from_toml(toml_config, path.display().to_string());
        config.warn_on_threshold_inversion();
        Ok(config)
    }

    /// Load configuration from a path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(args: &[String]) -> Self {
        Self::load_from_path(&Self::resolve_config_path(args))
    }

    /// The nearby range is meant to be the looser of the two thresholds
    fn warn_on_threshold_inversion(&self) {
        if self.attraction_proximity_range_miles < self.proximity_buffer_miles {
            warn!(
                proximity_buffer_miles = %self.proximity_buffer_miles,
                attraction_proximity_range_miles = %self.attraction_proximity_range_miles,
                "attraction_proximity_range_below_reward_buffer"
            );
        }
    }

    // Getters for all config fields
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn tracking_interval(&self) -> Duration {
        self.tracking_interval
    }

    pub fn tracker_concurrency(&self) -> usize {
        self.tracker_concurrency
    }

    pub fn proximity_buffer_miles(&self) -> f64 {
        self.proximity_buffer_miles
    }

    pub fn attraction_proximity_range_miles(&self) -> f64 {
        self.attraction_proximity_range_miles
    }

    pub fn oracle_concurrency(&self) -> usize {
        self.oracle_concurrency
    }

    pub fn batch_concurrency(&self) -> usize {
        self.batch_concurrency
    }

    pub fn internal_user_count(&self) -> usize {
        self.internal_user_count
    }

    /// Simulated GPS latency range (min, max) in milliseconds
    pub fn gps_latency_ms(&self) -> (u64, u64) {
        self.gps_latency_ms
    }

    pub fn oracle_latency_ms(&self) -> (u64, u64) {
        self.oracle_latency_ms
    }

    pub fn pricer_latency_ms(&self) -> (u64, u64) {
        self.pricer_latency_ms
    }

    pub fn trip_pricer_api_key(&self) -> &str {
        &self.trip_pricer_api_key
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    // Builder methods, used by tests and the perf binary

    pub fn with_tracking_interval(mut self, interval: Duration) -> Self {
        self.tracking_interval = interval;
        self
    }

    pub fn with_tracker_concurrency(mut self, concurrency: usize) -> Self {
        self.tracker_concurrency = concurrency.max(1);
        self
    }

    pub fn with_proximity_buffer_miles(mut self, miles: f64) -> Self {
        self.proximity_buffer_miles = miles;
        self
    }

    pub fn with_oracle_concurrency(mut self, concurrency: usize) -> Self {
        self.oracle_concurrency = concurrency.max(1);
        self
    }

    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    pub fn with_internal_user_count(mut self, count: usize) -> Self {
        self.internal_user_count = count;
        self
    }

    pub fn with_trip_pricer_api_key(mut self, api_key: &str) -> Self {
        self.trip_pricer_api_key = api_key.to_string();
        self
    }

    /// Zero latency for every simulated provider
    pub fn without_simulated_latency(mut self) -> Self {
        self.gps_latency_ms = (0, 0);
        self.oracle_latency_ms = (0, 0);
        self.pricer_latency_ms = (0, 0);
        self
    }
}

fn ordered(a: u64, b: u64) -> (u64, u64) {
    (a.min(b), a.max(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.site_id(), "tourguide");
        assert_eq!(config.tracking_interval(), Duration::from_secs(300));
        assert_eq!(config.proximity_buffer_miles(), 10.0);
        assert_eq!(config.attraction_proximity_range_miles(), 200.0);
        assert_eq!(config.internal_user_count(), 100);
        assert_eq!(config.oracle_latency_ms(), (1, 1000));
        assert_eq!(config.trip_pricer_api_key(), "test-server-api-key");
        assert_eq!(config.config_file(), "default");
    }

    #[test]
    fn test_nearby_range_is_looser_than_reward_buffer() {
        let config = Config::default();
        assert!(config.attraction_proximity_range_miles() >= config.proximity_buffer_miles());
    }

    #[test]
    fn test_resolve_config_path_default() {
        let args: Vec<String> = vec!["tourguide".to_string()];
        if env::var("CONFIG_FILE").is_err() {
            assert_eq!(Config::resolve_config_path(&args), "config/dev.toml");
        }
    }

    #[test]
    fn test_resolve_config_path_from_arg() {
        let args: Vec<String> =
            vec!["tourguide".to_string(), "--config".to_string(), "config/prod.toml".to_string()];
        assert_eq!(Config::resolve_config_path(&args), "config/prod.toml");
    }

    #[test]
    fn test_resolve_config_path_from_arg_equals() {
        let args: Vec<String> =
            vec!["tourguide".to_string(), "--config=config/perf.toml".to_string()];
        assert_eq!(Config::resolve_config_path(&args), "config/perf.toml");
    }

    #[test]
    fn test_latency_ranges_are_ordered() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[simulation]
gps_min_latency_ms = 80
gps_max_latency_ms = 20
"#,
        )
        .unwrap();
        let config = Config::from_toml(toml_config, "inline".to_string());
        assert_eq!(config.gps_latency_ms(), (20, 80));
    }

    #[test]
    fn test_concurrency_never_zero() {
        let config = Config::default().with_tracker_concurrency(0).with_oracle_concurrency(0);
        assert_eq!(config.tracker_concurrency(), 1);
        assert_eq!(config.oracle_concurrency(), 1);
    }

    #[test]
    fn test_without_simulated_latency() {
        let config = Config::default().without_simulated_latency();
        assert_eq!(config.gps_latency_ms(), (0, 0));
        assert_eq!(config.oracle_latency_ms(), (0, 0));
        assert_eq!(config.pricer_latency_ms(), (0, 0));
    }
}
