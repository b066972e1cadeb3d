//! TourGuide - location tracking and attraction rewards service
//!
//! Seeds the internal users, runs the background location tracker and serves
//! metrics until Ctrl+C.
//!
//! Module structure:
//! - `domain/` - Core business types (User, Attraction, VisitedLocation, geo)
//! - `io/` - External interfaces (GPS, reward oracle, trip pricer, Prometheus)
//! - `services/` - Business logic (TourGuide, Tracker, RewardEngine)
//! - `infra/` - Infrastructure (Config, Metrics, errors)

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tourguide::infra::{Config, Metrics};
use tourguide::io::{SimulatedGps, SimulatedRewardCentral, SimulatedTripPricer};
use tourguide::services::internal_users::seed_internal_users;
use tourguide::services::{RewardEngine, TourGuide, Tracker, UserDirectory};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// TourGuide - tracks users and rewards attraction visits
#[derive(Parser, Debug)]
#[command(name = "tourguide", version, about)]
struct Args {
    /// Path to TOML configuration file (else CONFIG_FILE, else config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the number of seeded internal users
    #[arg(long)]
    internal_users: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("tourguide starting");

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(|| Config::resolve_config_path(&[]));
    let mut config = Config::load_from_path(&config_path);
    if let Some(count) = args.internal_users {
        config = config.with_internal_user_count(count);
    }

    info!(
        config_file = %config.config_file(),
        site = %config.site_id(),
        tracking_interval_secs = %config.tracking_interval().as_secs_f64(),
        tracker_concurrency = %config.tracker_concurrency(),
        proximity_buffer_miles = %config.proximity_buffer_miles(),
        attraction_proximity_range_miles = %config.attraction_proximity_range_miles(),
        oracle_concurrency = %config.oracle_concurrency(),
        internal_users = %config.internal_user_count(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    // Providers
    let gps = Arc::new(SimulatedGps::new(config.gps_latency_ms()));
    let oracle = Arc::new(SimulatedRewardCentral::new(config.oracle_latency_ms()));
    let pricer = Arc::new(SimulatedTripPricer::new(config.pricer_latency_ms()));

    let directory = Arc::new(UserDirectory::new());
    seed_internal_users(&directory, config.internal_user_count());

    let rewards = Arc::new(RewardEngine::new(&config, gps.clone(), oracle, metrics.clone()));
    let guide = Arc::new(TourGuide::new(&config, directory, gps, rewards, pricer, metrics.clone()));

    // The only tracker in the process
    let tracker = Arc::new(Tracker::new(guide, config.tracking_interval()));
    tracker.start().context("failed to start location tracker")?;

    // Start Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let prom_tracker = tracker.clone();
        let site_id = config.site_id().to_string();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = tourguide::io::prometheus::start_metrics_server(
                prometheus_port,
                prom_metrics,
                site_id,
                Some(prom_tracker),
                prom_shutdown,
            )
            .await
            {
                tracing::error!(error = %e, "Prometheus metrics server error");
            }
        });
    }

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    let mut reporter_shutdown = shutdown_rx;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            tokio::select! {
                _ = interval.tick() => metrics_clone.report().log(),
                _ = reporter_shutdown.changed() => break,
            }
        }
    });

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;
    info!("shutdown_signal_received");
    let _ = shutdown_tx.send(true);
    tracker.stop().await;

    info!("tourguide shutdown complete");
    Ok(())
}
