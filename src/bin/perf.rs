//! High-volume timing harness
//!
//! Seeds N internal users and times one full tracking cycle and one reward
//! batch with an unbounded proximity buffer.

use anyhow::{ensure, Context};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tourguide::domain::VisitedLocation;
use tourguide::infra::{Config, Metrics};
use tourguide::io::{SimulatedGps, SimulatedRewardCentral, SimulatedTripPricer};
use tourguide::services::internal_users::seed_internal_users;
use tourguide::services::{RewardEngine, TourGuide, UserDirectory};
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Track,
    Rewards,
    All,
}

#[derive(Parser, Debug)]
#[command(name = "tourguide-perf", about = "High-volume tracking and reward timing")]
struct Args {
    /// Path to TOML configuration file (latency and pool sizes)
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long, default_value_t = 100)]
    users: usize,

    #[arg(long, value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    /// Fail when the tracking cycle takes longer than this
    #[arg(long, default_value_t = 900)]
    track_budget_secs: u64,

    /// Fail when the reward batch takes longer than this
    #[arg(long, default_value_t = 1200)]
    rewards_budget_secs: u64,
}

struct Harness {
    guide: Arc<TourGuide>,
    gps: Arc<SimulatedGps>,
    metrics: Arc<Metrics>,
}

fn build(config: &Config) -> Harness {
    let metrics = Arc::new(Metrics::new());
    let gps = Arc::new(SimulatedGps::new(config.gps_latency_ms()));
    let oracle = Arc::new(SimulatedRewardCentral::new(config.oracle_latency_ms()));
    let pricer = Arc::new(SimulatedTripPricer::new(config.pricer_latency_ms()));

    let directory = Arc::new(UserDirectory::new());
    seed_internal_users(&directory, config.internal_user_count());

    let rewards = Arc::new(RewardEngine::new(config, gps.clone(), oracle, metrics.clone()));
    let guide =
        Arc::new(TourGuide::new(config, directory, gps.clone(), rewards, pricer, metrics.clone()));
    Harness { guide, gps, metrics }
}

async fn high_volume_track(config: &Config, budget: Duration) -> anyhow::Result<()> {
    let harness = build(config);
    let started = Instant::now();
    let report = harness.guide.track_all_users().await;
    let elapsed = started.elapsed();

    info!(
        users = %config.internal_user_count(),
        tracked = %report.tracked,
        failed = %report.failures.len(),
        elapsed_secs = %elapsed.as_secs_f64(),
        "high_volume_track_finished"
    );
    harness.metrics.report().log();

    ensure!(report.failures.is_empty(), "{} users failed to track", report.failures.len());
    ensure!(elapsed <= budget, "tracking took {:?}, budget {:?}", elapsed, budget);
    Ok(())
}

async fn high_volume_rewards(config: &Config, budget: Duration) -> anyhow::Result<()> {
    let harness = build(config);
    let attraction = harness
        .gps
        .attractions()
        .first()
        .cloned()
        .context("attraction catalog is empty")?;

    let engine = harness.guide.rewards().clone();
    engine.set_proximity_buffer(f64::MAX);

    let users = harness.guide.all_users();
    for user in &users {
        user.add_visited_location(VisitedLocation::new(user.id(), attraction.location, Utc::now()));
    }

    let started = Instant::now();
    let report = engine.rewards_for_batch(users.clone()).await;
    let elapsed = started.elapsed();

    let unrewarded = users.iter().filter(|u| u.reward_count() == 0).count();
    info!(
        users = %users.len(),
        succeeded = %report.succeeded,
        failed = %report.failures.len(),
        unrewarded = %unrewarded,
        elapsed_secs = %elapsed.as_secs_f64(),
        "high_volume_rewards_finished"
    );
    harness.metrics.report().log();
    engine.reset_proximity_buffer();

    ensure!(report.failures.is_empty(), "{} users failed reward computation", report.failures.len());
    ensure!(unrewarded == 0, "{unrewarded} users have no rewards");
    ensure!(elapsed <= budget, "reward batch took {:?}, budget {:?}", elapsed, budget);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(|| Config::resolve_config_path(&[]));
    let config = Config::load_from_path(&config_path).with_internal_user_count(args.users);
    if config.internal_user_count() == 0 {
        warn!("no_users_requested");
    }

    if matches!(args.scenario, Scenario::Track | Scenario::All) {
        high_volume_track(&config, Duration::from_secs(args.track_budget_secs)).await?;
    }
    if matches!(args.scenario, Scenario::Rewards | Scenario::All) {
        high_volume_rewards(&config, Duration::from_secs(args.rewards_budget_secs)).await?;
    }
    Ok(())
}
