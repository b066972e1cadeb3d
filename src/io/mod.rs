//! IO modules - external system interfaces
//!
//! The services only see the provider traits below. The simulated adapters
//! stand in for the real GPS, reward and pricing services:
//! - `gps` - GPS positions and the attraction catalog
//! - `reward_central` - reward point oracle
//! - `trip_pricer` - trip price quotes
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod gps;
pub mod prometheus;
pub mod reward_central;
pub mod trip_pricer;

use crate::domain::types::{Attraction, AttractionId, PriceQuote, UserId, VisitedLocation};
use async_trait::async_trait;
use std::time::Duration;

pub use gps::SimulatedGps;
pub use reward_central::SimulatedRewardCentral;
pub use trip_pricer::SimulatedTripPricer;

/// Source of the global attraction catalog
#[async_trait]
pub trait AttractionCatalog: Send + Sync {
    /// Every attraction, in a stable order
    async fn list_attractions(&self) -> anyhow::Result<Vec<Attraction>>;
}

/// Scores a visit to an attraction
#[async_trait]
pub trait RewardOracle: Send + Sync {
    /// Points in [1, 1000]
    async fn score_points(&self, attraction_id: AttractionId, user_id: UserId) -> anyhow::Result<i32>;
}

#[async_trait]
pub trait GpsProvider: Send + Sync {
    async fn current_position(&self, user_id: UserId) -> anyhow::Result<VisitedLocation>;
}

#[async_trait]
pub trait TripPricer: Send + Sync {
    async fn quote(
        &self,
        api_key: &str,
        user_id: UserId,
        adults: u32,
        children: u32,
        duration: u32,
        cumulative_points: i64,
    ) -> anyhow::Result<Vec<PriceQuote>>;
}

/// Sleep for a random duration inside `(min, max)` milliseconds
///
/// The thread RNG is not `Send`, so it is dropped before the await.
pub(crate) async fn simulated_latency((min_ms, max_ms): (u64, u64)) {
    if max_ms == 0 {
        return;
    }
    let ms = {
        use rand::Rng;
        rand::rng().random_range(min_ms..=max_ms)
    };
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
