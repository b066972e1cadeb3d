//! Reward engine
//!
//! Cross-references a user's visited locations with the attraction catalog
//! and asks the reward oracle to score every new match. Oracle calls share
//! one bounded pool across the whole process; batches fan out per user on a
//! separate pool so a user task holding a permit never waits on its own pool.

use crate::domain::geo::distance;
use crate::domain::types::{Attraction, AttractionId, Location, UserId, UserReward, VisitedLocation};
use crate::domain::user::User;
use crate::infra::config::Config;
use crate::infra::error::{Result, TourGuideError};
use crate::infra::metrics::Metrics;
use crate::io::{AttractionCatalog, RewardOracle};
use crate::services::worker_pool::WorkerPool;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Outcome of a bulk reward computation
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failures: Vec<UserFailure>,
}

#[derive(Debug)]
pub struct UserFailure {
    pub user_name: String,
    pub error: TourGuideError,
}

pub struct RewardEngine {
    catalog: Arc<dyn AttractionCatalog>,
    oracle: Arc<dyn RewardOracle>,
    oracle_pool: WorkerPool,
    batch_pool: WorkerPool,
    default_proximity_buffer: f64,
    /// f64 bits, so the buffer can change while computations run
    proximity_buffer: AtomicU64,
    attraction_proximity_range: f64,
    metrics: Arc<Metrics>,
}

impl RewardEngine {
    pub fn new(
        config: &Config,
        catalog: Arc<dyn AttractionCatalog>,
        oracle: Arc<dyn RewardOracle>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let buffer = config.proximity_buffer_miles();
        Self {
            catalog,
            oracle,
            oracle_pool: WorkerPool::new("reward_oracle", config.oracle_concurrency()),
            batch_pool: WorkerPool::new("reward_batch", config.batch_concurrency()),
            default_proximity_buffer: buffer,
            proximity_buffer: AtomicU64::new(buffer.to_bits()),
            attraction_proximity_range: config.attraction_proximity_range_miles(),
            metrics,
        }
    }

    pub fn proximity_buffer(&self) -> f64 {
        f64::from_bits(self.proximity_buffer.load(Ordering::Relaxed))
    }

    /// Takes effect for computations that start afterwards
    pub fn set_proximity_buffer(&self, miles: f64) {
        self.proximity_buffer.store(miles.to_bits(), Ordering::Relaxed);
        info!(proximity_buffer_miles = %miles, "proximity_buffer_changed");
    }

    pub fn reset_proximity_buffer(&self) {
        self.set_proximity_buffer(self.default_proximity_buffer);
    }

    pub fn attraction_proximity_range(&self) -> f64 {
        self.attraction_proximity_range
    }

    /// Whether a visit is close enough to an attraction to earn its reward
    pub fn near_attraction(&self, visited: &VisitedLocation, attraction: &Attraction) -> bool {
        distance(visited.location, attraction.location) < self.proximity_buffer()
    }

    pub fn is_within_attraction_proximity(&self, attraction: &Attraction, location: Location) -> bool {
        distance(attraction.location, location) < self.attraction_proximity_range
    }

    pub async fn list_attractions(&self) -> Result<Vec<Attraction>> {
        self.catalog
            .list_attractions()
            .await
            .map_err(|e| TourGuideError::upstream("attraction_catalog", &e))
    }

    /// One oracle call for `user` at `attraction`, through the oracle pool
    pub async fn reward_points(&self, attraction: &Attraction, user: &User) -> Result<i32> {
        score_through_pool(
            self.oracle.clone(),
            self.oracle_pool.clone(),
            self.metrics.clone(),
            attraction.id,
            user.id(),
        )
        .await
    }

    /// Reconcile the user's rewards with their history and return the full set.
    ///
    /// Each unrewarded attraction is matched with the first visit (in history
    /// order) inside the proximity buffer. On failure the rewards inserted so
    /// far are kept.
    pub async fn rewards_for(&self, user: &User) -> Result<Vec<UserReward>> {
        let result = self.compute(user).await;
        self.metrics.record_reward_computation(result.is_ok());
        result?;
        Ok(user.rewards())
    }

    async fn compute(&self, user: &User) -> Result<()> {
        let attractions = self.list_attractions().await?;
        let rewarded = user.rewarded_attraction_names();
        let history = user.visited_locations();
        let buffer = self.proximity_buffer();

        let candidates: Vec<(VisitedLocation, Attraction)> = attractions
            .into_iter()
            .filter(|attraction| !rewarded.contains(&attraction.name))
            .filter_map(|attraction| {
                history
                    .iter()
                    .find(|visited| distance(visited.location, attraction.location) < buffer)
                    .map(|visited| (visited.clone(), attraction))
            })
            .collect();

        if candidates.is_empty() {
            return Ok(());
        }

        let mut scoring = JoinSet::new();
        for (visited, attraction) in candidates {
            let oracle = self.oracle.clone();
            let pool = self.oracle_pool.clone();
            let metrics = self.metrics.clone();
            let user_id = user.id();
            scoring.spawn(async move {
                let points = score_through_pool(oracle, pool, metrics, attraction.id, user_id).await;
                (visited, attraction, points)
            });
        }

        // Dropping the set on the error path aborts the remaining calls
        while let Some(joined) = scoring.join_next().await {
            let (visited, attraction, points) = joined.map_err(|e| TourGuideError::Upstream {
                service: "reward_oracle",
                message: e.to_string(),
            })?;
            let points = points?;

            let attraction_name = attraction.name.clone();
            let inserted = user.add_reward(UserReward::new(visited, attraction, points));
            self.metrics.record_reward_insert(inserted);
            if inserted {
                debug!(user = %user.name(), attraction = %attraction_name, points = %points, "reward_granted");
            }
        }
        Ok(())
    }

    /// Compute rewards for many users; one user's failure does not affect the others
    pub async fn rewards_for_batch(self: &Arc<Self>, users: Vec<Arc<User>>) -> BatchReport {
        let started = Instant::now();
        let total = users.len();
        let mut names: FxHashMap<tokio::task::Id, String> = FxHashMap::default();
        let mut set = JoinSet::new();

        for user in users {
            let engine = self.clone();
            let name = user.name().to_string();
            let handle = set.spawn(async move {
                let pool = engine.batch_pool.clone();
                pool.run(engine.rewards_for(&user)).await.and_then(|r| r)
            });
            names.insert(handle.id(), name);
        }

        let mut report = BatchReport::default();
        while let Some(joined) = set.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, result)) => (id, result.map(|_| ())),
                Err(e) => (
                    e.id(),
                    Err(TourGuideError::Upstream { service: "reward_batch", message: e.to_string() }),
                ),
            };
            let user_name = names.remove(&id).unwrap_or_default();
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(error) => {
                    warn!(user = %user_name, error = %error, "reward_computation_failed");
                    report.failures.push(UserFailure { user_name, error });
                }
            }
        }

        info!(
            users = %total,
            succeeded = %report.succeeded,
            failed = %report.failures.len(),
            elapsed_ms = %started.elapsed().as_millis(),
            "reward_batch_completed"
        );
        report
    }
}

async fn score_through_pool(
    oracle: Arc<dyn RewardOracle>,
    pool: WorkerPool,
    metrics: Arc<Metrics>,
    attraction_id: AttractionId,
    user_id: UserId,
) -> Result<i32> {
    let (result, elapsed) = pool
        .run(async {
            let started = Instant::now();
            let result = oracle.score_points(attraction_id, user_id).await;
            (result, started.elapsed())
        })
        .await?;
    metrics.record_oracle_call(elapsed.as_millis() as u64, result.is_ok());
    result.map_err(|e| TourGuideError::upstream("reward_oracle", &e))
}
