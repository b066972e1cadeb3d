//! TourGuide service - the operations exposed to callers
//!
//! Ties the directory, GPS provider, reward engine and trip pricer together.
//! A tracking cycle is `track_all_users`; the tracker only schedules it.

use crate::domain::geo::distance;
use crate::domain::types::{Attraction, Location, PriceQuote, UserReward, VisitedLocation};
use crate::domain::user::User;
use crate::infra::config::Config;
use crate::infra::error::{Result, TourGuideError};
use crate::infra::metrics::Metrics;
use crate::io::{GpsProvider, TripPricer};
use crate::services::directory::UserDirectory;
use crate::services::rewards::{RewardEngine, UserFailure};
use crate::services::worker_pool::WorkerPool;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// How many attractions the nearby queries return
pub const NEARBY_ATTRACTION_COUNT: usize = 5;

/// Outcome of one tracking cycle over every registered user
#[derive(Debug)]
pub struct CycleReport {
    pub tracked: usize,
    pub failures: Vec<UserFailure>,
    pub elapsed: Duration,
    pub finished_at: DateTime<Utc>,
}

/// The attractions closest to a user, with what a visit would earn
#[derive(Debug, Clone, Serialize)]
pub struct NearbyAttractions {
    pub user_location: Location,
    pub attractions: Vec<NearbyAttraction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyAttraction {
    pub name: String,
    pub location: Location,
    pub distance_miles: f64,
    pub reward_points: i32,
}

pub struct TourGuide {
    directory: Arc<UserDirectory>,
    gps: Arc<dyn GpsProvider>,
    rewards: Arc<RewardEngine>,
    pricer: Arc<dyn TripPricer>,
    tracker_pool: WorkerPool,
    trip_pricer_api_key: String,
    metrics: Arc<Metrics>,
}

impl TourGuide {
    pub fn new(
        config: &Config,
        directory: Arc<UserDirectory>,
        gps: Arc<dyn GpsProvider>,
        rewards: Arc<RewardEngine>,
        pricer: Arc<dyn TripPricer>,
        metrics: Arc<Metrics>,
    ) -> Self {
        metrics.set_users_registered(directory.len() as u64);
        Self {
            directory,
            gps,
            rewards,
            pricer,
            tracker_pool: WorkerPool::new("tracker", config.tracker_concurrency()),
            trip_pricer_api_key: config.trip_pricer_api_key().to_string(),
            metrics,
        }
    }

    pub fn rewards(&self) -> &Arc<RewardEngine> {
        &self.rewards
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    // Users

    pub fn user(&self, name: &str) -> Result<Arc<User>> {
        self.directory.get(name)
    }

    pub fn register_user(&self, user: Arc<User>) -> bool {
        let added = self.directory.register(user);
        self.metrics.set_users_registered(self.directory.len() as u64);
        added
    }

    pub fn all_users(&self) -> Vec<Arc<User>> {
        self.directory.list_all()
    }

    // Tracking

    /// Fetch a fresh position, append it and recompute rewards
    pub async fn track_user_location(&self, user: &User) -> Result<VisitedLocation> {
        let started = Instant::now();
        let visited = self
            .gps
            .current_position(user.id())
            .await
            .map_err(|e| TourGuideError::upstream("gps", &e))?;
        self.metrics.record_location_tracked(started.elapsed().as_millis() as u64);

        user.add_visited_location(visited.clone());
        self.rewards.rewards_for(user).await?;
        Ok(visited)
    }

    /// One tracking cycle: every user, bounded by the tracker pool
    pub async fn track_all_users(self: &Arc<Self>) -> CycleReport {
        let started = Instant::now();
        let users = self.directory.list_all();
        let total = users.len();
        let mut names: FxHashMap<tokio::task::Id, String> = FxHashMap::default();
        let mut set = JoinSet::new();

        for user in users {
            let guide = self.clone();
            let name = user.name().to_string();
            let handle = set.spawn(async move {
                let pool = guide.tracker_pool.clone();
                pool.run(guide.track_user_location(&user)).await.and_then(|r| r)
            });
            names.insert(handle.id(), name);
        }

        let mut tracked = 0;
        let mut failures = Vec::new();
        while let Some(joined) = set.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, result)) => (id, result.map(|_| ())),
                Err(e) => (e.id(), Err(TourGuideError::Upstream { service: "tracker", message: e.to_string() })),
            };
            let user_name = names.remove(&id).unwrap_or_default();
            match outcome {
                Ok(()) => tracked += 1,
                Err(error) => {
                    self.metrics.record_tracking_failure();
                    warn!(user = %user_name, error = %error, "user_tracking_failed");
                    failures.push(UserFailure { user_name, error });
                }
            }
        }

        let elapsed = started.elapsed();
        self.metrics.record_tracking_cycle(elapsed.as_millis() as u64);
        self.metrics.set_users_registered(self.directory.len() as u64);
        info!(
            users = %total,
            tracked = %tracked,
            failed = %failures.len(),
            elapsed_ms = %elapsed.as_millis(),
            "tracking_cycle_completed"
        );

        CycleReport { tracked, failures, elapsed, finished_at: Utc::now() }
    }

    /// Last known location, or a freshly tracked one when the history is empty
    pub async fn user_location(&self, name: &str) -> Result<VisitedLocation> {
        let user = self.directory.get(name)?;
        self.location_of(&user).await
    }

    async fn location_of(&self, user: &User) -> Result<VisitedLocation> {
        match user.last_visited_location() {
            Some(visited) => Ok(visited),
            None => {
                debug!(user = %user.name(), "empty_history_tracking_now");
                self.track_user_location(user).await
            }
        }
    }

    // Rewards and attractions

    pub async fn user_rewards(&self, name: &str) -> Result<Vec<UserReward>> {
        let user = self.directory.get(name)?;
        self.rewards.rewards_for(&user).await
    }

    /// The closest attractions, nearest first; ties keep catalog order
    pub async fn nearby_attractions(&self, visited: &VisitedLocation) -> Result<Vec<Attraction>> {
        Ok(self
            .closest_attractions(visited.location)
            .await?
            .into_iter()
            .map(|(_, attraction)| attraction)
            .collect())
    }

    async fn closest_attractions(&self, location: Location) -> Result<Vec<(f64, Attraction)>> {
        let mut ranked: Vec<(f64, Attraction)> = self
            .rewards
            .list_attractions()
            .await?
            .into_iter()
            .map(|attraction| (distance(location, attraction.location), attraction))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.truncate(NEARBY_ATTRACTION_COUNT);
        Ok(ranked)
    }

    /// Closest attractions to the user's last location, with the points each would earn
    pub async fn nearby_attraction_report(&self, name: &str) -> Result<NearbyAttractions> {
        let user = self.directory.get(name)?;
        let visited = self.location_of(&user).await?;
        let ranked = self.closest_attractions(visited.location).await?;

        let mut scoring = JoinSet::new();
        for (index, (_, attraction)) in ranked.iter().enumerate() {
            let rewards = self.rewards.clone();
            let user = user.clone();
            let attraction = attraction.clone();
            scoring.spawn(async move { (index, rewards.reward_points(&attraction, &user).await) });
        }

        let mut points = vec![0; ranked.len()];
        while let Some(joined) = scoring.join_next().await {
            let (index, result) = joined.map_err(|e| TourGuideError::Upstream {
                service: "reward_oracle",
                message: e.to_string(),
            })?;
            points[index] = result?;
        }

        let attractions = ranked
            .into_iter()
            .zip(points)
            .map(|((distance_miles, attraction), reward_points)| NearbyAttraction {
                name: attraction.name,
                location: attraction.location,
                distance_miles,
                reward_points,
            })
            .collect();

        Ok(NearbyAttractions { user_location: visited.location, attractions })
    }

    // Trip deals

    /// Ask the pricer for quotes using the user's points, and store them on the user
    pub async fn trip_deals(&self, name: &str) -> Result<Vec<PriceQuote>> {
        let user = self.directory.get(name)?;
        let points = user.cumulative_reward_points();
        let prefs = user.preferences();

        let quotes = self
            .pricer
            .quote(
                &self.trip_pricer_api_key,
                user.id(),
                prefs.number_of_adults,
                prefs.number_of_children,
                prefs.trip_duration,
                points,
            )
            .await
            .map_err(|e| TourGuideError::upstream("trip_pricer", &e))?;

        debug!(user = %name, quotes = %quotes.len(), cumulative_points = %points, "trip_deals_updated");
        user.set_trip_deals(quotes.clone());
        Ok(quotes)
    }
}
