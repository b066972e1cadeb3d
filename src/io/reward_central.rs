//! Simulated reward oracle

use crate::domain::types::{AttractionId, UserId};
use crate::io::{simulated_latency, RewardOracle};
use async_trait::async_trait;
use rand::Rng;

pub const MIN_REWARD_POINTS: i32 = 1;
pub const MAX_REWARD_POINTS: i32 = 1000;

pub struct SimulatedRewardCentral {
    latency_ms: (u64, u64),
}

impl SimulatedRewardCentral {
    pub fn new(latency_ms: (u64, u64)) -> Self {
        Self { latency_ms }
    }
}

#[async_trait]
impl RewardOracle for SimulatedRewardCentral {
    async fn score_points(&self, _attraction_id: AttractionId, _user_id: UserId) -> anyhow::Result<i32> {
        simulated_latency(self.latency_ms).await;
        Ok(rand::rng().random_range(MIN_REWARD_POINTS..=MAX_REWARD_POINTS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_points_in_range() {
        let oracle = SimulatedRewardCentral::new((0, 0));
        for _ in 0..200 {
            let points =
                oracle.score_points(AttractionId(Uuid::new_v4()), UserId::random()).await.unwrap();
            assert!((MIN_REWARD_POINTS..=MAX_REWARD_POINTS).contains(&points));
        }
    }
}
