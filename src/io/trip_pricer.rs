//! Simulated trip pricing service

use crate::domain::types::{PriceQuote, UserId};
use crate::io::{simulated_latency, TripPricer};
use anyhow::bail;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

const PROVIDERS: [&str; 10] = [
    "Holiday Travels",
    "Enterprize Ventures Limited",
    "Sunny Days",
    "FlyAway Trips",
    "United Partners Vacations",
    "Dream Trips",
    "Live Free",
    "Dancing Waves Cruselines and Partners",
    "AdventureCo",
    "Cure-Your-Blues",
];

pub const QUOTES_PER_REQUEST: usize = 5;

pub struct SimulatedTripPricer {
    latency_ms: (u64, u64),
}

impl SimulatedTripPricer {
    pub fn new(latency_ms: (u64, u64)) -> Self {
        Self { latency_ms }
    }
}

fn build_quotes(adults: u32, children: u32, nights: u32, cumulative_points: i64) -> Vec<PriceQuote> {
    let mut rng = rand::rng();
    let mut providers = PROVIDERS;
    providers.shuffle(&mut rng);

    // Every third child travels free
    let paying_children = f64::from(children / 3);

    providers[..QUOTES_PER_REQUEST]
        .iter()
        .map(|provider| {
            let multiple = f64::from(rng.random_range(100u32..700));
            let price = multiple * f64::from(adults)
                + multiple * paying_children * f64::from(nights)
                + 0.99
                - cumulative_points as f64;
            PriceQuote {
                provider: (*provider).to_string(),
                price: price.max(0.0),
                trip_id: Uuid::new_v4(),
            }
        })
        .collect()
}

#[async_trait]
impl TripPricer for SimulatedTripPricer {
    async fn quote(
        &self,
        api_key: &str,
        _user_id: UserId,
        adults: u32,
        children: u32,
        duration: u32,
        cumulative_points: i64,
    ) -> anyhow::Result<Vec<PriceQuote>> {
        if api_key.is_empty() {
            bail!("trip pricer rejected request: missing api key");
        }
        simulated_latency(self.latency_ms).await;
        Ok(build_quotes(adults, children, duration, cumulative_points))
    }
}
