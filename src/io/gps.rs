//! Simulated GPS service
//!
//! Serves the fixed attraction catalog and random user positions, with a
//! configurable response delay.

use crate::domain::types::{Attraction, Location, UserId, VisitedLocation};
use crate::io::{simulated_latency, AttractionCatalog, GpsProvider};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

/// Web Mercator latitude limit, also used for the internal users
pub const MAX_LATITUDE: f64 = 85.05112878;
pub const MAX_LONGITUDE: f64 = 180.0;

/// (name, city, state, latitude, longitude)
const CATALOG: [(&str, &str, &str, f64, f64); 26] = [
    ("Disneyland", "Anaheim", "CA", 33.817595, -117.922008),
    ("Jackson Hole", "Jackson Hole", "WY", 43.582767, -110.821999),
    ("Mojave National Preserve", "Kelso", "CA", 35.141689, -115.510399),
    ("Joshua Tree National Park", "Joshua Tree National Park", "CA", 33.881866, -115.90065),
    ("Buffalo National River", "St Joe", "AR", 35.985512, -92.757652),
    ("Hot Springs National Park", "Hot Springs", "AR", 34.52153, -93.042267),
    ("Kartchner Caverns State Park", "Benson", "AZ", 31.837551, -110.347382),
    ("Legend Valley", "Thornville", "OH", 39.937778, -82.40667),
    ("Flowers Bakery of London", "Flowers Bakery of London", "KY", 37.131527, -84.07486),
    ("McKinley Tower", "Anchorage", "AK", 61.218887, -149.877502),
    ("Flatiron Building", "New York City", "NY", 40.741112, -73.989723),
    ("Fallingwater", "Mill Run", "PA", 39.906113, -79.468056),
    ("Union Station", "Washington D.C.", "CA", 38.897095, -77.006332),
    ("Roger Dean Stadium", "Jupiter", "FL", 26.890959, -80.116577),
    ("Texas Memorial Stadium", "Austin", "TX", 30.283682, -97.732536),
    ("Bryant-Denny Stadium", "Tuscaloosa", "AL", 33.208973, -87.550438),
    ("Tiger Stadium", "Baton Rouge", "LA", 30.412035, -91.183815),
    ("Neyland Stadium", "Knoxville", "TN", 35.955013, -83.925011),
    ("Kyle Field", "College Station", "TX", 30.61025, -96.339844),
    ("San Diego Zoo", "San Diego", "CA", 32.735317, -117.149048),
    ("Zoo Tampa at Lowry Park", "Tampa", "FL", 28.012804, -82.469269),
    ("Franklin Park Zoo", "Boston", "MA", 42.302601, -71.086731),
    ("El Paso Zoo", "El Paso", "TX", 31.769125, -106.44487),
    ("Kansas City Zoo", "Kansas City", "MO", 39.007504, -94.529625),
    ("Bronx Zoo", "Bronx", "NY", 40.852905, -73.872971),
    ("Cinderella Castle", "Orlando", "FL", 28.419411, -81.5812),
];

pub struct SimulatedGps {
    attractions: Vec<Attraction>,
    latency_ms: (u64, u64),
}

impl SimulatedGps {
    pub fn new(latency_ms: (u64, u64)) -> Self {
        let attractions = CATALOG
            .iter()
            .map(|&(name, city, state, lat, lon)| Attraction::new(name, city, state, lat, lon))
            .collect();
        Self { attractions, latency_ms }
    }

    /// Catalog without going through the async trait, for seeding and tests
    pub fn attractions(&self) -> &[Attraction] {
        &self.attractions
    }
}

/// Uniformly random position on the Mercator-valid part of the globe
pub fn random_location() -> Location {
    let mut rng = rand::rng();
    Location::new(
        rng.random_range(-MAX_LATITUDE..=MAX_LATITUDE),
        rng.random_range(-MAX_LONGITUDE..=MAX_LONGITUDE),
    )
}

#[async_trait]
impl AttractionCatalog for SimulatedGps {
    async fn list_attractions(&self) -> anyhow::Result<Vec<Attraction>> {
        Ok(self.attractions.clone())
    }
}

#[async_trait]
impl GpsProvider for SimulatedGps {
    async fn current_position(&self, user_id: UserId) -> anyhow::Result<VisitedLocation> {
        simulated_latency(self.latency_ms).await;
        Ok(VisitedLocation::new(user_id, random_location(), Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[tokio::test]
    async fn test_catalog_has_unique_names() {
        let gps = SimulatedGps::new((0, 0));
        let attractions = gps.list_attractions().await.unwrap();

        assert_eq!(attractions.len(), 26);
        let names: FxHashSet<&str> = attractions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names.len(), 26);
        assert_eq!(attractions[0].name, "Disneyland");
    }

    #[tokio::test]
    async fn test_catalog_ids_are_stable() {
        let gps = SimulatedGps::new((0, 0));
        let first = gps.list_attractions().await.unwrap();
        let second = gps.list_attractions().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_current_position_in_range() {
        let gps = SimulatedGps::new((0, 0));
        let user_id = UserId::random();

        for _ in 0..50 {
            let visited = gps.current_position(user_id).await.unwrap();
            assert_eq!(visited.user_id, user_id);
            assert!(visited.location.latitude.abs() <= MAX_LATITUDE);
            assert!(visited.location.longitude.abs() <= MAX_LONGITUDE);
        }
    }
}
