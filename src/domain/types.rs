//! Shared value types for the tour guide core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Newtype wrapper for user IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a random user ID
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for attraction IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AttractionId(pub Uuid);

impl std::fmt::Display for AttractionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A coordinate pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    #[inline]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A timestamped GPS fix recorded for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitedLocation {
    pub user_id: UserId,
    pub location: Location,
    pub time_visited: DateTime<Utc>,
}

impl VisitedLocation {
    pub fn new(user_id: UserId, location: Location, time_visited: DateTime<Utc>) -> Self {
        Self { user_id, location, time_visited }
    }
}

/// A point of interest from the attraction catalog
///
/// The name is the unique key; two catalog entries never share one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attraction {
    pub id: AttractionId,
    pub name: String,
    pub city: String,
    pub state: String,
    pub location: Location,
}

impl Attraction {
    pub fn new(name: &str, city: &str, state: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id: AttractionId(Uuid::new_v4()),
            name: name.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            location: Location::new(latitude, longitude),
        }
    }
}

/// Points earned by a user for visiting near an attraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReward {
    pub visited_location: VisitedLocation,
    pub attraction: Attraction,
    pub reward_points: i32,
}

impl UserReward {
    pub fn new(visited_location: VisitedLocation, attraction: Attraction, reward_points: i32) -> Self {
        Self { visited_location, attraction, reward_points }
    }
}

/// Trip preferences used when asking for price quotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub number_of_adults: u32,
    pub number_of_children: u32,
    pub trip_duration: u32,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self { number_of_adults: 1, number_of_children: 0, trip_duration: 1 }
    }
}

/// One offer returned by the trip pricing provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub provider: String,
    pub price: f64,
    pub trip_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preferences() {
        let prefs = UserPreferences::default();
        assert_eq!(prefs.number_of_adults, 1);
        assert_eq!(prefs.number_of_children, 0);
        assert_eq!(prefs.trip_duration, 1);
    }

    #[test]
    fn test_user_id_display_matches_uuid() {
        let id = UserId::random();
        assert_eq!(id.to_string(), id.0.to_string());
    }

    #[test]
    fn test_reward_serializes_with_attraction_name() {
        let user_id = UserId::random();
        let attraction = Attraction::new("Disneyland", "Anaheim", "CA", 33.817595, -117.922008);
        let visited = VisitedLocation::new(user_id, attraction.location, Utc::now());
        let reward = UserReward::new(visited, attraction, 42);

        let json = serde_json::to_value(&reward).unwrap();
        assert_eq!(json["attraction"]["name"], "Disneyland");
        assert_eq!(json["reward_points"], 42);
    }
}
