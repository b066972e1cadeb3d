//! User entity with internally synchronized history and rewards
//!
//! A `User` is shared as `Arc<User>` between the directory, the tracker and
//! request handlers. Every mutator takes `&self`; callers never lock.

use crate::domain::types::{PriceQuote, UserId, UserPreferences, UserReward, VisitedLocation};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;

pub struct User {
    id: UserId,
    name: String,
    phone_number: RwLock<String>,
    email_address: RwLock<String>,
    /// Append-only, chronological
    visited_locations: RwLock<Vec<VisitedLocation>>,
    /// At most one entry per attraction name
    rewards: Mutex<Vec<UserReward>>,
    preferences: UserPreferences,
    trip_deals: RwLock<Vec<PriceQuote>>,
}

impl User {
    pub fn new(id: UserId, name: &str, phone_number: &str, email_address: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            phone_number: RwLock::new(phone_number.to_string()),
            email_address: RwLock::new(email_address.to_string()),
            visited_locations: RwLock::new(Vec::new()),
            rewards: Mutex::new(Vec::new()),
            preferences: UserPreferences::default(),
            trip_deals: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone_number(&self) -> String {
        self.phone_number.read().clone()
    }

    pub fn set_phone_number(&self, phone_number: &str) {
        *self.phone_number.write() = phone_number.to_string();
    }

    pub fn email_address(&self) -> String {
        self.email_address.read().clone()
    }

    pub fn set_email_address(&self, email_address: &str) {
        *self.email_address.write() = email_address.to_string();
    }

    pub fn preferences(&self) -> UserPreferences {
        self.preferences
    }

    // Location history

    pub fn add_visited_location(&self, visited: VisitedLocation) {
        self.visited_locations.write().push(visited);
    }

    /// Snapshot of the history in the order it was appended
    pub fn visited_locations(&self) -> Vec<VisitedLocation> {
        self.visited_locations.read().clone()
    }

    pub fn visited_location_count(&self) -> usize {
        self.visited_locations.read().len()
    }

    pub fn last_visited_location(&self) -> Option<VisitedLocation> {
        self.visited_locations.read().last().cloned()
    }

    pub fn latest_location_timestamp(&self) -> Option<DateTime<Utc>> {
        self.visited_locations.read().last().map(|v| v.time_visited)
    }

    pub fn clear_visited_locations(&self) {
        self.visited_locations.write().clear();
    }

    // Rewards

    /// Insert a reward unless this user already holds one for the same attraction.
    ///
    /// The check and the push happen under one lock, so concurrent reward
    /// computations for the same user cannot both insert. Returns whether the
    /// reward was added.
    pub fn add_reward(&self, reward: UserReward) -> bool {
        let mut rewards = self.rewards.lock();
        if rewards.iter().any(|r| r.attraction.name == reward.attraction.name) {
            return false;
        }
        rewards.push(reward);
        true
    }

    pub fn rewards(&self) -> Vec<UserReward> {
        self.rewards.lock().clone()
    }

    pub fn reward_count(&self) -> usize {
        self.rewards.lock().len()
    }

    pub fn rewarded_attraction_names(&self) -> FxHashSet<String> {
        self.rewards.lock().iter().map(|r| r.attraction.name.clone()).collect()
    }

    pub fn cumulative_reward_points(&self) -> i64 {
        self.rewards.lock().iter().map(|r| i64::from(r.reward_points)).sum()
    }

    // Trip deals

    pub fn trip_deals(&self) -> Vec<PriceQuote> {
        self.trip_deals.read().clone()
    }

    /// Replace the previous quotes wholesale
    pub fn set_trip_deals(&self, deals: Vec<PriceQuote>) {
        *self.trip_deals.write() = deals;
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("visited_locations", &self.visited_location_count())
            .field("rewards", &self.reward_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Attraction, Location};
    use std::sync::Arc;
    use std::thread;

    fn create_test_user() -> User {
        User::new(UserId::random(), "jon", "000", "jon@tourGuide.com")
    }

    fn reward_for(user: &User, attraction: &Attraction, points: i32) -> UserReward {
        let visited = VisitedLocation::new(user.id(), attraction.location, Utc::now());
        UserReward::new(visited, attraction.clone(), points)
    }

    #[test]
    fn test_new_user_defaults() {
        let user = create_test_user();
        assert_eq!(user.name(), "jon");
        assert_eq!(user.phone_number(), "000");
        assert_eq!(user.email_address(), "jon@tourGuide.com");
        assert!(user.visited_locations().is_empty());
        assert!(user.last_visited_location().is_none());
        assert!(user.rewards().is_empty());
        assert_eq!(user.preferences(), UserPreferences::default());
    }

    #[test]
    fn test_contact_setters() {
        let user = create_test_user();
        user.set_phone_number("555-0100");
        user.set_email_address("jon@example.com");
        assert_eq!(user.phone_number(), "555-0100");
        assert_eq!(user.email_address(), "jon@example.com");
    }

    #[test]
    fn test_visited_locations_keep_order() {
        let user = create_test_user();
        for i in 0..3 {
            let loc = Location::new(f64::from(i), f64::from(i));
            user.add_visited_location(VisitedLocation::new(user.id(), loc, Utc::now()));
        }

        let history = user.visited_locations();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].location.latitude, 0.0);
        assert_eq!(history[2].location.latitude, 2.0);
        assert_eq!(user.last_visited_location().unwrap().location.latitude, 2.0);
        assert_eq!(user.latest_location_timestamp(), Some(history[2].time_visited));

        user.clear_visited_locations();
        assert_eq!(user.visited_location_count(), 0);
    }

    #[test]
    fn test_add_reward_rejects_same_attraction() {
        let user = create_test_user();
        let attraction = Attraction::new("Disneyland", "Anaheim", "CA", 33.817595, -117.922008);

        assert!(user.add_reward(reward_for(&user, &attraction, 100)));
        assert!(!user.add_reward(reward_for(&user, &attraction, 200)));

        let rewards = user.rewards();
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].reward_points, 100);
        assert_eq!(user.cumulative_reward_points(), 100);
    }

    #[test]
    fn test_concurrent_add_reward_keeps_names_unique() {
        let user = Arc::new(create_test_user());
        let attractions: Vec<Attraction> = (0..5)
            .map(|i| Attraction::new(&format!("Attraction {i}"), "City", "ST", 10.0, 10.0))
            .collect();

        let mut handles = vec![];
        for _ in 0..8 {
            let user = user.clone();
            let attractions = attractions.clone();
            handles.push(thread::spawn(move || {
                for attraction in &attractions {
                    user.add_reward(reward_for(&user, attraction, 10));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(user.reward_count(), 5);
        assert_eq!(user.rewarded_attraction_names().len(), 5);
    }

    #[test]
    fn test_trip_deals_replaced_wholesale() {
        let user = create_test_user();
        let quote = |name: &str| PriceQuote {
            provider: name.to_string(),
            price: 10.0,
            trip_id: uuid::Uuid::new_v4(),
        };

        user.set_trip_deals(vec![quote("a"), quote("b")]);
        assert_eq!(user.trip_deals().len(), 2);

        user.set_trip_deals(vec![quote("c")]);
        let deals = user.trip_deals();
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].provider, "c");
    }
}
