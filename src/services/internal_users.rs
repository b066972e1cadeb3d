//! Internal test users seeded at startup

use crate::domain::types::{UserId, VisitedLocation};
use crate::domain::user::User;
use crate::io::gps::random_location;
use crate::services::directory::UserDirectory;
use chrono::{TimeDelta, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::info;

pub const INTERNAL_USER_PHONE: &str = "000";
pub const SEEDED_LOCATIONS_PER_USER: usize = 3;
const MAX_DAYS_IN_PAST: i64 = 30;

pub fn internal_user_name(index: usize) -> String {
    format!("internalUser{index}")
}

/// Create `internalUser0..count` with a short random history.
///
/// Returns how many users were actually added (existing names are kept).
pub fn seed_internal_users(directory: &UserDirectory, count: usize) -> usize {
    let mut added = 0;
    for i in 0..count {
        let name = internal_user_name(i);
        let user = User::new(
            UserId::random(),
            &name,
            INTERNAL_USER_PHONE,
            &format!("{name}@tourGuide.com"),
        );
        seed_location_history(&user);
        if directory.register(Arc::new(user)) {
            added += 1;
        }
    }
    info!(requested = %count, added = %added, "internal_users_seeded");
    added
}

fn seed_location_history(user: &User) {
    for _ in 0..SEEDED_LOCATIONS_PER_USER {
        let days_ago = rand::rng().random_range(0..MAX_DAYS_IN_PAST);
        let time_visited = Utc::now() - TimeDelta::days(days_ago);
        user.add_visited_location(VisitedLocation::new(user.id(), random_location(), time_visited));
    }
}
