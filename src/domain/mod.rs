//! Domain models - core business types
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - value types (Location, VisitedLocation, Attraction, UserReward, ...)
//! - `user` - the `User` entity with internally synchronized state
//! - `geo` - great-circle distance

pub mod geo;
pub mod types;
pub mod user;

// Re-export commonly used types at module level
pub use types::{
    Attraction, AttractionId, Location, PriceQuote, UserId, UserPreferences, UserReward,
    VisitedLocation,
};
pub use user::User;
