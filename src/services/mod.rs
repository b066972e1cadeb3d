//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `tour_guide` - Operations exposed to callers, one tracking cycle
//! - `tracker` - Background tracking loop with start/stop lifecycle
//! - `rewards` - Reward engine (proximity matching, oracle scoring)
//! - `directory` - In-memory user directory
//! - `internal_users` - Seeded test users
//! - `worker_pool` - Bounded concurrency for fan-out work

pub mod directory;
pub mod internal_users;
pub mod rewards;
pub mod tour_guide;
pub mod tracker;
pub mod worker_pool;

// Re-export commonly used types
pub use directory::UserDirectory;
pub use rewards::{BatchReport, RewardEngine, UserFailure};
pub use tour_guide::{CycleReport, NearbyAttraction, NearbyAttractions, TourGuide};
pub use tracker::{Tracker, TrackerState, TrackerStatus};
pub use worker_pool::WorkerPool;
