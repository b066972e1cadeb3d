//! Infrastructure - configuration, errors, and metrics
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults)
//! - `error` - Error taxonomy returned by the services
//! - `metrics` - Lock-free metrics collection

pub mod config;
pub mod error;
pub mod metrics;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, TourGuideError};
pub use metrics::Metrics;
