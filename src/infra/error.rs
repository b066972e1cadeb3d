//! Error taxonomy shared by the services
//!
//! Provider adapters report failures with `anyhow`; they are mapped into
//! `TourGuideError::Upstream` where the services call them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TourGuideError {
    /// Unknown user name
    #[error("user not found: {name}")]
    NotFound { name: String },

    /// Attraction catalog, reward oracle, GPS or pricing provider failed
    #[error("upstream service {service} failed: {message}")]
    Upstream { service: &'static str, message: String },

    #[error("tracker is already running")]
    AlreadyRunning,

    /// A worker pool was closed while work was waiting for a permit
    #[error("worker pool {pool} is closed")]
    PoolClosed { pool: &'static str },
}

impl TourGuideError {
    pub fn not_found(name: &str) -> Self {
        Self::NotFound { name: name.to_string() }
    }

    pub fn upstream(service: &'static str, err: &anyhow::Error) -> Self {
        Self::Upstream { service, message: format!("{err:#}") }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T, E = TourGuideError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_upstream_keeps_context_chain() {
        let err: anyhow::Result<()> =
            Err(anyhow::anyhow!("connection reset")).context("score_points");
        let mapped = TourGuideError::upstream("reward_oracle", &err.unwrap_err());
        assert_eq!(
            mapped.to_string(),
            "upstream service reward_oracle failed: score_points: connection reset"
        );
    }

    #[test]
    fn test_not_found() {
        let err = TourGuideError::not_found("ghost");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "user not found: ghost");
    }
}
