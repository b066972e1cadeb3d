//! Background location tracker
//!
//! Runs a tracking cycle over every user, sleeps, and repeats until stopped.
//! The first cycle starts right after `start()`. Shutdown is observed during
//! the sleep and during an in-flight cycle; dropping the cycle future aborts
//! the per-user tasks it spawned.

#[cfg(test)]
mod tests;

use crate::infra::error::{Result, TourGuideError};
use crate::services::tour_guide::{CycleReport, TourGuide};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Stopped,
    Running,
    Stopping,
}

/// Serializable view of the tracker, served on the metrics endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TrackerStatus {
    pub state: TrackerState,
    pub interval_secs: f64,
    pub cycles_completed: u64,
    pub last_cycle: Option<CycleSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub tracked: usize,
    pub failed: usize,
    pub elapsed_ms: u128,
    pub finished_at: DateTime<Utc>,
}

impl From<&CycleReport> for CycleSummary {
    fn from(report: &CycleReport) -> Self {
        Self {
            tracked: report.tracked,
            failed: report.failures.len(),
            elapsed_ms: report.elapsed.as_millis(),
            finished_at: report.finished_at,
        }
    }
}

#[derive(Default)]
struct CycleHistory {
    completed: u64,
    last: Option<Arc<CycleReport>>,
}

struct Lifecycle {
    state: TrackerState,
    shutdown_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

pub struct Tracker {
    guide: Arc<TourGuide>,
    interval: Duration,
    lifecycle: Mutex<Lifecycle>,
    history: Arc<RwLock<CycleHistory>>,
}

impl Tracker {
    pub fn new(guide: Arc<TourGuide>, interval: Duration) -> Self {
        Self {
            guide,
            interval,
            lifecycle: Mutex::new(Lifecycle {
                state: TrackerState::Stopped,
                shutdown_tx: None,
                handle: None,
            }),
            history: Arc::new(RwLock::new(CycleHistory::default())),
        }
    }

    /// Spawn the tracking loop. Must be called inside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != TrackerState::Stopped {
            return Err(TourGuideError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            self.guide.clone(),
            self.interval,
            shutdown_rx,
            self.history.clone(),
        ));

        lifecycle.state = TrackerState::Running;
        lifecycle.shutdown_tx = Some(shutdown_tx);
        lifecycle.handle = Some(handle);
        info!(interval_secs = %self.interval.as_secs_f64(), "tracker_started");
        Ok(())
    }

    /// Signal shutdown and wait for the loop to exit. No-op when stopped.
    pub async fn stop(&self) {
        let (shutdown_tx, handle) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != TrackerState::Running {
                return;
            }
            lifecycle.state = TrackerState::Stopping;
            (lifecycle.shutdown_tx.take(), lifecycle.handle.take())
        };

        if let Some(tx) = shutdown_tx {
            let _ = tx.send(true);
        }
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "tracker_task_join_failed");
            }
        }

        self.lifecycle.lock().state = TrackerState::Stopped;
        info!("tracker_stopped");
    }

    pub fn state(&self) -> TrackerState {
        self.lifecycle.lock().state
    }

    pub fn last_cycle(&self) -> Option<Arc<CycleReport>> {
        self.history.read().last.clone()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.history.read().completed
    }

    pub fn status(&self) -> TrackerStatus {
        let history = self.history.read();
        TrackerStatus {
            state: self.state(),
            interval_secs: self.interval.as_secs_f64(),
            cycles_completed: history.completed,
            last_cycle: history.last.as_deref().map(CycleSummary::from),
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if let Some(tx) = self.lifecycle.get_mut().shutdown_tx.take() {
            let _ = tx.send(true);
        }
    }
}

async fn run_loop(
    guide: Arc<TourGuide>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    history: Arc<RwLock<CycleHistory>>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => break,
            report = guide.track_all_users() => {
                let mut history = history.write();
                history.completed += 1;
                history.last = Some(Arc::new(report));
            }
        }

        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            _ = sleep(interval) => {}
        }
    }
}

/// Resolves once `true` is sent or the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
