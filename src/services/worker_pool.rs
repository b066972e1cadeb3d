//! Bounded worker pool
//!
//! A named semaphore that caps how many futures run at once. Callers spawn
//! their own tasks (usually into a `JoinSet`) and wrap the work in `run`, so
//! at most `capacity` of them make progress while the rest wait for a permit.

use crate::infra::error::{Result, TourGuideError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct WorkerPool {
    name: &'static str,
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { name, semaphore: Arc::new(Semaphore::new(capacity)), capacity }
    }

    /// Run `fut` once a permit is available; the permit is held until it completes
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| TourGuideError::PoolClosed { pool: self.name })?;
        Ok(fut.await)
    }

    /// Reject every waiting and future `run`
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("available", &self.available_permits())
            .finish()
    }
}
