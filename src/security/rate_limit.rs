//! Admission gate for outbound requests.
//!
//! A fixed pool of `capacity` permits. Each request takes one before it is
//! sent, and the permit comes back `period` after it was taken, however long
//! the request itself runs. This bounds requests *initiated* per rolling
//! period rather than requests in flight.
//!
//! # Design Decisions
//! - The permit is handed to its release timer right after acquisition, so
//!   no exit path of the request can leak it
//! - Waiters are not bounded; callers queue on the semaphore
//! - Closing the gate fails new waiters and returns every armed permit at once

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// The gate was closed and admits nothing more.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("admission gate is closed")]
pub struct GateClosed;

/// Fixed-capacity permit pool with delayed release.
#[derive(Debug)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
    period: Duration,
    closed: watch::Sender<bool>,
}

impl AdmissionGate {
    pub fn new(capacity: u32, period: Duration) -> Self {
        let capacity = capacity.max(1) as usize;
        let (closed, _) = watch::channel(false);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            period,
            closed,
        }
    }

    /// Wait for a permit and arm its release timer.
    pub async fn admit(&self) -> Result<(), GateClosed> {
        if self.permits.available_permits() == 0 {
            tracing::debug!(capacity = self.capacity, period = ?self.period, "Admission gate full, waiting");
            metrics::record_rate_limit_wait();
        }

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;

        self.arm_release(permit);
        Ok(())
    }

    fn arm_release(&self, permit: OwnedSemaphorePermit) {
        let period = self.period;
        let mut closed = self.closed.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                // Fires on close() and when the gate itself is dropped.
                _ = closed.wait_for(|closed| *closed) => {}
            }
            drop(permit);
        });
    }

    /// Stop admitting and release every pending timer.
    pub fn close(&self) {
        self.permits.close();
        self.closed.send_replace(true);
        tracing::debug!("Admission gate closed");
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
