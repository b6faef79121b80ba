//! Bounded-concurrency admission gate.
//!
//! # Responsibilities
//! - Cap the number of requests in flight downstream
//! - Hand out slots that release themselves when dropped
//!
//! # Design Decisions
//! - Backed by a Tokio semaphore (FIFO wake-up order)
//! - Waiting is cancellation-safe: dropping the wait holds no slot
//! - Slot release is tied to `Drop`, so it happens exactly once on every
//!   exit path, including panics and cancelled futures

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// Behaviour when every slot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePolicy {
    /// Wait for a slot to free up.
    #[default]
    Block,
    /// Fail immediately.
    Reject,
}

/// Error type for slot acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("all {0} slots are in use")]
    Saturated(usize),
}

/// A counting gate with fixed capacity.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    permits: Arc<Semaphore>,
    capacity: usize,
    policy: GatePolicy,
}

impl ConcurrencyGate {
    /// Capacity is clamped to `1..=Semaphore::MAX_PERMITS`.
    pub fn new(capacity: usize, policy: GatePolicy) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            policy,
        }
    }

    /// Acquire a slot according to the configured policy.
    pub async fn acquire(&self) -> Result<GateSlot, GateError> {
        // The semaphore is never closed, so the only failure left is a
        // saturated gate under the reject policy.
        let permit = match self.policy {
            GatePolicy::Block => Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| GateError::Saturated(self.capacity))?,
            GatePolicy::Reject => Arc::clone(&self.permits)
                .try_acquire_owned()
                .map_err(|_| GateError::Saturated(self.capacity))?,
        };

        metrics::record_in_flight(self.in_flight());
        Ok(GateSlot {
            permits: Arc::clone(&self.permits),
            capacity: self.capacity,
            permit: Some(permit),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

/// A held slot. Dropping it returns the slot to the gate.
#[derive(Debug)]
pub struct GateSlot {
    permits: Arc<Semaphore>,
    capacity: usize,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for GateSlot {
    fn drop(&mut self) {
        drop(self.permit.take());
        metrics::record_in_flight(self.capacity - self.permits.available_permits());
    }
}
