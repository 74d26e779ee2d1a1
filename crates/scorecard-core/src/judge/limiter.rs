//! Process-wide ceiling on in-flight judge calls.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::{JudgeError, JudgeResult};

/// Cloneable handle over one shared semaphore.
///
/// Every coordinator built from clones of the same limiter shares the ceiling,
/// so concurrent submissions cannot exceed the provider's rate budget together.
#[derive(Debug, Clone)]
pub struct JudgeLimiter {
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
}

impl JudgeLimiter {
    /// A ceiling of zero is treated as one.
    pub fn new(max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a slot. Hold the permit only for the duration of one call.
    pub async fn acquire(&self) -> JudgeResult<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| JudgeError::configuration("judge limiter closed"))
    }
}

impl Default for JudgeLimiter {
    fn default() -> Self {
        Self::new(4)
    }
}
