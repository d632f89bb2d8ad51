use crate::buffer::{Batch, EventQueue};
use crate::sender::DeliveryError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryState {
    Idle,
    Sending,
    Cooling,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Fixed wait after a failed attempt before delivery is re-armed.
    pub cooldown: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(10),
        }
    }
}

/// Failure-recovery half of the pipeline.
///
/// A failed batch goes back to the head of the queue, the controller sits in
/// `Cooling` for the fixed cooldown, and afterwards tells the caller whether
/// another throttled flush is worth requesting.
#[derive(Debug)]
pub struct RetryController {
    config: RetryConfig,
    state: Mutex<DeliveryState>,
    consecutive_failures: AtomicU32,
    total_failures: AtomicU64,
    active_cooldowns: AtomicUsize,
}

impl RetryController {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DeliveryState::Idle),
            consecutive_failures: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
            active_cooldowns: AtomicUsize::new(0),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.config.cooldown
    }

    pub fn state(&self) -> DeliveryState {
        *self.state.lock()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    pub fn begin_attempt(&self) {
        *self.state.lock() = DeliveryState::Sending;
    }

    /// Cooldowns started by `record_failure` that have not ended yet.
    pub fn active_cooldowns(&self) -> usize {
        self.active_cooldowns.load(Ordering::Acquire)
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut state = self.state.lock();
        *state = if self.active_cooldowns() > 0 {
            DeliveryState::Cooling
        } else {
            DeliveryState::Idle
        };
    }

    /// Returns the batch's records to the head of the queue and enters
    /// `Cooling`. Returns the number of records requeued.
    pub fn record_failure(
        &self,
        queue: &Mutex<EventQueue>,
        batch: Batch,
        error: &DeliveryError,
    ) -> usize {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        let batch_id = batch.id().to_string();
        let records = batch.into_records();
        let requeued = records.len();
        queue.lock().requeue_front(records);
        self.active_cooldowns.fetch_add(1, Ordering::AcqRel);
        *self.state.lock() = DeliveryState::Cooling;

        warn!(
            batch_id = %batch_id,
            records = requeued,
            consecutive_failures = failures,
            cooldown = ?self.config.cooldown,
            error = %error,
            "Delivery failed, batch requeued"
        );

        requeued
    }

    /// Waits out the cooldown. Returns `false` if the pipeline was shut down
    /// in the meantime; the cooldown is released without a retry.
    pub async fn cool_down(&self, cancel: &CancellationToken) -> bool {
        let elapsed = tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.cooldown) => true,
        };
        if !elapsed {
            self.release_cooldown();
        }
        elapsed
    }

    /// Ends one cooldown. The controller leaves `Cooling` only when no other
    /// cooldown is still running. Returns whether a flush should be
    /// requested, which is only the case when records are still waiting.
    pub fn finish_cooldown(&self, queue_is_empty: bool) -> bool {
        let remaining = self.release_cooldown();
        if remaining == 0 {
            let mut state = self.state.lock();
            if *state == DeliveryState::Cooling {
                *state = DeliveryState::Idle;
            }
        } else {
            debug!(remaining, "Cooldown elapsed, another one still running");
        }

        if queue_is_empty {
            debug!("Cooldown elapsed with empty queue, nothing to retry");
            false
        } else {
            debug!("Cooldown elapsed, re-arming delivery");
            true
        }
    }
}

impl RetryController {
    fn release_cooldown(&self) -> usize {
        let previous = self
            .active_cooldowns
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or_else(|n| n);
        previous.saturating_sub(1)
    }
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
