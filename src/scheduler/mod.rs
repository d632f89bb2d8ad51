//! Flush scheduling: a deferred trigger per submission feeding a throttled
//! flush. Both stages are kept on purpose. The trigger absorbs bursts of
//! near-simultaneous submissions and the throttle bounds how often the
//! collector is contacted.

pub mod deferred;
pub mod throttle;

pub use deferred::DeferredTrigger;
pub use throttle::{ThrottleSnapshot, ThrottledFlush};

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Whatever a scheduled flush should run.
pub trait FlushTarget: Send + Sync + 'static {
    fn flush(&self) -> BoxFuture<'static, ()>;
}

/// Scheduler state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerState {
    pub last_flush: Option<Instant>,
    pub trailing_pending: bool,
    pub window_open: bool,
    pub outstanding_triggers: usize,
    pub scheduled_flushes: u64,
}

#[derive(Clone)]
pub struct FlushScheduler {
    throttle: ThrottledFlush,
    deferred: DeferredTrigger,
}

impl FlushScheduler {
    pub fn new(
        throttle_window: Duration,
        report_delay: Duration,
        target: Arc<dyn FlushTarget>,
        handle: Handle,
        cancel: CancellationToken,
    ) -> Self {
        let throttle = ThrottledFlush::new(throttle_window, target, handle.clone(), cancel.clone());
        let deferred = DeferredTrigger::new(report_delay, throttle.clone(), handle, cancel);
        Self { throttle, deferred }
    }

    /// Called once per submission.
    pub fn report(&self) {
        self.deferred.arm();
    }

    /// Throttled entry point, also used to re-arm delivery after a cooldown.
    pub fn request_flush(&self) {
        self.throttle.request();
    }

    pub fn state(&self) -> SchedulerState {
        let throttle = self.throttle.snapshot();
        SchedulerState {
            last_flush: throttle.last_flush,
            trailing_pending: throttle.trailing_pending,
            window_open: throttle.window_open,
            outstanding_triggers: self.deferred.outstanding(),
            scheduled_flushes: throttle.executions,
        }
    }
}
