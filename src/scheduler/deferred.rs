use super::throttle::ThrottledFlush;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Short fixed delay between a submission and its flush request.
///
/// Every submission arms its own timer. The timers all feed the same
/// [`ThrottledFlush`], so a burst of submissions ends up as one or two
/// deliveries.
#[derive(Clone)]
pub struct DeferredTrigger {
    delay: Duration,
    outstanding: Arc<AtomicUsize>,
    throttle: ThrottledFlush,
    handle: Handle,
    cancel: CancellationToken,
}

impl DeferredTrigger {
    pub fn new(
        delay: Duration,
        throttle: ThrottledFlush,
        handle: Handle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            delay,
            outstanding: Arc::new(AtomicUsize::new(0)),
            throttle,
            handle,
            cancel,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn arm(&self) {
        if self.cancel.is_cancelled() {
            return;
        }

        self.outstanding.fetch_add(1, Ordering::AcqRel);
        let outstanding = self.outstanding.clone();
        let throttle = self.throttle.clone();
        let cancel = self.cancel.clone();
        let delay = self.delay;

        self.handle.spawn(async move {
            let fired = tokio::select! {
                _ = cancel.cancelled() => false,
                _ = sleep(delay) => true,
            };
            outstanding.fetch_sub(1, Ordering::AcqRel);
            if fired {
                throttle.request();
            }
        });
    }

    /// Timers armed but not yet fired.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}
