use super::FlushTarget;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Rate limiter for flushes: leading edge plus at most one trailing edge per
/// window.
///
/// A request with no open window runs the flush immediately and opens a
/// window. Requests arriving while the window is open collapse into a single
/// trailing flush at the window's end, which opens the next window.
#[derive(Clone)]
pub struct ThrottledFlush {
    inner: Arc<ThrottleInner>,
}

struct ThrottleInner {
    window: Duration,
    target: Arc<dyn FlushTarget>,
    state: Mutex<ThrottleState>,
    handle: Handle,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct ThrottleState {
    window_open: bool,
    trailing_pending: bool,
    last_flush: Option<Instant>,
    executions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleSnapshot {
    pub window_open: bool,
    pub trailing_pending: bool,
    pub last_flush: Option<Instant>,
    pub executions: u64,
}

impl ThrottledFlush {
    pub fn new(
        window: Duration,
        target: Arc<dyn FlushTarget>,
        handle: Handle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ThrottleInner {
                window,
                target,
                state: Mutex::new(ThrottleState::default()),
                handle,
                cancel,
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    pub fn request(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }

        let leading = {
            let mut state = self.inner.state.lock();
            if state.window_open {
                state.trailing_pending = true;
                false
            } else {
                state.window_open = true;
                state.last_flush = Some(Instant::now());
                state.executions += 1;
                true
            }
        };

        if leading {
            debug!(window = ?self.inner.window, "Leading-edge flush");
            self.inner.execute();
            self.inner.clone().spawn_window();
        } else {
            debug!("Flush request coalesced into trailing edge");
        }
    }

    pub fn snapshot(&self) -> ThrottleSnapshot {
        let state = self.inner.state.lock();
        ThrottleSnapshot {
            window_open: state.window_open,
            trailing_pending: state.trailing_pending,
            last_flush: state.last_flush,
            executions: state.executions,
        }
    }
}

impl ThrottleInner {
    fn execute(&self) {
        self.handle.spawn(self.target.flush());
    }

    fn spawn_window(self: Arc<Self>) {
        let handle = self.handle.clone();
        handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        let mut state = self.state.lock();
                        state.window_open = false;
                        state.trailing_pending = false;
                        return;
                    }
                    _ = sleep(self.window) => {}
                }

                let trailing = {
                    let mut state = self.state.lock();
                    if state.trailing_pending {
                        state.trailing_pending = false;
                        state.last_flush = Some(Instant::now());
                        state.executions += 1;
                        true
                    } else {
                        state.window_open = false;
                        false
                    }
                };

                if !trailing {
                    break;
                }
                debug!("Trailing-edge flush");
                self.execute();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTarget {
        calls: AtomicUsize,
    }

    impl FlushTarget for CountingTarget {
        fn flush(&self) -> BoxFuture<'static, ()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        }
    }

    fn throttle(window: Duration) -> (ThrottledFlush, Arc<CountingTarget>, CancellationToken) {
        let target = Arc::new(CountingTarget::default());
        let cancel = CancellationToken::new();
        let throttle =
            ThrottledFlush::new(window, target.clone(), Handle::current(), cancel.clone());
        (throttle, target, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_runs_immediately() {
        let (throttle, target, _cancel) = throttle(Duration::from_secs(10));

        throttle.request();
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
        assert!(throttle.snapshot().window_open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_inside_window_collapse_into_one_trailing_flush() {
        let (throttle, target, _cancel) = throttle(Duration::from_secs(10));

        throttle.request();
        for _ in 0..25 {
            throttle.request();
        }
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
        assert!(throttle.snapshot().trailing_pending);

        sleep(Duration::from_secs(11)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);

        // The trailing flush opened a fresh window with nothing pending.
        sleep(Duration::from_secs(11)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);
        assert!(!throttle.snapshot().window_open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_closes_and_next_request_is_leading_again() {
        let (throttle, target, _cancel) = throttle(Duration::from_secs(10));

        throttle.request();
        sleep(Duration::from_secs(11)).await;
        assert!(!throttle.snapshot().window_open);

        throttle.request();
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_throttle_ignores_requests() {
        let (throttle, target, cancel) = throttle(Duration::from_secs(10));

        throttle.request();
        throttle.request();
        cancel.cancel();
        sleep(Duration::from_secs(11)).await;

        throttle.request();
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
    }
}
