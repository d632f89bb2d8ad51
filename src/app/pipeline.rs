use super::config::PipelineConfig;
use crate::buffer::{BatchBuilder, EnvironmentAttributes, EventQueue, SessionMetadataProvider};
use crate::capture::{
    ConsoleCapture, ConsoleCaptureLayer, CspViolation, EventSink, ExceptionInfo, PanicCapture,
};
use crate::domain::{BeaconError, EventKind, EventMessage, EventRecord};
use crate::reliability::{DeliveryMetrics, DeliveryState, MetricsSnapshot, RetryController};
use crate::scheduler::{FlushScheduler, FlushTarget, SchedulerState};
use crate::sender::{DeliveryClient, DeliveryError, FnDeliveryClient, HttpDeliveryClient, LogDocument};
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Result of one build-and-send pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The queue was empty and nothing was sent.
    Empty,
    /// A batch of this many records was acknowledged.
    Delivered(usize),
    /// Delivery failed and this many records went back to the queue.
    Failed(usize),
}

impl FlushOutcome {
    pub fn is_delivered(self) -> bool {
        matches!(self, FlushOutcome::Delivered(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub metrics: MetricsSnapshot,
    pub queue_len: usize,
    pub delivery_state: DeliveryState,
    pub consecutive_failures: u32,
    pub scheduler: SchedulerState,
}

/// Entry point for captured events.
///
/// Submitting never blocks on the network and never fails. Records are
/// queued, a deferred trigger is armed, and the throttled flush delivers
/// them in batches. A failed batch is put back at the head of the queue and
/// retried after a fixed cooldown.
///
/// Cloning is cheap; all clones share one queue.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    config: PipelineConfig,
    location: String,
    queue: Mutex<EventQueue>,
    builder: BatchBuilder,
    client: Arc<dyn DeliveryClient>,
    scheduler: FlushScheduler,
    retry: Arc<RetryController>,
    metrics: DeliveryMetrics,
    handle: Handle,
    cancel: CancellationToken,
}

/// What the throttle runs. Holds the pipeline weakly so pending timers do
/// not keep a dropped pipeline alive.
struct ScheduledFlush {
    inner: Weak<PipelineInner>,
}

impl FlushTarget for ScheduledFlush {
    fn flush(&self) -> BoxFuture<'static, ()> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(inner) = inner.upgrade() {
                debug!("Running scheduled flush");
                inner.run_flush().await;
            }
        })
    }
}

struct PipelineSink {
    inner: Weak<PipelineInner>,
}

impl EventSink for PipelineSink {
    fn submit(&self, record: EventRecord) {
        if let Some(inner) = self.inner.upgrade() {
            inner.submit(record);
        }
    }
}

pub struct PipelineBuilder {
    config: PipelineConfig,
    session_provider: Option<Arc<dyn SessionMetadataProvider>>,
    client: Option<Arc<dyn DeliveryClient>>,
    handle: Option<Handle>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            session_provider: None,
            client: None,
            handle: None,
        }
    }

    /// Asynchronous source of per-session attributes merged into every
    /// batch's metadata.
    pub fn session_metadata<P>(mut self, provider: P) -> Self
    where
        P: SessionMetadataProvider + 'static,
    {
        self.session_provider = Some(Arc::new(provider));
        self
    }

    /// Replaces the HTTP transport with a caller-supplied function.
    pub fn delivery_fn<F, Fut>(self, deliver: F) -> Self
    where
        F: Fn(LogDocument) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DeliveryError>> + Send + 'static,
    {
        self.delivery_client(Arc::new(FnDeliveryClient::new(deliver)))
    }

    pub fn delivery_client(mut self, client: Arc<dyn DeliveryClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Runtime used for timers. Defaults to the runtime `build` is called on.
    pub fn runtime_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Validates the configuration and starts the pipeline. The endpoint is
    /// only checked when the HTTP transport is the one being used.
    pub fn build(self) -> Result<Pipeline, BeaconError> {
        if self.client.is_some() {
            self.config.validate_settings()?;
        } else {
            self.config.validate()?;
        }

        let handle = match self.handle {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| BeaconError::Runtime(e.to_string()))?,
        };

        let client: Arc<dyn DeliveryClient> = match self.client {
            Some(client) => client,
            None => Arc::new(HttpDeliveryClient::new(self.config.client_config())?),
        };

        let environment =
            EnvironmentAttributes::detect(&self.config.app_name, &self.config.app_code_name);
        let mut builder = BatchBuilder::new(&environment, self.config.delivery.metadata_timeout);
        if let Some(provider) = self.session_provider {
            builder = builder.with_session_provider(provider);
        }

        let location = self.config.location.clone().unwrap_or_else(default_location);
        let retry = Arc::new(RetryController::new(self.config.retry_config()));
        let cancel = CancellationToken::new();
        let config = self.config;

        info!(
            client = client.name(),
            throttle_window = ?config.scheduling.throttle_window,
            report_delay = ?config.scheduling.report_delay,
            cooldown = ?config.scheduling.cooldown,
            "Event pipeline created"
        );

        let inner = Arc::new_cyclic(|weak: &Weak<PipelineInner>| {
            let target: Arc<dyn FlushTarget> = Arc::new(ScheduledFlush {
                inner: weak.clone(),
            });
            let scheduler = FlushScheduler::new(
                config.scheduling.throttle_window,
                config.scheduling.report_delay,
                target,
                handle.clone(),
                cancel.clone(),
            );

            PipelineInner {
                config,
                location,
                queue: Mutex::new(EventQueue::new()),
                builder,
                client,
                scheduler,
                retry,
                metrics: DeliveryMetrics::new(),
                handle,
                cancel,
            }
        });

        Ok(Pipeline { inner })
    }
}

fn default_location() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| url::Url::from_file_path(path).ok())
        .map_or_else(
            || format!("process://{}", env!("CARGO_PKG_NAME")),
            |url| url.to_string(),
        )
}

impl PipelineInner {
    fn submit(&self, record: EventRecord) {
        let record = record.with_default_url(&self.location);
        let kind = record.kind();
        self.queue.lock().append(record);
        self.metrics.record_submitted();
        trace!(kind = %kind, "Record queued");
        self.scheduler.report();
    }

    async fn run_flush(self: Arc<Self>) -> FlushOutcome {
        let Some(batch) = self.builder.snapshot(&self.queue).await else {
            self.metrics.record_flush(true);
            debug!("Flush found an empty queue");
            return FlushOutcome::Empty;
        };
        self.metrics.record_flush(false);
        self.retry.begin_attempt();

        let sent = AssertUnwindSafe(async { self.client.send(&batch).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!(client = self.client.name(), "Delivery client panicked");
                Err(DeliveryError::Rejected("transport panicked".to_string()))
            });

        match sent {
            Ok(receipt) => {
                self.retry.record_success();
                self.metrics.record_delivered(receipt.records);
                info!(
                    batch_id = %receipt.batch_id,
                    records = receipt.records,
                    status = ?receipt.status_code,
                    latency_ms = receipt.latency.as_millis() as u64,
                    client = self.client.name(),
                    "Batch delivered"
                );
                FlushOutcome::Delivered(receipt.records)
            }
            Err(e) => {
                let requeued = self.retry.record_failure(&self.queue, batch, &e);
                self.metrics.record_failed(requeued);
                self.spawn_cooldown();
                FlushOutcome::Failed(requeued)
            }
        }
    }

    fn spawn_cooldown(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let retry = self.retry.clone();
        let cancel = self.cancel.clone();

        self.handle.spawn(async move {
            if !retry.cool_down(&cancel).await {
                return;
            }
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let queue_is_empty = inner.queue.lock().is_empty();
            if inner.retry.finish_cooldown(queue_is_empty) {
                inner.scheduler.request_flush();
            }
        });
    }
}

impl Drop for PipelineInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Pipeline {
    /// Builds a pipeline with the HTTP transport on the current runtime.
    pub fn new(config: PipelineConfig) -> Result<Self, BeaconError> {
        PipelineBuilder::new(config).build()
    }

    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Queues a record and arms a deferred flush. Records without a url get
    /// the pipeline's location.
    pub fn submit(&self, record: EventRecord) {
        self.inner.submit(record);
    }

    /// Runs one build-and-send pass immediately, bypassing the scheduler.
    /// A failure requeues the batch and starts the cooldown like a scheduled
    /// flush would.
    pub async fn flush_now(&self) -> FlushOutcome {
        self.inner.clone().run_flush().await
    }

    /// Stops every pending timer and makes one last delivery attempt.
    /// Records submitted afterwards stay queued until the next `flush_now`.
    pub async fn shutdown(&self) -> FlushOutcome {
        info!(queued = self.queue_len(), "Shutting down event pipeline");
        self.inner.cancel.cancel();
        let outcome = self.flush_now().await;
        info!(outcome = ?outcome, "Event pipeline stopped");
        outcome
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn capture_error(&self, exception: ExceptionInfo, metadata: Option<Map<String, Value>>) {
        self.submit(exception.into_record(metadata));
    }

    pub fn log_information(
        &self,
        name: impl Into<String>,
        message: impl Into<EventMessage>,
        metadata: Option<Map<String, Value>>,
    ) {
        let mut record = EventRecord::new(EventKind::Log, name).with_message(message);
        if let Some(metadata) = metadata {
            record = record.with_metadata(metadata);
        }
        self.submit(record);
    }

    /// Records console-style output. `kind` must be `log`, `warn` or
    /// `error`; returns whether the record was queued.
    pub fn record_console(&self, kind: EventKind, args: &[Value]) -> bool {
        if !matches!(kind, EventKind::Log | EventKind::Warn | EventKind::Error)
            || !self.inner.config.adapter_enabled(kind)
        {
            return false;
        }

        let message = args
            .iter()
            .map(|arg| match arg {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");

        let mut metadata = Map::new();
        metadata.insert("args".into(), Value::Array(args.to_vec()));

        self.submit(
            EventRecord::new(kind, "console")
                .with_message(message)
                .with_metadata(metadata),
        );
        true
    }

    /// Returns whether the violation was queued.
    pub fn report_csp_violation(&self, violation: &CspViolation) -> bool {
        if !self
            .inner
            .config
            .adapter_enabled(EventKind::SecurityPolicyViolation)
        {
            return false;
        }
        self.submit(violation.to_record());
        true
    }

    /// Hooks panics into the pipeline. `None` when exception capture is
    /// switched off.
    pub fn install_panic_capture(&self) -> Option<PanicCapture> {
        if !self.inner.config.adapter_enabled(EventKind::Exception) {
            return None;
        }
        Some(PanicCapture::install(self.sink()))
    }

    /// A `tracing` layer forwarding host log events, plus the handle that
    /// detaches it. `None` when automatic capture is off.
    pub fn console_layer(&self) -> Option<(ConsoleCaptureLayer, ConsoleCapture)> {
        if !self.inner.config.always_on {
            return None;
        }
        Some(ConsoleCaptureLayer::new(
            self.sink(),
            self.inner.config.capture.clone(),
        ))
    }

    fn sink(&self) -> Arc<dyn EventSink> {
        Arc::new(PipelineSink {
            inner: Arc::downgrade(&self.inner),
        })
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn delivery_state(&self) -> DeliveryState {
        self.inner.retry.state()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            metrics: self.inner.metrics.snapshot(),
            queue_len: self.queue_len(),
            delivery_state: self.inner.retry.state(),
            consecutive_failures: self.inner.retry.consecutive_failures(),
            scheduler: self.inner.scheduler.state(),
        }
    }
}

impl EventSink for Pipeline {
    fn submit(&self, record: EventRecord) {
        Pipeline::submit(self, record);
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("client", &self.inner.client.name())
            .field("location", &self.inner.location)
            .field("queue_len", &self.queue_len())
            .field("delivery_state", &self.delivery_state())
            .finish_non_exhaustive()
    }
}
