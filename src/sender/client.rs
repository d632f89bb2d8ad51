use super::serialization::{BatchSerializer, SerializationError};
use crate::buffer::Batch;
use futures::future::BoxFuture;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Request timeout after {0:?}")]
    RequestTimeout(Duration),
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerializationError),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Rejected by transport: {0}")]
    Rejected(String),
}

/// What a successful delivery reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub batch_id: String,
    pub records: usize,
    pub status_code: Option<u16>,
    pub bytes_sent: usize,
    pub latency: Duration,
}

/// Boundary between the pipeline and the wire.
///
/// `Ok` acknowledges the whole batch; any `Err` returns the whole batch to
/// the queue.
pub trait DeliveryClient: Send + Sync {
    fn send<'a>(&'a self, batch: &'a Batch) -> BoxFuture<'a, Result<DeliveryReceipt, DeliveryError>>;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub user_agent: String,
    pub enable_compression: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4200/api/log-items".to_string(),
            timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            user_agent: format!("rask-log-beacon/{}", env!("CARGO_PKG_VERSION")),
            enable_compression: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time: Duration,
}

#[derive(Debug, Default)]
pub struct ClientStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_response_time: AtomicU64,
}

impl ClientStats {
    pub fn record_request(&self, success: bool, response_time: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time
            .fetch_add(response_time.as_millis() as u64, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ConnectionStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_response_time = self.total_response_time.load(Ordering::Relaxed);

        let average_response_time = if total_requests > 0 {
            Duration::from_millis(total_response_time / total_requests)
        } else {
            Duration::ZERO
        };

        ConnectionStats {
            total_requests,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            average_response_time,
        }
    }
}

/// Default transport: one JSON `POST` per batch.
#[derive(Debug, Clone)]
pub struct HttpDeliveryClient {
    client: Client,
    config: ClientConfig,
    endpoint_url: Url,
    serializer: BatchSerializer,
    stats: Arc<ClientStats>,
}

impl HttpDeliveryClient {
    pub fn new(config: ClientConfig) -> Result<Self, DeliveryError> {
        let endpoint_url: Url = config.endpoint.parse().map_err(|e| {
            DeliveryError::InvalidConfiguration(format!("Invalid endpoint URL: {e}"))
        })?;

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DeliveryError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            endpoint_url,
            serializer: BatchSerializer::new(),
            stats: Arc::new(ClientStats::default()),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint_url.as_str()
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        self.stats.snapshot()
    }

    pub fn build_headers(&self, batch: &Batch) -> Result<HeaderMap, DeliveryError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if self.config.enable_compression {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }

        headers.insert(
            HeaderName::from_static("x-batch-id"),
            HeaderValue::from_str(batch.id()).map_err(|e| {
                DeliveryError::InvalidConfiguration(format!("Invalid batch ID header: {e}"))
            })?,
        );
        headers.insert(
            HeaderName::from_static("x-batch-size"),
            HeaderValue::from(batch.size() as u64),
        );

        Ok(headers)
    }

    async fn post_batch(&self, batch: &Batch) -> Result<DeliveryReceipt, DeliveryError> {
        let start = Instant::now();

        let payload = if self.config.enable_compression {
            self.serializer.serialize_compressed(batch)?
        } else {
            self.serializer.serialize_json(batch)?
        };
        let bytes_sent = payload.len();
        let headers = self.build_headers(batch)?;

        debug!(
            batch_id = batch.id(),
            records = batch.size(),
            bytes = bytes_sent,
            "Posting batch"
        );

        let response = self
            .client
            .post(self.endpoint_url.clone())
            .headers(headers)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                self.stats.record_request(false, start.elapsed());
                if e.is_timeout() {
                    DeliveryError::RequestTimeout(self.config.timeout)
                } else {
                    DeliveryError::NetworkError(e)
                }
            })?;

        let latency = start.elapsed();
        let status = response.status();
        self.stats.record_request(status.is_success(), latency);

        if !status.is_success() {
            warn!(batch_id = batch.id(), status = status.as_u16(), "Collector rejected batch");
            return Err(DeliveryError::HttpError {
                status: status.as_u16(),
            });
        }

        Ok(DeliveryReceipt {
            batch_id: batch.id().to_string(),
            records: batch.size(),
            status_code: Some(status.as_u16()),
            bytes_sent,
            latency,
        })
    }
}

impl DeliveryClient for HttpDeliveryClient {
    fn send<'a>(&'a self, batch: &'a Batch) -> BoxFuture<'a, Result<DeliveryReceipt, DeliveryError>> {
        Box::pin(self.post_batch(batch))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
