use super::queue::EventQueue;
use crate::domain::EventRecord;
use crate::sender::serialization::{LogDocument, MetadataResource};
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

/// Supplies per-session attributes merged into every batch's metadata.
///
/// Any closure `Fn() -> impl Future<Output = anyhow::Result<Option<Map>>>`
/// implements this trait.
pub trait SessionMetadataProvider: Send + Sync {
    fn session_metadata(&self) -> BoxFuture<'_, anyhow::Result<Option<Map<String, Value>>>>;
}

impl<F, Fut> SessionMetadataProvider for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<Map<String, Value>>>> + Send + 'static,
{
    fn session_metadata(&self) -> BoxFuture<'_, anyhow::Result<Option<Map<String, Value>>>> {
        Box::pin(self())
    }
}

/// Static host attributes sent with every batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentAttributes {
    pub app_name: String,
    pub app_code_name: String,
    pub app_version: String,
    pub platform: String,
    pub hostname: Option<String>,
}

impl EnvironmentAttributes {
    pub fn detect(app_name: impl Into<String>, app_code_name: impl Into<String>) -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok());

        Self {
            app_name: app_name.into(),
            app_code_name: app_code_name.into(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            hostname,
        }
    }

    pub fn to_attributes(&self) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("appName".into(), Value::String(self.app_name.clone()));
        attributes.insert("appCodeName".into(), Value::String(self.app_code_name.clone()));
        attributes.insert("appVersion".into(), Value::String(self.app_version.clone()));
        attributes.insert("platform".into(), Value::String(self.platform.clone()));
        if let Some(hostname) = &self.hostname {
            attributes.insert("hostname".into(), Value::String(hostname.clone()));
        }
        attributes
    }
}

/// Immutable snapshot of drained records plus the document built for them.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    records: Vec<EventRecord>,
    document: LogDocument,
    created_at: Instant,
}

impl Batch {
    pub fn new(records: Vec<EventRecord>, metadata: MetadataResource) -> Self {
        let document = LogDocument::new(metadata, &records);

        Self {
            id: Uuid::new_v4().to_string(),
            records,
            document,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Gives the records back for requeueing after a failed attempt.
    pub fn into_records(self) -> Vec<EventRecord> {
        self.records
    }

    pub fn document(&self) -> &LogDocument {
        &self.document
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

#[derive(Clone)]
pub struct BatchBuilder {
    environment: Map<String, Value>,
    session_provider: Option<Arc<dyn SessionMetadataProvider>>,
    metadata_timeout: Duration,
}

impl BatchBuilder {
    pub fn new(environment: &EnvironmentAttributes, metadata_timeout: Duration) -> Self {
        Self {
            environment: environment.to_attributes(),
            session_provider: None,
            metadata_timeout,
        }
    }

    pub fn with_session_provider(mut self, provider: Arc<dyn SessionMetadataProvider>) -> Self {
        self.session_provider = Some(provider);
        self
    }

    /// Drains the queue into a batch. Returns `None` when there was nothing
    /// to send.
    ///
    /// The drain completes before the first await, so records appended while
    /// session metadata is being fetched belong to the next flush.
    pub async fn snapshot(&self, queue: &Mutex<EventQueue>) -> Option<Batch> {
        let records = queue.lock().drain_all();
        if records.is_empty() {
            return None;
        }

        let metadata = self.build_metadata().await;
        Some(Batch::new(records, metadata))
    }

    async fn build_metadata(&self) -> MetadataResource {
        let mut attributes = self.environment.clone();

        let Some(provider) = &self.session_provider else {
            return MetadataResource::new(attributes);
        };

        // A panicking provider must not take the drained records down with it.
        let fetch = AssertUnwindSafe(async { provider.session_metadata().await }).catch_unwind();

        match timeout(self.metadata_timeout, fetch).await {
            Ok(Ok(Ok(Some(session)))) => attributes.extend(session),
            Ok(Ok(Ok(None))) => debug!("Session metadata provider returned nothing"),
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "Session metadata provider failed, sending static attributes only");
            }
            Ok(Err(_)) => {
                warn!("Session metadata provider panicked, sending static attributes only");
            }
            Err(_) => {
                warn!(
                    timeout = ?self.metadata_timeout,
                    "Session metadata provider timed out, sending static attributes only"
                );
            }
        }

        MetadataResource::new(attributes)
    }
}

impl std::fmt::Debug for BatchBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchBuilder")
            .field("environment", &self.environment)
            .field("has_session_provider", &self.session_provider.is_some())
            .field("metadata_timeout", &self.metadata_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventKind;
    use serde_json::json;

    fn environment() -> EnvironmentAttributes {
        EnvironmentAttributes {
            app_name: "demo".into(),
            app_code_name: "rask".into(),
            app_version: "0.1.0".into(),
            platform: "linux-x86_64".into(),
            hostname: None,
        }
    }

    fn queue_with(names: &[&str]) -> Mutex<EventQueue> {
        let mut queue = EventQueue::new();
        for name in names {
            queue.append(EventRecord::new(EventKind::Log, *name));
        }
        Mutex::new(queue)
    }

    #[tokio::test]
    async fn test_snapshot_of_empty_queue_is_none() {
        let builder = BatchBuilder::new(&environment(), Duration::from_secs(1));
        let queue = Mutex::new(EventQueue::new());
        assert!(builder.snapshot(&queue).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_drains_queue_and_merges_session_metadata() {
        let builder = BatchBuilder::new(&environment(), Duration::from_secs(1))
            .with_session_provider(Arc::new(|| async {
                let mut session = Map::new();
                session.insert("userId".into(), json!("u-1"));
                Ok::<_, anyhow::Error>(Some(session))
            }));
        let queue = queue_with(&["a", "b"]);

        let batch = builder.snapshot(&queue).await.unwrap();
        assert_eq!(batch.size(), 2);
        assert!(queue.lock().is_empty());

        let attributes = &batch.document().metadata().unwrap().attributes;
        assert_eq!(attributes["appName"], "demo");
        assert_eq!(attributes["platform"], "linux-x86_64");
        assert_eq!(attributes["userId"], "u-1");
    }

    #[tokio::test]
    async fn test_failing_provider_falls_back_to_static_attributes() {
        let builder = BatchBuilder::new(&environment(), Duration::from_secs(1))
            .with_session_provider(Arc::new(|| async {
                Err::<Option<Map<String, Value>>, _>(anyhow::anyhow!("session store unavailable"))
            }));
        let queue = queue_with(&["a"]);

        let batch = builder.snapshot(&queue).await.unwrap();
        let attributes = &batch.document().metadata().unwrap().attributes;
        assert_eq!(attributes, &environment().to_attributes());
    }

    async fn exploding_session() -> anyhow::Result<Option<Map<String, Value>>> {
        panic!("session store corrupted")
    }

    #[tokio::test]
    async fn test_panicking_provider_falls_back_to_static_attributes() {
        let builder = BatchBuilder::new(&environment(), Duration::from_secs(1))
            .with_session_provider(Arc::new(exploding_session));
        let queue = queue_with(&["a", "b"]);

        let batch = builder.snapshot(&queue).await.unwrap();
        assert_eq!(batch.size(), 2);
        assert_eq!(
            batch.document().metadata().unwrap().attributes,
            environment().to_attributes()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_does_not_block_delivery() {
        let builder = BatchBuilder::new(&environment(), Duration::from_millis(50))
            .with_session_provider(Arc::new(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, anyhow::Error>(Some(Map::new()))
            }));
        let queue = queue_with(&["a"]);

        let batch = builder.snapshot(&queue).await.unwrap();
        assert_eq!(batch.size(), 1);
        assert_eq!(
            batch.document().metadata().unwrap().attributes,
            environment().to_attributes()
        );
    }
}
