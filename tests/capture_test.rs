use parking_lot::Mutex;
use rask_log_beacon::capture::{CspReport, ExceptionInfo};
use rask_log_beacon::sender::{DeliveryError, LogDocument};
use rask_log_beacon::{EventKind, FlushOutcome, Pipeline, PipelineConfig};
use serde_json::{Map, Value};
use serial_test::serial;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;

fn pipeline(config: PipelineConfig) -> (Pipeline, Arc<Mutex<Vec<LogDocument>>>) {
    let documents = Arc::new(Mutex::new(Vec::new()));
    let sink = documents.clone();
    let pipeline = Pipeline::builder(config)
        .delivery_fn(move |doc| {
            sink.lock().push(doc);
            async { Ok::<_, DeliveryError>(()) }
        })
        .build()
        .unwrap();
    (pipeline, documents)
}

#[tokio::test]
async fn test_captured_error_is_delivered_with_stack() {
    let (pipeline, documents) = pipeline(PipelineConfig::default());

    let mut metadata = Map::new();
    metadata.insert("route".into(), Value::from("/cart"));
    pipeline.capture_error(ExceptionInfo::new("TypeError", "x is undefined"), Some(metadata));

    assert_eq!(pipeline.flush_now().await, FlushOutcome::Delivered(1));

    let documents = documents.lock();
    let item = &documents[0].data[0].attributes;
    assert_eq!(item.event_kind, EventKind::Exception);
    assert_eq!(item.name, "TypeError");
    assert_eq!(item.message.as_deref(), Some("x is undefined"));
    assert!(item.stack.as_deref().is_some_and(|s| !s.is_empty()));
    assert_eq!(item.event_meta.as_ref().unwrap()["route"], "/cart");
}

#[tokio::test]
async fn test_error_values_become_exceptions() {
    let (pipeline, documents) = pipeline(PipelineConfig::default());

    let error = serde_json::from_str::<Value>("{not json").unwrap_err();
    pipeline.capture_error(ExceptionInfo::from_error(&error), None);
    pipeline.flush_now().await;

    let documents = documents.lock();
    let item = &documents[0].data[0].attributes;
    assert_eq!(item.name, "Error");
    assert!(item.message.as_deref().unwrap().contains("line 1"));
}

#[tokio::test]
#[serial(panic_hook)]
async fn test_panic_capture_records_and_restores() {
    let (pipeline, documents) = pipeline(PipelineConfig::default());

    let guard = pipeline.install_panic_capture().unwrap();
    let result = std::thread::spawn(|| panic!("worker crashed")).join();
    assert!(result.is_err());
    drop(guard);

    let _ = std::thread::spawn(|| panic!("not captured")).join();

    assert_eq!(pipeline.queue_len(), 1);
    pipeline.flush_now().await;
    let documents = documents.lock();
    let item = &documents[0].data[0].attributes;
    assert_eq!(item.event_kind, EventKind::Exception);
    assert_eq!(item.name, "panic");
    assert_eq!(item.message.as_deref(), Some("worker crashed"));
    assert!(item.source.as_deref().unwrap().ends_with("capture_test.rs"));
    assert!(item.lineno.is_some());
}

#[tokio::test]
#[serial(panic_hook)]
async fn test_panic_capture_respects_exception_flag() {
    let mut config = PipelineConfig::default();
    config.capture.exceptions = false;
    let (pipeline, _documents) = pipeline(config);

    assert!(pipeline.install_panic_capture().is_none());
}

#[tokio::test]
async fn test_console_layer_forwards_host_events() {
    let mut config = PipelineConfig::default();
    config.capture.warnings = false;
    let (pipeline, documents) = pipeline(config);

    let (layer, handle) = pipeline.console_layer().unwrap();
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(order_id = 17, "payment declined");
        tracing::warn!("retrying payment");
        tracing::info!("order shipped");
        drop(handle);
        tracing::error!("after detach");
    });

    assert_eq!(pipeline.queue_len(), 2);
    pipeline.flush_now().await;

    let documents = documents.lock();
    let items: Vec<_> = documents[0]
        .data
        .iter()
        .map(|item| {
            (
                item.attributes.event_kind,
                item.attributes.message.clone().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        items,
        vec![
            (EventKind::Error, "payment declined order_id=17".to_string()),
            (EventKind::Log, "order shipped".to_string()),
        ]
    );
    let meta = documents[0].data[0].attributes.event_meta.as_ref().unwrap();
    assert_eq!(meta["target"], "capture_test");
}

#[tokio::test]
async fn test_csp_report_is_recorded() {
    let (pipeline, documents) = pipeline(PipelineConfig::default());

    let report: CspReport = serde_json::from_str(
        r#"{"csp-report": {
            "document-uri": "https://app.example/checkout",
            "blocked-uri": "inline",
            "violated-directive": "script-src",
            "effective-directive": "script-src",
            "original-policy": "script-src 'self'",
            "source-file": "https://app.example/checkout",
            "line-number": 3,
            "column-number": 12,
            "status-code": 200
        }}"#,
    )
    .unwrap();

    assert!(pipeline.report_csp_violation(&report.report));
    pipeline.flush_now().await;

    let documents = documents.lock();
    let item = &documents[0].data[0];
    assert_eq!(item.resource_type, "security-policy-violation-log-items");
    assert_eq!(item.attributes.url, "https://app.example/checkout");
    assert_eq!(item.attributes.lineno, Some(3));
    assert_eq!(item.attributes.colno, Some(12));
    let message = item.attributes.message.as_deref().unwrap();
    assert!(message.contains("blockedURI inline"));
    assert!(message.contains("\nviolatedDirective script-src\n"));
}

#[tokio::test]
async fn test_csp_capture_can_be_disabled() {
    let mut config = PipelineConfig::default();
    config.capture.csp_violations = false;
    let (pipeline, _documents) = pipeline(config);

    let report: CspReport = serde_json::from_str(r#"{"csp-report": {}}"#).unwrap();
    assert!(!pipeline.report_csp_violation(&report.report));
    assert_eq!(pipeline.queue_len(), 0);
}
