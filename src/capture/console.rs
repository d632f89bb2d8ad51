use super::EventSink;
use crate::app::config::CaptureConfig;
use crate::domain::{EventKind, EventRecord, SourceLocation};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Events from these crates are never captured. The beacon logs through
/// `tracing` itself and the transport stack logs while delivering, so
/// capturing either would feed deliveries back into the queue.
const IGNORED_CRATES: &[&str] = &[
    env!("CARGO_CRATE_NAME"),
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
];

fn is_ignored_target(target: &str) -> bool {
    let krate = target.split("::").next().unwrap_or(target);
    IGNORED_CRATES.contains(&krate)
}

/// `tracing` layer that turns host-application log events into records.
///
/// `ERROR` becomes `error`, `WARN` becomes `warn` and `INFO` becomes `log`.
/// `DEBUG` and `TRACE` are never captured.
pub struct ConsoleCaptureLayer {
    sink: Arc<dyn EventSink>,
    capture: CaptureConfig,
    attached: Arc<AtomicBool>,
}

/// Detaches the matching [`ConsoleCaptureLayer`] when dropped. The layer
/// stays in the subscriber stack but forwards nothing afterwards.
#[derive(Debug)]
pub struct ConsoleCapture {
    attached: Arc<AtomicBool>,
}

impl ConsoleCapture {
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub fn detach(self) {}
}

impl Drop for ConsoleCapture {
    fn drop(&mut self) {
        self.attached.store(false, Ordering::Release);
    }
}

impl ConsoleCaptureLayer {
    pub fn new(sink: Arc<dyn EventSink>, capture: CaptureConfig) -> (Self, ConsoleCapture) {
        let attached = Arc::new(AtomicBool::new(true));
        let layer = Self {
            sink,
            capture,
            attached: attached.clone(),
        };
        (layer, ConsoleCapture { attached })
    }

    fn kind_for(&self, level: &Level) -> Option<EventKind> {
        let kind = match *level {
            Level::ERROR => EventKind::Error,
            Level::WARN => EventKind::Warn,
            Level::INFO => EventKind::Log,
            _ => return None,
        };
        self.capture.allows(kind).then_some(kind)
    }
}

impl<S: Subscriber> Layer<S> for ConsoleCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !self.attached.load(Ordering::Acquire) {
            return;
        }

        let meta = event.metadata();
        if is_ignored_target(meta.target()) {
            return;
        }
        let Some(kind) = self.kind_for(meta.level()) else {
            return;
        };

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let mut record = EventRecord::new(kind, "console")
            .with_message(fields.joined())
            .with_metadata(fields.into_metadata(meta.target()));

        if meta.file().is_some() || meta.line().is_some() {
            record = record.with_source_location(SourceLocation {
                source: meta.file().map(str::to_string),
                line: meta.line(),
                column: None,
            });
        }

        self.sink.submit(record);
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    rendered: Vec<String>,
    args: Vec<Value>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, rendered: String, raw: Value) {
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.rendered.push(format!("{}={}", field.name(), rendered));
        }
        self.args.push(raw);
    }

    /// The message followed by the remaining fields as `name=value`.
    fn joined(&self) -> String {
        self.message
            .iter()
            .cloned()
            .chain(self.rendered.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn into_metadata(self, target: &str) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("args".into(), Value::Array(self.args));
        metadata.insert("target".into(), Value::from(target));
        metadata
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let raw = Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.push(field, value.to_string(), raw);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        self.push(field, rendered.clone(), Value::from(rendered));
    }
}
