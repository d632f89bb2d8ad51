use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The closed set of event kinds the collector understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Exception,
    Log,
    Error,
    Warn,
    SecurityPolicyViolation,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Exception => "exception",
            EventKind::Log => "log",
            EventKind::Error => "error",
            EventKind::Warn => "warn",
            EventKind::SecurityPolicyViolation => "security-policy-violation",
        }
    }

    /// JSON:API resource type used for items of this kind on the wire.
    pub fn resource_type(self) -> String {
        format!("{}-log-items", self.as_str())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message payload of a record. Structured payloads are rendered to text
/// when a batch is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventMessage {
    Text(String),
    Structured(Value),
}

impl EventMessage {
    /// Best-effort text rendering. `None` means the payload could not be
    /// rendered and the wire attribute should be left out.
    pub fn to_text(&self) -> Option<String> {
        match self {
            EventMessage::Text(text) => Some(text.clone()),
            EventMessage::Structured(Value::String(text)) => Some(text.clone()),
            EventMessage::Structured(value) => serde_json::to_string(value).ok(),
        }
    }
}

impl From<String> for EventMessage {
    fn from(text: String) -> Self {
        EventMessage::Text(text)
    }
}

impl From<&str> for EventMessage {
    fn from(text: &str) -> Self {
        EventMessage::Text(text.to_string())
    }
}

impl From<Value> for EventMessage {
    fn from(value: Value) -> Self {
        EventMessage::Structured(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl SourceLocation {
    pub fn new(source: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            source: Some(source.into()),
            line: Some(line),
            column: Some(column),
        }
    }
}

/// One captured occurrence.
///
/// Records are assembled with the `with_*` builder methods and expose only
/// getters afterwards, so a record handed to the queue is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    kind: EventKind,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<EventMessage>,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
    #[serde(default)]
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

impl EventRecord {
    pub fn new(kind: EventKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            message: None,
            timestamp: Utc::now(),
            url: String::new(),
            source_location: None,
            stack_trace: None,
            metadata: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<EventMessage>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Overrides the capture time with the event source's own timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_source_location(mut self, location: SourceLocation) -> Self {
        self.source_location = Some(location);
        self
    }

    pub fn with_stack_trace(mut self, stack: impl Into<String>) -> Self {
        self.stack_trace = Some(stack.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Fills the url only when the capture source left it empty.
    pub(crate) fn with_default_url(mut self, url: &str) -> Self {
        if self.url.is_empty() {
            self.url = url.to_string();
        }
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> Option<&EventMessage> {
        self.message.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source_location(&self) -> Option<&SourceLocation> {
        self.source_location.as_ref()
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }
}
