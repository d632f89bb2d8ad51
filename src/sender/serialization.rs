use crate::buffer::Batch;
use crate::domain::{EventKind, EventRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use thiserror::Error;

pub const METADATA_RESOURCE_TYPE: &str = "log-items-metadata";

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error during serialization: {0}")]
    IoError(#[from] std::io::Error),
}

/// One flush worth of data in the collector's JSON:API shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDocument {
    pub included: Vec<MetadataResource>,
    pub data: Vec<LogItemResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: Map<String, Value>,
}

impl MetadataResource {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self {
            resource_type: METADATA_RESOURCE_TYPE.to_string(),
            attributes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogItemResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: LogItemAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogItemAttributes {
    pub event_kind: EventKind,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_meta: Option<Map<String, Value>>,
}

impl LogItemResource {
    pub fn from_record(record: &EventRecord) -> Self {
        let message = record.message().and_then(|message| {
            let text = message.to_text();
            if text.is_none() {
                tracing::debug!(name = record.name(), "Dropping unrenderable message payload");
            }
            text
        });
        let location = record.source_location();

        Self {
            resource_type: record.kind().resource_type(),
            attributes: LogItemAttributes {
                event_kind: record.kind(),
                name: record.name().to_string(),
                timestamp: record.timestamp(),
                message,
                url: record.url().to_string(),
                lineno: location.and_then(|l| l.line),
                colno: location.and_then(|l| l.column),
                source: location.and_then(|l| l.source.clone()),
                stack: record.stack_trace().map(str::to_string),
                event_meta: record.metadata().cloned(),
            },
        }
    }
}

impl LogDocument {
    pub fn new(metadata: MetadataResource, records: &[EventRecord]) -> Self {
        Self {
            included: vec![metadata],
            data: records.iter().map(LogItemResource::from_record).collect(),
        }
    }

    pub fn metadata(&self) -> Option<&MetadataResource> {
        self.included.first()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct BatchSerializer;

impl BatchSerializer {
    pub fn new() -> Self {
        Self
    }

    pub fn serialize_json(&self, batch: &Batch) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(batch.document()).map_err(SerializationError::JsonError)
    }

    pub fn serialize_compressed(&self, batch: &Batch) -> Result<Vec<u8>, SerializationError> {
        use flate2::{Compression, write::GzEncoder};

        let data = self.serialize_json(batch)?;
        let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 4), Compression::fast());
        encoder.write_all(&data)?;
        Ok(encoder.finish()?)
    }
}
