//! Content-security-policy violation reports.
//!
//! Field names follow the `csp-report` body browsers post, so a report can
//! be deserialized straight from a collector endpoint or a test fixture.

use crate::domain::{EventKind, EventRecord, SourceLocation};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const CSP_EVENT_NAME: &str = "securitypolicyviolation";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CspViolation {
    pub blocked_uri: Option<String>,
    pub document_uri: Option<String>,
    pub original_policy: Option<String>,
    pub referrer: Option<String>,
    /// When the violation happened, if the reporter knows.
    pub timestamp: Option<DateTime<Utc>>,
    pub source_file: Option<String>,
    pub violated_directive: Option<String>,
    pub effective_directive: Option<String>,
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
    pub status_code: Option<u16>,
}

/// `{"csp-report": {...}}` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CspReport {
    #[serde(rename = "csp-report")]
    pub report: CspViolation,
}

fn field<T: Display>(out: &mut Vec<String>, key: &str, value: Option<&T>) {
    match value {
        Some(value) => out.push(format!("{key} {value}")),
        None => out.push(format!("{key} ")),
    }
}

impl CspViolation {
    /// Newline-joined `key value` dump of every documented field.
    pub fn describe(&self) -> String {
        let timestamp = self
            .timestamp
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true));

        let mut lines = Vec::with_capacity(11);
        field(&mut lines, "blockedURI", self.blocked_uri.as_ref());
        field(&mut lines, "documentURI", self.document_uri.as_ref());
        field(&mut lines, "originalPolicy", self.original_policy.as_ref());
        field(&mut lines, "referrer", self.referrer.as_ref());
        field(&mut lines, "timeStamp", timestamp.as_ref());
        field(&mut lines, "sourceFile", self.source_file.as_ref());
        field(&mut lines, "violatedDirective", self.violated_directive.as_ref());
        field(&mut lines, "effectiveDirective", self.effective_directive.as_ref());
        field(&mut lines, "lineNumber", self.line_number.as_ref());
        field(&mut lines, "columnNumber", self.column_number.as_ref());
        field(&mut lines, "statusCode", self.status_code.as_ref());
        lines.join("\n")
    }

    pub fn to_record(&self) -> EventRecord {
        let mut record = EventRecord::new(EventKind::SecurityPolicyViolation, CSP_EVENT_NAME)
            .with_message(self.describe());

        if self.source_file.is_some() || self.line_number.is_some() || self.column_number.is_some()
        {
            record = record.with_source_location(SourceLocation {
                source: self.source_file.clone(),
                line: self.line_number,
                column: self.column_number,
            });
        }
        if let Some(document_uri) = &self.document_uri {
            record = record.with_url(document_uri.clone());
        }
        if let Some(timestamp) = self.timestamp {
            record = record.with_timestamp(timestamp);
        }
        record
    }
}
