use crate::domain::{EventKind, EventRecord};
use serde_json::{Map, Value};
use std::backtrace::Backtrace;
use std::error::Error;

/// Name, message and stack of a captured exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    name: String,
    message: String,
    stack: Option<String>,
}

impl ExceptionInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Uses the error's type name as the exception name and appends the
    /// `source()` chain to the message.
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        Self::new(short_type_name(std::any::type_name::<E>()), chain_message(error))
    }

    /// Like [`from_error`](Self::from_error) for errors only known as trait
    /// objects. The name is the leading identifier of the `Debug` output,
    /// which for derived impls is the type or variant name, and `Error`
    /// otherwise.
    pub fn from_dyn_error(error: &(dyn Error + 'static)) -> Self {
        let debug = format!("{error:?}");
        let name: String = debug
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        let name = if name.starts_with(|c: char| c.is_ascii_uppercase()) {
            name
        } else {
            "Error".to_string()
        };

        Self::new(name, chain_message(error))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// Builds an `exception` record. A missing stack is replaced by a
    /// backtrace of the capturing thread.
    pub fn into_record(self, metadata: Option<Map<String, Value>>) -> EventRecord {
        let stack = self
            .stack
            .unwrap_or_else(|| Backtrace::force_capture().to_string());

        let record = EventRecord::new(EventKind::Exception, self.name)
            .with_message(self.message)
            .with_stack_trace(stack);

        match metadata {
            Some(metadata) => record.with_metadata(metadata),
            None => record,
        }
    }
}

fn chain_message(error: &(dyn Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str("\nCaused by: ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
