use super::{EventSink, ExceptionInfo};
use crate::domain::{EventKind, EventRecord, SourceLocation};
use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error;
use std::panic::{self, PanicHookInfo};
use std::sync::Arc;

/// Name used when the panic payload is neither `&str` nor `String`.
pub const NON_STRING_PAYLOAD: &str = "NonStringPanicPayload";

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Records panics as `exception` events while installed.
///
/// The previous hook still runs after every capture and is put back when the
/// guard is dropped.
pub struct PanicCapture {
    previous: Option<Arc<PanicHook>>,
}

impl PanicCapture {
    pub fn install(sink: Arc<dyn EventSink>) -> Self {
        let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
        let chained = previous.clone();

        panic::set_hook(Box::new(move |info| {
            sink.submit(panic_record(info));
            chained(info);
        }));

        Self {
            previous: Some(previous),
        }
    }
}

impl Drop for PanicCapture {
    fn drop(&mut self) {
        // take_hook/set_hook panic on a panicking thread
        if std::thread::panicking() {
            return;
        }
        let Some(previous) = self.previous.take() else {
            return;
        };

        drop(panic::take_hook());
        match Arc::try_unwrap(previous) {
            Ok(hook) => panic::set_hook(hook),
            Err(shared) => panic::set_hook(Box::new(move |info| shared(info))),
        }
    }
}

impl std::fmt::Debug for PanicCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanicCapture")
            .field("installed", &self.previous.is_some())
            .finish()
    }
}

fn panic_record(info: &PanicHookInfo<'_>) -> EventRecord {
    let mut record = payload_record(info.payload());

    if let Some(location) = info.location() {
        record = record.with_source_location(SourceLocation::new(
            location.file(),
            location.line(),
            location.column(),
        ));
    }

    record.with_stack_trace(Backtrace::force_capture().to_string())
}

/// String payloads keep the `panic` name. Error payloads are named after the
/// error.
fn payload_record(payload: &(dyn Any + Send)) -> EventRecord {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return EventRecord::new(EventKind::Exception, "panic").with_message(*message);
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return EventRecord::new(EventKind::Exception, "panic").with_message(message.clone());
    }

    let error: Option<&(dyn Error + 'static)> = payload
        .downcast_ref::<Box<dyn Error + Send + Sync>>()
        .map(|error| &**error as &(dyn Error + 'static))
        .or_else(|| {
            payload
                .downcast_ref::<anyhow::Error>()
                .map(|error| &**error as &(dyn Error + 'static))
        });

    match error {
        Some(error) => {
            let exception = ExceptionInfo::from_dyn_error(error);
            EventRecord::new(EventKind::Exception, exception.name())
                .with_message(exception.message())
        }
        None => EventRecord::new(EventKind::Exception, NON_STRING_PAYLOAD)
            .with_message("panic payload is not a string"),
    }
}
