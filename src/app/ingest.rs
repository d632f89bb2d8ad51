use super::pipeline::Pipeline;
use crate::domain::{EventKind, EventRecord};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

/// Name given to lines that are not a JSON event record.
pub const RAW_LINE_NAME: &str = "stdin";

/// Submits one record per non-empty line until the reader is exhausted.
/// Returns the number of records submitted.
pub async fn forward_lines<R>(reader: R, pipeline: &Pipeline) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut submitted = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        pipeline.submit(parse_line(line));
        submitted += 1;
    }

    Ok(submitted)
}

fn parse_line(line: &str) -> EventRecord {
    match serde_json::from_str::<EventRecord>(line) {
        Ok(record) => record,
        Err(e) => {
            debug!(error = %e, "Input line is not an event record, forwarding as text");
            EventRecord::new(EventKind::Log, RAW_LINE_NAME).with_message(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::PipelineConfig;
    use crate::sender::DeliveryError;

    #[test]
    fn test_parse_structured_line() {
        let record = parse_line(
            r#"{"kind":"error","name":"DbError","message":"connection reset","url":"svc://orders"}"#,
        );
        assert_eq!(record.kind(), EventKind::Error);
        assert_eq!(record.name(), "DbError");
        assert_eq!(record.url(), "svc://orders");
    }

    #[test]
    fn test_unparsable_line_becomes_log_record() {
        let record = parse_line("plain text output");
        assert_eq!(record.kind(), EventKind::Log);
        assert_eq!(record.name(), RAW_LINE_NAME);
        assert_eq!(
            record.message().and_then(|m| m.to_text()).as_deref(),
            Some("plain text output")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_lines_skips_blank_lines() {
        let pipeline = Pipeline::builder(PipelineConfig::default())
            .delivery_fn(|_doc| async { Ok::<_, DeliveryError>(()) })
            .build()
            .unwrap();

        let input: &[u8] = b"first\n\n   \n{\"kind\":\"warn\",\"name\":\"Slow\"}\n";
        let submitted = forward_lines(input, &pipeline).await.unwrap();

        assert_eq!(submitted, 2);
        assert_eq!(pipeline.queue_len(), 2);
    }
}
