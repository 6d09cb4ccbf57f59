//! Server-sent-event line splitting for transports that hand over raw text.

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use crate::error::{QueryError, Result};

/// Extract the payload from an SSE `data:` line. `[DONE]` yields `None`.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Turn a stream of raw SSE text into decoded updates.
///
/// Input chunks may split lines anywhere. Comment and non-data lines are
/// skipped. Payloads that are not valid JSON are logged and skipped; other
/// decode errors are yielded. Transport errors end the stream.
pub fn decode_sse<T, F>(
    input: BoxStream<'static, Result<String>>,
    decode: F,
) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    F: Fn(&str) -> Result<T> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut buffer = String::new();
        let mut input = input;

        while let Some(chunk) = input.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            buffer.push_str(&chunk);

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..=line_end);

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }

                if let Some(data) = parse_sse_data(&line) {
                    match decode(data) {
                        Ok(item) => yield Ok(item),
                        Err(QueryError::Serialization(e)) => {
                            debug!(error = %e, "Skipping undecodable SSE payload");
                        }
                        Err(e) => yield Err(e),
                    }
                }
            }
        }
    };

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn decode_number(data: &str) -> Result<u32> {
        Ok(serde_json::from_str(data)?)
    }

    #[test]
    fn parse_sse_data_handles_done_and_spacing() {
        assert_eq!(parse_sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(parse_sse_data("data:{}"), Some("{}"));
        assert_eq!(parse_sse_data("data: [DONE]"), None);
        assert_eq!(parse_sse_data("event: message"), None);
    }

    #[tokio::test]
    async fn lines_split_across_chunks_are_reassembled() {
        let chunks: Vec<Result<String>> = vec![
            Ok("data: 1\n\nda".to_string()),
            Ok("ta: 2\n: keep-alive\ndata: x\n".to_string()),
            Ok("data: 3\ndata: [DONE]\n".to_string()),
        ];
        let input = stream::iter(chunks);
        let decoded: Vec<u32> = decode_sse(Box::pin(input), decode_number)
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let input = stream::iter(vec![
            Ok("data: 1\n".to_string()),
            Err(QueryError::Transport("reset".into())),
            Ok("data: 2\n".to_string()),
        ]);
        let items: Vec<Result<u32>> = decode_sse(Box::pin(input), decode_number).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(QueryError::Transport(_))));
    }
}
