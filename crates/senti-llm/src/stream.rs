//! Decoding of streamed provider responses into text chunks.

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Response;
use serde_json::Value;
use std::pin::Pin;

use crate::error::{LLMError, Result};
use crate::provider::base::embedded_error;

/// Lazy sequence of generated text chunks
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Decode a server-sent-events body.
///
/// Each event's `data` is parsed as JSON and passed to `extract`. The stream
/// ends at `[DONE]`, at end of body, or after the first error it yields.
pub fn sse_text_stream<F>(response: Response, extract: F) -> TextStream
where
    F: Fn(&Value) -> Option<String> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut events = response.bytes_stream().eventsource();

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err(LLMError::Stream(e.to_string()));
                    break;
                }
            };

            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                break;
            }

            match decode_chunk(data, &extract) {
                Ok(Some(text)) => yield Ok(text),
                Ok(None) => {}
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };

    Box::pin(stream)
}

/// Decode a newline-delimited JSON body.
///
/// `is_done` marks the final object; the stream ends after it.
pub fn ndjson_text_stream<F, D>(response: Response, extract: F, is_done: D) -> TextStream
where
    F: Fn(&Value) -> Option<String> + Send + 'static,
    D: Fn(&Value) -> bool + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut finished = false;

        while !finished {
            let line = match buffer.iter().position(|b| *b == b'\n') {
                Some(pos) => buffer.drain(..=pos).collect::<Vec<u8>>(),
                None => match body.next().await {
                    Some(Ok(bytes)) => {
                        buffer.extend_from_slice(&bytes);
                        continue;
                    }
                    Some(Err(e)) => {
                        yield Err(LLMError::Network(e.to_string()));
                        break;
                    }
                    // body ended; flush whatever is left
                    None => {
                        finished = true;
                        std::mem::take(&mut buffer)
                    }
                },
            };

            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(e) => {
                    yield Err(LLMError::Parse(format!("invalid stream line: {}", e)));
                    break;
                }
            };
            if let Some(message) = embedded_error(&value) {
                yield Err(LLMError::Stream(message));
                break;
            }
            if let Some(text) = extract(&value) {
                yield Ok(text);
            }
            if is_done(&value) {
                break;
            }
        }
    };

    Box::pin(stream)
}

fn decode_chunk<F>(data: &str, extract: &F) -> Result<Option<String>>
where
    F: Fn(&Value) -> Option<String>,
{
    let value: Value = serde_json::from_str(data)
        .map_err(|e| LLMError::Parse(format!("invalid stream chunk: {}", e)))?;
    if let Some(message) = embedded_error(&value) {
        return Err(LLMError::Stream(message));
    }
    Ok(extract(&value))
}

/// Collect a stream into one string, failing on the first error
#[cfg(test)]
pub(crate) async fn collect_text(mut stream: TextStream) -> Result<String> {
    let mut out = String::new();
    while let Some(chunk) = stream.next().await {
        out.push_str(&chunk?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn fetch(server: &mockito::ServerGuard, path: &str) -> Response {
        reqwest::Client::new()
            .post(format!("{}{}", server.url(), path))
            .send()
            .await
            .unwrap()
    }

    fn text_field(v: &Value) -> Option<String> {
        v.get("t").and_then(Value::as_str).map(str::to_string)
    }

    #[tokio::test]
    async fn test_sse_stops_at_done() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/sse")
            .with_header("content-type", "text/event-stream")
            .with_body("data: {\"t\":\"He\"}\n\ndata: {\"t\":\"llo\"}\n\ndata: [DONE]\n\ndata: {\"t\":\"late\"}\n\n")
            .create_async()
            .await;

        let stream = sse_text_stream(fetch(&server, "/sse").await, text_field);
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec!["He", "llo"]);
    }

    #[tokio::test]
    async fn test_sse_embedded_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/sse")
            .with_body("data: {\"t\":\"a\"}\n\ndata: {\"error\":{\"message\":\"overloaded\"}}\n\n")
            .create_async()
            .await;

        let mut stream = sse_text_stream(fetch(&server, "/sse").await, text_field);
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, LLMError::Stream(m) if m == "overloaded"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_ndjson_with_trailing_line() {
        let mut server = mockito::Server::new_async().await;
        let body = format!(
            "{}\n{}\n{}",
            json!({"t": "one", "done": false}),
            json!({"t": "two", "done": false}),
            json!({"t": "", "done": true}),
        );
        let _m = server
            .mock("POST", "/nd")
            .with_body(body)
            .create_async()
            .await;

        let stream = ndjson_text_stream(fetch(&server, "/nd").await, text_field, |v| {
            v["done"].as_bool().unwrap_or(false)
        });
        let text = collect_text(stream).await.unwrap();
        assert_eq!(text, "onetwo");
    }

    #[tokio::test]
    async fn test_ndjson_invalid_line() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/nd")
            .with_body("{\"t\":\"ok\"}\nnot json\n")
            .create_async()
            .await;

        let stream = ndjson_text_stream(fetch(&server, "/nd").await, text_field, |_| false);
        let err = collect_text(stream).await.unwrap_err();
        assert!(matches!(err, LLMError::Parse(_)));
    }
}
