use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use crate::error::StreamError;

/// Raw text lines of one open connection, newline terminators stripped.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

/// Something that can open the event feed. Swapped for a fake in tests.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, url: &str) -> Result<LineStream, StreamError>;
}

/// Server-Sent Events over a long-lived reqwest GET.
#[derive(Debug, Clone, Default)]
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    async fn open(&self, url: &str) -> Result<LineStream, StreamError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status(status));
        }

        let mut bytes = response.bytes_stream();
        let lines = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(StreamError::Request(e));
                        break;
                    }
                };

                buffer.extend_from_slice(&chunk);
                while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let mut line: Vec<u8> = buffer.drain(..=newline).collect();
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    yield Ok(String::from_utf8_lossy(&line).into_owned());
                }
            }

            if !buffer.is_empty() {
                yield Ok(String::from_utf8_lossy(&buffer).into_owned());
            }
        };

        Ok(Box::pin(lines))
    }
}

/// Line-level SSE framing.
///
/// `data:` lines accumulate until a blank line dispatches them joined with
/// `\n`. Comment lines (`:` prefix) carry nothing. `event:`, `id:` and
/// `retry:` are accepted and ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns a completed event payload, if any.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }

    /// Payload left over when the stream ends without a trailing blank line.
    pub fn finish(&mut self) -> Option<String> {
        self.take()
    }

    fn take(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(payload)
    }
}
