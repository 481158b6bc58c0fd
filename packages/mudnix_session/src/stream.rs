//! Server-push subscriptions.
//!
//! The backend pushes JSON payloads over `text/event-stream` responses. A
//! [`Subscription`] owns one such channel: a task that connects, decodes
//! events, parses each payload and awaits the channel's handler. Closing the
//! subscription cancels the task; a handler that is already running finishes,
//! so handlers re-check session state before acting.

use std::future::Future;

use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// Raw `data` payloads of a push channel, in arrival order.
pub type RawEvents = BoxStream<'static, Result<String, ClientError>>;

/// Incremental `text/event-stream` decoder.
///
/// Accepts arbitrary chunk boundaries and any of `\n`, `\r\n`, `\r` as line
/// terminator. Only the `data` field is kept; multiple `data` lines of one
/// event are joined with `\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: Option<String>,
    after_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut events = Vec::new();
        for &byte in chunk {
            if self.after_cr {
                self.after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.after_cr = true;
                    self.end_line(&mut events);
                }
                _ => self.line.push(byte),
            }
        }
        events
    }

    fn end_line(&mut self, events: &mut Vec<String>) {
        let raw = std::mem::take(&mut self.line);
        let line = String::from_utf8_lossy(&raw);

        if line.is_empty() {
            if let Some(data) = self.data.take() {
                events.push(data);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_ref(), ""),
        };
        if field == "data" {
            match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }
    }
}

/// Decode a streaming HTTP response body into raw event payloads.
pub fn sse_events(response: reqwest::Response) -> RawEvents {
    let mut decoder = SseDecoder::new();
    response
        .bytes_stream()
        .map(move |chunk| match chunk {
            Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
            Err(e) => vec![Err(ClientError::from_reqwest(e))],
        })
        .flat_map(stream::iter)
        .boxed()
}

/// Handle to one open push channel.
#[derive(Debug)]
pub struct Subscription {
    name: &'static str,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Connect in the background and route each parsed payload to `handler`.
    ///
    /// Connection failures, transport errors and end of stream terminate the
    /// subscription; nothing is retried. Payloads that fail to parse as `T`
    /// are skipped.
    pub fn open<C, T, F, Fut>(name: &'static str, connect: C, mut handler: F) -> Self
    where
        C: Future<Output = Result<RawEvents, ClientError>> + Send + 'static,
        T: DeserializeOwned + Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut events = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                connected = connect => match connected {
                    Ok(events) => events,
                    Err(e) => {
                        warn!(channel = name, error = %e, "failed to open push channel");
                        return;
                    }
                },
            };
            debug!(channel = name, "push channel open");

            loop {
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = events.next() => next,
                };
                match next {
                    Some(Ok(data)) => {
                        if token.is_cancelled() {
                            break;
                        }
                        match serde_json::from_str::<T>(&data) {
                            Ok(payload) => handler(payload).await,
                            Err(e) => {
                                debug!(channel = name, error = %e, "ignoring malformed payload")
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(channel = name, error = %e, "push channel failed");
                        break;
                    }
                    None => {
                        info!(channel = name, "push channel ended by server");
                        break;
                    }
                }
            }
            debug!(channel = name, "push channel task finished");
        });

        Self {
            name,
            cancel,
            task: Some(task),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop delivering events. Safe to call any number of times.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            debug!(channel = self.name, "closing push channel");
            self.cancel.cancel();
        }
    }

    /// True until closed or until the channel task has ended on its own.
    pub fn is_open(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait for the channel task to end, after [`close`](Self::close) or
    /// after the server ends the stream.
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
