//! Server-Sent Events (SSE) decoding for chat-completion streams.
//!
//! [`SseDecoder`] reassembles `data:` lines from byte chunks regardless of
//! where the network split them, including inside multi-byte characters.
//! [`decode`] wraps it as a lazy [`Stream`] of parsed JSON payloads.
//!
//! Line rules, applied to each trimmed line:
//!
//! - empty: event separator, ignored;
//! - `data: [DONE]`: end of stream, nothing emitted, nothing more read;
//! - `data: <json>`: parsed and emitted;
//! - `data: <not json>`: counted as an anomaly, logged, skipped;
//! - anything else (`:` comments, `id:`, `event:`, `retry:`): ignored.

use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::api::utf8::Utf8Decoder;
use crate::error::Result;

/// Literal prefix of an SSE data line.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that marks a clean end of stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Boxed stream of raw response chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Boxed stream of decoded event payloads.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// What a single line resolved to.
#[derive(Debug)]
enum Line {
    Ignored,
    Done,
    Event(Value),
    Malformed,
}

fn parse_line(line: &str) -> Line {
    let line = line.trim();
    if line.is_empty() {
        return Line::Ignored;
    }
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        trace!("Ignoring non-data SSE line: {line}");
        return Line::Ignored;
    };
    let data = data.trim();
    if data == DONE_SENTINEL {
        return Line::Done;
    }
    match serde_json::from_str::<Value>(data) {
        Ok(value) => Line::Event(value),
        Err(e) => {
            warn!("Failed to parse SSE data: {e}; data: {data}");
            Line::Malformed
        }
    }
}

/// Incremental SSE line decoder for a single stream.
///
/// Feed bytes with [`push`](Self::push), pull events with
/// [`next_event`](Self::next_event), and call [`finish`](Self::finish) when
/// the upstream source is exhausted. Create a new decoder per stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    text: Utf8Decoder,
    buffer: String,
    eof: bool,
    done: bool,
    saw_sentinel: bool,
    anomalies: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk. Ignored once the decoder is done.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.done || self.eof {
            return;
        }
        self.text.decode_into(chunk, &mut self.buffer);
    }

    /// Mark the upstream as exhausted.
    ///
    /// Flushes bytes held by the UTF-8 decoder into the buffer; the trailing
    /// text is treated as a final line even without a newline.
    pub fn finish(&mut self) {
        if self.done || self.eof {
            return;
        }
        self.text.finish_into(&mut self.buffer);
        self.eof = true;
    }

    /// Next complete event, or `None` if more input is needed (or the
    /// decoder is done).
    pub fn next_event(&mut self) -> Option<Value> {
        while !self.done {
            let line: String = match self.buffer.find('\n') {
                Some(newline_pos) => self.buffer.drain(..=newline_pos).collect(),
                None if self.eof => {
                    self.done = true;
                    std::mem::take(&mut self.buffer)
                }
                None => return None,
            };

            match parse_line(&line) {
                Line::Ignored => {}
                Line::Malformed => self.anomalies += 1,
                Line::Done => {
                    debug!("SSE stream signalled [DONE]");
                    self.done = true;
                    self.saw_sentinel = true;
                    self.buffer.clear();
                }
                Line::Event(value) => return Some(value),
            }
        }
        None
    }

    /// Whether no further events will be produced.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Whether decoding ended because of a `[DONE]` line.
    pub fn saw_sentinel(&self) -> bool {
        self.saw_sentinel
    }

    /// Number of `data:` lines dropped because they were not valid JSON.
    pub fn anomalies(&self) -> usize {
        self.anomalies
    }
}

/// Decode a stream of byte chunks into a lazy stream of JSON payloads.
///
/// Stops pulling chunks as soon as `[DONE]` is seen. If the upstream yields
/// an error, any complete trailing line is still emitted and the error is
/// yielded last.
pub fn decode<S>(chunks: S) -> impl Stream<Item = Result<Value>>
where
    S: Stream<Item = Result<Bytes>>,
{
    async_stream::stream! {
        let mut chunks = std::pin::pin!(chunks);
        let mut decoder = SseDecoder::new();
        let mut emitted = 0usize;

        while let Some(chunk) = chunks.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    decoder.finish();
                    while let Some(event) = decoder.next_event() {
                        yield Ok(event);
                    }
                    yield Err(e);
                    return;
                }
            };

            decoder.push(&bytes);
            while let Some(event) = decoder.next_event() {
                emitted += 1;
                yield Ok(event);
            }
            if decoder.is_done() {
                break;
            }
        }

        decoder.finish();
        while let Some(event) = decoder.next_event() {
            emitted += 1;
            yield Ok(event);
        }

        debug!(
            "SSE stream completed with {emitted} events ({} malformed)",
            decoder.anomalies()
        );
    }
}

// ── Chunk helpers ──────────────────────────────────────────────────

/// Incremental text content of an OpenAI-style stream chunk.
pub fn delta_text(event: &Value) -> Option<&str> {
    event
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
}

/// Incremental reasoning content of a stream chunk.
pub fn delta_reasoning(event: &Value) -> Option<&str> {
    event
        .pointer("/choices/0/delta/reasoning")
        .and_then(Value::as_str)
}

/// Finish reason carried by a stream chunk, if any.
pub fn finish_reason(event: &Value) -> Option<&str> {
    event
        .pointer("/choices/0/finish_reason")
        .and_then(Value::as_str)
}

/// Assemble the full text from a sequence of stream chunks.
pub fn collect_text(events: &[Value]) -> String {
    events.iter().filter_map(delta_text).collect()
}

/// Usage block from the last chunk that carries one.
pub fn extract_usage(events: &[Value]) -> Option<&Value> {
    events
        .iter()
        .rev()
        .filter_map(|e| e.get("usage"))
        .find(|u| !u.is_null())
}
