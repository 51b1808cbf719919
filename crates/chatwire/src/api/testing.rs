//! Scripted in-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;

use crate::api::streaming::ByteStream;
use crate::api::transport::{HttpRequest, Transport, TransportFuture};
use crate::error::{ApiError, Result};

/// What the next call returns.
pub(crate) enum Outcome {
    Json(Value),
    Stream(Vec<String>),
    /// Emits the chunks, then fails with the given status.
    StreamThenFail(Vec<String>, u16),
    /// Emits the chunks, then fails without a status.
    StreamThenBreak(Vec<String>),
    /// Non-success HTTP status.
    Fail(u16),
    /// Emits the chunks, bumping the counter as each one is read.
    Counted(Vec<String>, Arc<AtomicUsize>),
    /// Connection-level failure, no status.
    Broken,
}

impl Outcome {
    pub(crate) fn stream(chunks: &[&str]) -> Self {
        Outcome::Stream(chunks.iter().map(|c| c.to_string()).collect())
    }

    fn replay(&self) -> Self {
        match self {
            Outcome::Json(v) => Outcome::Json(v.clone()),
            Outcome::Stream(c) => Outcome::Stream(c.clone()),
            Outcome::StreamThenFail(c, s) => Outcome::StreamThenFail(c.clone(), *s),
            Outcome::StreamThenBreak(c) => Outcome::StreamThenBreak(c.clone()),
            Outcome::Counted(c, n) => Outcome::Counted(c.clone(), n.clone()),
            Outcome::Fail(s) => Outcome::Fail(*s),
            Outcome::Broken => Outcome::Broken,
        }
    }
}

fn failure(status: u16) -> ApiError {
    ApiError::from_status(status, format!("scripted failure {status}"))
}

fn chunk_stream(chunks: Vec<String>, tail: Option<ApiError>) -> ByteStream {
    let mut items: Vec<Result<Bytes>> = chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
    if let Some(err) = tail {
        items.push(Err(err));
    }
    Box::pin(futures::stream::iter(items))
}

fn counted_stream(chunks: Vec<String>, reads: Arc<AtomicUsize>) -> ByteStream {
    Box::pin(futures::stream::iter(chunks).map(move |c| {
        reads.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(c))
    }))
}

/// Returns queued outcomes in order and records every request.
///
/// When built with [`repeating`](Self::repeating), the same outcome is
/// returned forever.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Outcome>>,
    repeat: Option<Outcome>,
    calls: Mutex<Vec<(tokio::time::Instant, HttpRequest)>>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn repeating(outcome: Outcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(outcome),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn call_times(&self) -> Vec<tokio::time::Instant> {
        self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn next(&self, request: &HttpRequest) -> Outcome {
        self.calls
            .lock()
            .unwrap()
            .push((tokio::time::Instant::now(), request.clone()));
        let queued = self.script.lock().unwrap().pop_front();
        match (queued, &self.repeat) {
            (Some(outcome), _) => outcome,
            (None, Some(repeat)) => repeat.replay(),
            (None, None) => panic!("scripted transport ran out of outcomes"),
        }
    }

    fn json(&self, request: &HttpRequest) -> Result<Value> {
        match self.next(request) {
            Outcome::Json(v) => Ok(v),
            Outcome::Fail(status) => Err(failure(status)),
            Outcome::Broken => Err(ApiError::transport("connection refused")),
            _ => panic!("stream outcome scripted for a buffered call"),
        }
    }
}

impl Transport for ScriptedTransport {
    fn post_json<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a, Value> {
        let result = self.json(request);
        Box::pin(async move { result })
    }

    fn post_stream<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a, ByteStream> {
        let result = match self.next(request) {
            Outcome::Stream(chunks) => Ok(chunk_stream(chunks, None)),
            Outcome::StreamThenFail(chunks, status) => {
                Ok(chunk_stream(chunks, Some(failure(status))))
            }
            Outcome::StreamThenBreak(chunks) => Ok(chunk_stream(
                chunks,
                Some(ApiError::transport("connection reset")),
            )),
            Outcome::Counted(chunks, reads) => Ok(counted_stream(chunks, reads)),
            Outcome::Fail(status) => Err(failure(status)),
            Outcome::Broken => Err(ApiError::transport("connection refused")),
            Outcome::Json(_) => panic!("json outcome scripted for a streaming call"),
        };
        Box::pin(async move { result })
    }

    fn get_json<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a, Value> {
        let result = self.json(request);
        Box::pin(async move { result })
    }
}
