//! Request execution with retry and backoff.
//!
//! [`Executor`] sends one logical request over a [`Transport`] and retries
//! rate-limited and server failures according to its [`RetryConfig`]. The
//! retry loop is explicit: each logical call owns one [`AttemptState`] and
//! nothing mutable is shared between calls.
//!
//! For streaming requests the same policy guards stream establishment. If an
//! established stream fails with a retryable error, a new stream is opened
//! from the beginning and its events continue on the same [`EventStream`].
//! There is no resumption, so events already delivered may be repeated.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tracing::{Instrument, Span, debug, info_span, warn};

use crate::api::ids::{attempt_id, generate_request_id};
use crate::api::retry::{
    AttemptState, NoopRetryListener, RetryConfig, RetryDecision, RetryEvent, RetryListener,
};
use crate::api::streaming::{ByteStream, EventStream, decode};
use crate::api::transport::{HttpRequest, Transport};
use crate::error::{ApiError, Result};

/// One logical request. Immutable across attempts.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Fully resolved URL.
    pub endpoint: String,
    pub payload: Value,
    pub streaming: bool,
}

impl ApiRequest {
    pub fn buffered(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
            streaming: false,
        }
    }

    pub fn streaming(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
            streaming: true,
        }
    }

    /// The body sent on the wire: the payload, plus `"stream": true` for
    /// streaming requests.
    pub fn wire_body(&self) -> Value {
        let mut body = self.payload.clone();
        if self.streaming
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert("stream".into(), Value::Bool(true));
        }
        body
    }
}

/// Identity of a logical call, for logs and retry events.
#[derive(Debug, Clone)]
struct CallContext {
    request_id: String,
    endpoint: String,
}

/// Sends requests and drives retries.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    headers: Vec<(String, String)>,
    listener: Arc<dyn RetryListener>,
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryConfig) -> Self {
        Self {
            transport,
            retry,
            headers: Vec::new(),
            listener: Arc::new(NoopRetryListener),
        }
    }

    /// Headers attached to every request (authorization, content type, ...).
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Observe retry decisions.
    pub fn with_listener(mut self, listener: Arc<dyn RetryListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn http_request(&self, request: &ApiRequest) -> HttpRequest {
        HttpRequest {
            url: request.endpoint.clone(),
            headers: self.headers.clone(),
            body: Some(request.wire_body()),
        }
    }

    fn context(request: &ApiRequest) -> CallContext {
        CallContext {
            request_id: generate_request_id(),
            endpoint: request.endpoint.clone(),
        }
    }

    /// Buffered call: returns the response body unmodified.
    pub async fn execute_json(&self, request: &ApiRequest) -> Result<Value> {
        let ctx = Self::context(request);
        let http = self.http_request(request);
        let mut state = AttemptState::new(&self.retry);
        let span = info_span!("chat_request", request_id = %ctx.request_id, streaming = false);

        self.send_json(&http, &mut state, &ctx)
            .instrument(span)
            .await
    }

    async fn send_json(
        &self,
        http: &HttpRequest,
        state: &mut AttemptState,
        ctx: &CallContext,
    ) -> Result<Value> {
        loop {
            debug!(
                "Sending request {} to {}",
                attempt_id(&ctx.request_id, state.attempt()),
                ctx.endpoint
            );
            match self.transport.post_json(http).await {
                Ok(body) => return Ok(body),
                Err(e) => self.backoff_or_fail(state, ctx, e, false).await?,
            }
        }
    }

    /// Streaming call: establishes the stream (retrying the handshake) and
    /// returns the decoded event stream.
    pub async fn execute_stream(&self, request: &ApiRequest) -> Result<EventStream> {
        let ctx = Self::context(request);
        let http = self.http_request(request);
        let mut state = AttemptState::new(&self.retry);
        let span = info_span!("chat_stream", request_id = %ctx.request_id, streaming = true);

        let chunks = self
            .open_stream(&http, &mut state, &ctx)
            .instrument(span.clone())
            .await?;
        Ok(Box::pin(self.clone().events(http, state, ctx, span, chunks)))
    }

    async fn open_stream(
        &self,
        http: &HttpRequest,
        state: &mut AttemptState,
        ctx: &CallContext,
    ) -> Result<ByteStream> {
        loop {
            debug!(
                "Opening stream {} to {}",
                attempt_id(&ctx.request_id, state.attempt()),
                ctx.endpoint
            );
            match self.transport.post_stream(http).await {
                Ok(chunks) => return Ok(chunks),
                Err(e) => self.backoff_or_fail(state, ctx, e, false).await?,
            }
        }
    }

    /// Decode `chunks`, re-opening the stream after retryable failures.
    ///
    /// Every poll runs inside `span`, so logs from the decoder and from
    /// retries keep the call's request ID.
    fn events(
        self,
        http: HttpRequest,
        mut state: AttemptState,
        ctx: CallContext,
        span: Span,
        mut chunks: ByteStream,
    ) -> impl futures::Stream<Item = Result<Value>> + Send {
        async_stream::stream! {
            loop {
                let mut events = Box::pin(decode(chunks));
                let mut emitted = 0usize;
                let mut failure = None;

                while let Some(item) = events.next().instrument(span.clone()).await {
                    match item {
                        Ok(event) => {
                            emitted += 1;
                            yield Ok(event);
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }

                let Some(error) = failure else {
                    break;
                };

                if emitted > 0 && !self.retry.restart_emitted_streams {
                    span.in_scope(|| {
                        warn!(
                            "Stream {} failed after {emitted} events: {error}",
                            ctx.request_id
                        )
                    });
                    yield Err(error);
                    break;
                }

                let retried = self
                    .backoff_or_fail(&mut state, &ctx, error, true)
                    .instrument(span.clone())
                    .await;
                if let Err(e) = retried {
                    yield Err(e);
                    break;
                }

                match self.open_stream(&http, &mut state, &ctx).instrument(span.clone()).await {
                    Ok(next) => chunks = next,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }

    /// Wait before the next attempt, or hand the error back if the call is
    /// over (fatal class or exhausted budget).
    async fn backoff_or_fail(
        &self,
        state: &mut AttemptState,
        ctx: &CallContext,
        error: ApiError,
        mid_stream: bool,
    ) -> Result<()> {
        let delay = match state.decide(&error) {
            RetryDecision::Retry(delay) => delay,
            RetryDecision::GiveUp => {
                if error.class().is_retryable() {
                    warn!(
                        "Giving up on {} after {} attempt(s): {error}",
                        ctx.request_id,
                        state.attempt()
                    );
                }
                return Err(error);
            }
        };

        warn!(
            "Transient API error (attempt {}/{}): {error}. Retrying in {delay:?}...",
            state.attempt(),
            state.max_retries() + 1,
        );
        self.listener.on_retry(&RetryEvent {
            request_id: &ctx.request_id,
            endpoint: &ctx.endpoint,
            attempt: state.attempt(),
            max_retries: state.max_retries(),
            class: error.class(),
            delay,
            error: &error,
            mid_stream,
        });

        tokio::time::sleep(delay).await;
        state.advance();
        Ok(())
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("retry", &self.retry)
            .field("headers", &self.headers.len())
            .finish()
    }
}
