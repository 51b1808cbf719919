//! Request execution layer: transport, retry, and SSE decoding.
//!
//! These modules handle everything between the [`Client`](crate::client::Client)
//! facade and the network:
//!
//! - [`transport`]: the [`Transport`] trait and the reqwest-backed
//!   [`ReqwestTransport`].
//! - [`executor`]: [`Executor`] sends a request, classifies failures, and
//!   retries 429/5xx with `base_delay * 2^n` backoff. Never retries 401/403.
//! - [`retry`]: [`RetryConfig`], [`ErrorClass`], per-call [`AttemptState`],
//!   and the [`RetryListener`] observer.
//! - [`streaming`]: [`SseDecoder`] and [`decode`], turning byte chunks into
//!   JSON events, plus helpers for OpenAI-style chunks.
//! - [`utf8`]: the incremental UTF-8 decoder the SSE decoder relies on.
//! - [`ids`]: correlation IDs for log grouping.

pub mod executor;
pub mod ids;
pub mod retry;
pub mod streaming;
pub mod transport;
pub mod utf8;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items at the module level.
pub use executor::{ApiRequest, Executor};
pub use retry::{
    AttemptState, ErrorClass, FnRetryListener, NoopRetryListener, RetryConfig, RetryEvent,
    RetryListener,
};
pub use streaming::{ByteStream, EventStream, SseDecoder, decode};
pub use transport::{HttpRequest, ReqwestTransport, Transport, TransportConfig};
