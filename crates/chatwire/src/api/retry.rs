//! Automatic retry with exponential backoff.
//!
//! Retries rate-limited (429) and server (5xx) failures, waiting
//! `base_delay * 2^n` before retry `n` (0-indexed). Never retries 401/403,
//! other statuses, or failures that carry no HTTP status. No jitter and no
//! delay cap: `max_retries` is the only bound.

use std::time::Duration;

use crate::error::ApiError;

/// Retries used when none are configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base backoff delay used when none is configured.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Retry classification derived from a failed attempt's HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 401 / 403. Fatal.
    Auth,
    /// 429. Retryable.
    TooManyRequests,
    /// 500-599. Retryable.
    ServerError,
    /// Anything else, including a missing status. Fatal.
    Other,
}

impl ErrorClass {
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(401 | 403) => ErrorClass::Auth,
            Some(429) => ErrorClass::TooManyRequests,
            Some(500..=599) => ErrorClass::ServerError,
            _ => ErrorClass::Other,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::TooManyRequests | ErrorClass::ServerError)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Auth => write!(f, "auth"),
            ErrorClass::TooManyRequests => write!(f, "too_many_requests"),
            ErrorClass::ServerError => write!(f, "server_error"),
            ErrorClass::Other => write!(f, "other"),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = fail on the first error).
    pub max_retries: u32,
    /// Delay before the first retry. Doubles on each subsequent retry.
    pub base_delay: Duration,
    /// Whether a stream that already emitted events is restarted from the
    /// beginning after a retryable failure. When `false`, the failure is
    /// surfaced to the caller instead.
    pub restart_emitted_streams: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            restart_emitted_streams: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries and the default delay.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_restart_emitted_streams(mut self, restart: bool) -> Self {
        self.restart_emitted_streams = restart;
        self
    }

    /// Delay before retry `attempt` (0-indexed): `base_delay * 2^attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        backoff(self.base_delay, attempt)
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    if base.is_zero() {
        return base;
    }
    2u32.checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(Duration::MAX)
}

/// Per-call retry bookkeeping. Only `retry_count` ever changes.
#[derive(Debug, Clone)]
pub struct AttemptState {
    retry_count: u32,
    max_retries: u32,
    base_delay: Duration,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again.
    Retry(Duration),
    /// Propagate the error.
    GiveUp,
}

impl AttemptState {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            retry_count: 0,
            max_retries: config.max_retries,
            base_delay: config.base_delay,
        }
    }

    /// Retries performed so far.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// 1-based number of the attempt currently in flight.
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    /// Decide whether `error` should be retried given the remaining budget.
    pub fn decide(&self, error: &ApiError) -> RetryDecision {
        if error.class().is_retryable() && self.retry_count < self.max_retries {
            RetryDecision::Retry(backoff(self.base_delay, self.retry_count))
        } else {
            RetryDecision::GiveUp
        }
    }

    /// Record that a retry is about to happen.
    pub fn advance(&mut self) {
        self.retry_count += 1;
    }
}

// ── Observation ────────────────────────────────────────────────────

/// A retry the executor is about to perform.
#[derive(Debug)]
pub struct RetryEvent<'a> {
    /// Correlation ID of the logical call.
    pub request_id: &'a str,
    pub endpoint: &'a str,
    /// 1-based number of the attempt that failed.
    pub attempt: u32,
    pub max_retries: u32,
    pub class: ErrorClass,
    /// How long the executor will wait before the next attempt.
    pub delay: Duration,
    pub error: &'a ApiError,
    /// `true` when the failure hit an already-established stream.
    pub mid_stream: bool,
}

/// Observer for retry decisions.
///
/// Listeners see every retry before the backoff wait starts. They cannot
/// change the decision or the payload.
pub trait RetryListener: Send + Sync {
    fn on_retry(&self, event: &RetryEvent<'_>) {
        let _ = event;
    }
}

/// A listener that ignores everything.
pub struct NoopRetryListener;
impl RetryListener for NoopRetryListener {}

/// A listener backed by a closure.
///
/// ```ignore
/// let listener = FnRetryListener::new(|event| {
///     eprintln!("retrying {} in {:?}", event.endpoint, event.delay);
/// });
/// ```
pub struct FnRetryListener<F>(F)
where
    F: Fn(&RetryEvent<'_>) + Send + Sync;

impl<F> FnRetryListener<F>
where
    F: Fn(&RetryEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> RetryListener for FnRetryListener<F>
where
    F: Fn(&RetryEvent<'_>) + Send + Sync,
{
    fn on_retry(&self, event: &RetryEvent<'_>) {
        (self.0)(event)
    }
}
