//! Correlation IDs for logical calls.
//!
//! Each call to the client gets one `request_id`, shared by all of its
//! retries, so log lines and [`RetryEvent`](super::retry::RetryEvent)s for
//! the same call can be grouped. IDs are `rq-<pid>-<seq>`: unique within a
//! process, and sortable by call order within it.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Generate a unique ID for a logical call.
pub fn generate_request_id() -> String {
    let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("rq-{:x}-{seq:06x}", std::process::id())
}

/// ID for one attempt within a call (1-based).
pub fn attempt_id(request_id: &str, attempt: u32) -> String {
    format!("{request_id}:a{attempt}")
}
