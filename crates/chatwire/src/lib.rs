//! Chat-completion client for OpenAI-compatible HTTP APIs.
//!
//! `chatwire` sends chat-completion requests to OpenRouter or OpenAI, retries
//! transient failures with exponential backoff, and decodes Server-Sent Event
//! streams into JSON chunks. Both API flavors share one core; the differences
//! (base URL, key variable, headers) live in [`ApiVariant`].
//!
//! # Getting started
//!
//! ```ignore
//! use chatwire::{ApiVariant, ChatRequest, Client, ClientConfig, Message};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> chatwire::Result<()> {
//!     let client = Client::new(ClientConfig::from_env(ApiVariant::OpenRouter))?;
//!
//!     let request = ChatRequest::new(vec![
//!         Message::system("You are terse."),
//!         Message::user("Name a prime."),
//!     ]);
//!     let mut events = client.chat_stream("openai/gpt-4o-mini", &request).await?;
//!     while let Some(chunk) = events.next().await {
//!         if let Some(text) = chatwire::api::streaming::delta_text(&chunk?) {
//!             print!("{text}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Send requests:** [`Client::generate_content`],
//!   [`Client::generate_content_stream`], and [`Client::list_models`] take raw
//!   JSON bodies. [`Client::chat`] and [`Client::chat_stream`] take a typed
//!   [`ChatRequest`].
//!
//! - **Tune retries:** [`RetryConfig`](api::retry::RetryConfig) via
//!   [`ClientConfig::with_retry`]. Only 429 and 5xx are retried; 401/403 fail
//!   immediately. Observe decisions with a
//!   [`RetryListener`](api::retry::RetryListener).
//!
//! - **Decode SSE yourself:** [`SseDecoder`](api::streaming::SseDecoder) is a
//!   push-based decoder; [`api::streaming::decode`] adapts any byte stream.
//!
//! - **Swap the network layer:** implement
//!   [`Transport`](api::transport::Transport) and pass it to
//!   [`Client::with_transport`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Client`] facade: buffered, streaming, and model-list calls |
//! | [`config`] | [`ClientConfig`], environment loading |
//! | [`api`] | Executor, retry policy, SSE decoder, UTF-8 decoder, transport |
//! | [`variant`] | [`ApiVariant`] data: base URLs, key variables, headers |
//! | [`error`] | [`ApiError`] and its retry classification |

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod variant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{ApiError, Result};
pub use variant::ApiVariant;

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unset optional fields are omitted.
///
/// The model is supplied separately to [`Client::chat`] so one request can be
/// sent to several models.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// The JSON body for [`Client::generate_content`].
    pub fn to_body(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| ApiError::Config(format!("failed to serialize request: {e}")))
    }
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}
