//! The [`Client`] facade.
//!
//! A `Client` resolves endpoints for its [`ApiVariant`], attaches
//! authorization and variant headers, and hands each call to the shared
//! [`Executor`]. It is cheap to clone and safe to use from many tasks at
//! once; every call keeps its own retry state.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::ChatRequest;
use crate::api::executor::{ApiRequest, Executor};
use crate::api::retry::RetryListener;
use crate::api::streaming::EventStream;
use crate::api::transport::{HttpRequest, ReqwestTransport, Transport};
use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::variant::ApiVariant;

#[derive(Clone, Debug)]
pub struct Client {
    executor: Executor,
    config: Arc<ClientConfig>,
}

impl Client {
    /// Build a client backed by a pooled reqwest transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        validate(&config)?;
        let transport = ReqwestTransport::new(&config.transport)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Shorthand for `Client::new(ClientConfig::from_env(variant))`.
    pub fn from_env(variant: ApiVariant) -> Result<Self> {
        Self::new(ClientConfig::from_env(variant))
    }

    /// Build a client over a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let api_key = validate(&config)?;

        let mut headers = vec![
            ("Authorization".to_string(), format!("Bearer {api_key}")),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        headers.extend(
            config
                .variant
                .extra_headers(&config.app_url, &config.app_title),
        );

        let executor = Executor::new(transport, config.retry.clone()).with_headers(headers);
        Ok(Self {
            executor,
            config: Arc::new(config),
        })
    }

    /// Observe retry decisions made on behalf of this client.
    pub fn with_retry_listener(mut self, listener: Arc<dyn RetryListener>) -> Self {
        self.executor = self.executor.with_listener(listener);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn variant(&self) -> ApiVariant {
        self.config.variant
    }

    /// Buffered chat completion. Returns the response body unmodified.
    ///
    /// `body` must be a JSON object; `model` is written into it.
    pub async fn generate_content(&self, model: &str, body: Value) -> Result<Value> {
        let payload = with_model(model, body)?;
        let endpoint = self.config.endpoint(self.config.variant.completions_path());
        self.executor
            .execute_json(&ApiRequest::buffered(endpoint, payload))
            .await
    }

    /// Streaming chat completion. The request is sent with `"stream": true`
    /// and each SSE `data:` payload is yielded as one JSON value.
    pub async fn generate_content_stream(&self, model: &str, body: Value) -> Result<EventStream> {
        let payload = with_model(model, body)?;
        let endpoint = self.config.endpoint(self.config.variant.completions_path());
        self.executor
            .execute_stream(&ApiRequest::streaming(endpoint, payload))
            .await
    }

    pub async fn chat(&self, model: &str, request: &ChatRequest) -> Result<Value> {
        self.generate_content(model, request.to_body()?).await
    }

    pub async fn chat_stream(&self, model: &str, request: &ChatRequest) -> Result<EventStream> {
        self.generate_content_stream(model, request.to_body()?)
            .await
    }

    /// List available models. Single attempt, no retry.
    pub async fn list_models(&self) -> Result<Value> {
        let url = self.config.endpoint(self.config.variant.models_path());
        debug!("Listing models from {url}");
        let request = HttpRequest {
            url,
            headers: self.executor.headers().to_vec(),
            body: None,
        };
        self.executor.transport().get_json(&request).await
    }
}

/// Check the key and base URL, returning the trimmed key.
fn validate(config: &ClientConfig) -> Result<&str> {
    let api_key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::Config("API key is required".into()))?;

    let base = config.resolved_base_url();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ApiError::Config(format!(
            "base URL must start with http:// or https://, got '{base}'"
        )));
    }
    Ok(api_key)
}

fn with_model(model: &str, body: Value) -> Result<Value> {
    let mut body = body;
    let Some(obj) = body.as_object_mut() else {
        return Err(ApiError::Config("request body must be a JSON object".into()));
    };
    if !model.is_empty() {
        obj.insert("model".into(), Value::String(model.to_string()));
    }
    Ok(body)
}
