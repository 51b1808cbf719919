//! HTTP transport used by the executor.
//!
//! [`Transport`] is the seam between retry/decoding logic and the network.
//! [`ReqwestTransport`] is the production implementation; tests substitute
//! scripted transports. Every non-2xx response surfaces as an [`ApiError`]
//! carrying the status and body so the executor can classify it.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, trace};

use crate::api::streaming::ByteStream;
use crate::error::{ApiError, Result};

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A fully resolved HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a header value (case-insensitive name match).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The network capability the executor consumes.
///
/// Implementations must return `Err` for non-success statuses, with the
/// status attached (see [`ApiError::from_status`]).
pub trait Transport: Send + Sync {
    /// POST and return the JSON response body.
    fn post_json<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a, Value>;

    /// POST and return the response body as a stream of raw chunks.
    ///
    /// Resolves once response headers arrive; body chunks are read lazily.
    fn post_stream<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a, ByteStream>;

    /// GET and return the JSON response body.
    fn get_json<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a, Value>;
}

// ── reqwest implementation ─────────────────────────────────────────

/// Connection and proxy settings handed to [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum time between bytes on a response body.
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    /// How long idle pooled connections are kept.
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    /// TCP keep-alive interval. `None` disables keep-alive probes.
    pub tcp_keepalive: Option<Duration>,
    /// Honor `HTTP(S)_PROXY` and friends. Off by default.
    pub use_system_proxy: bool,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            tcp_keepalive: Some(Duration::from_secs(60)),
            use_system_proxy: false,
            user_agent: concat!("chatwire/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .read_timeout(config.read_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .tcp_keepalive(config.tcp_keepalive);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn build(&self, method: Method, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder
    }

    /// Send and turn non-success statuses into classified errors.
    async fn send(&self, method: Method, request: &HttpRequest) -> Result<reqwest::Response> {
        trace!("{method} {}", request.url);
        let resp = self
            .build(method, request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            debug!("HTTP {status} from {}", request.url);
            return Err(ApiError::from_status(status.as_u16(), text));
        }
        Ok(resp)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ApiError {
    ApiError::Transport {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value> {
    let text = resp
        .text()
        .await
        .map_err(|e| ApiError::transport(format!("failed to read response: {e}")))?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Adapt a response body into a chunk stream via `Response::chunk()`.
fn body_chunks(resp: reqwest::Response) -> ByteStream {
    Box::pin(futures::stream::unfold(Some(resp), |state| async move {
        let mut resp = state?;
        match resp.chunk().await {
            Ok(Some(bytes)) => Some((Ok(bytes), Some(resp))),
            Ok(None) => None,
            Err(e) => Some((
                Err(ApiError::Transport {
                    status: e.status().map(|s| s.as_u16()),
                    message: format!("failed to read streaming chunk: {e}"),
                }),
                None,
            )),
        }
    }))
}

impl Transport for ReqwestTransport {
    fn post_json<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a, Value> {
        Box::pin(async move {
            let resp = self.send(Method::POST, request).await?;
            read_json(resp).await
        })
    }

    fn post_stream<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a, ByteStream> {
        Box::pin(async move {
            let resp = self.send(Method::POST, request).await?;
            Ok(body_chunks(resp))
        })
    }

    fn get_json<'a>(&'a self, request: &'a HttpRequest) -> TransportFuture<'a, Value> {
        Box::pin(async move {
            let resp = self.send(Method::GET, request).await?;
            read_json(resp).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_builder_collects_headers_and_body() {
        let req = HttpRequest::new("https://example.com/v1/chat/completions")
            .header("Authorization", "Bearer k")
            .header("Content-Type", "application/json")
            .json(json!({"model": "m"}));
        assert_eq!(req.header_value("authorization"), Some("Bearer k"));
        assert_eq!(req.header_value("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(req.header_value("x-missing"), None);
        assert_eq!(req.body.unwrap()["model"], "m");
    }

    #[test]
    fn default_transport_config() {
        let config = TransportConfig::default();
        assert!(!config.use_system_proxy);
        assert_eq!(config.pool_max_idle_per_host, 10);
        assert!(config.user_agent.starts_with("chatwire/"));
    }

    #[test]
    fn reqwest_transport_builds() {
        let transport = ReqwestTransport::new(&TransportConfig::default());
        assert!(transport.is_ok());

        let with_proxy = TransportConfig {
            use_system_proxy: true,
            tcp_keepalive: None,
            ..Default::default()
        };
        assert!(ReqwestTransport::new(&with_proxy).is_ok());
    }
}
