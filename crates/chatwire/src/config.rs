//! Client configuration with sensible defaults.
//!
//! [`ClientConfig`] gathers everything [`Client`](crate::client::Client)
//! needs: API variant and key, base URL, retry policy, and transport tuning.
//! Build it directly with the `with_*` methods, or read it from the
//! environment with [`from_env`](ClientConfig::from_env).

use std::time::Duration;

use tracing::warn;

use crate::api::retry::RetryConfig;
use crate::api::transport::TransportConfig;
use crate::variant::ApiVariant;

/// Environment variable overriding the variant's default base URL.
pub const ENV_BASE_URL: &str = "CHATWIRE_BASE_URL";
/// Environment variable for the maximum retry count.
pub const ENV_MAX_RETRIES: &str = "CHATWIRE_MAX_RETRIES";
/// Environment variable for the base retry delay in milliseconds.
pub const ENV_RETRY_DELAY_MS: &str = "CHATWIRE_RETRY_DELAY_MS";
/// Environment variable enabling system proxy settings.
pub const ENV_SYSTEM_PROXY: &str = "CHATWIRE_SYSTEM_PROXY";
/// Fallback API key variable, checked after the variant's own.
pub const ENV_API_KEY: &str = "CHATWIRE_API_KEY";

/// Configuration for a [`Client`](crate::client::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub variant: ApiVariant,
    /// Required. Client construction fails without it.
    pub api_key: Option<String>,
    /// Overrides [`ApiVariant::default_base_url`].
    pub base_url: Option<String>,
    /// Default: 3 retries, 1000 ms base delay.
    pub retry: RetryConfig,
    /// Connection pool, timeouts, and proxy mode.
    pub transport: TransportConfig,
    /// Sent as `HTTP-Referer` by variants that use attribution headers.
    pub app_url: String,
    /// Sent as `X-Title` by variants that use attribution headers.
    pub app_title: String,
}

impl ClientConfig {
    pub fn new(variant: ApiVariant, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::unauthenticated(variant)
        }
    }

    fn unauthenticated(variant: ApiVariant) -> Self {
        Self {
            variant,
            api_key: None,
            base_url: None,
            retry: RetryConfig::default(),
            transport: TransportConfig::default(),
            app_url: "https://crates.io/crates/chatwire".to_string(),
            app_title: "chatwire".to_string(),
        }
    }

    /// Read configuration from the process environment.
    ///
    /// The key comes from the variant's variable (e.g. `OPENROUTER_KEY`),
    /// falling back to `CHATWIRE_API_KEY`. A missing key is left as `None`
    /// so that client construction reports it.
    pub fn from_env(variant: ApiVariant) -> Self {
        Self::from_lookup(variant, |name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(variant: ApiVariant, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::unauthenticated(variant);
        config.api_key = lookup(variant.api_key_env()).or_else(|| lookup(ENV_API_KEY));
        config.base_url = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty());

        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            match raw.trim().parse::<u32>() {
                Ok(n) => config.retry.max_retries = n,
                Err(e) => warn!("Ignoring {ENV_MAX_RETRIES}={raw:?}: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_RETRY_DELAY_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.retry.base_delay = Duration::from_millis(ms),
                Err(e) => warn!("Ignoring {ENV_RETRY_DELAY_MS}={raw:?}: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_SYSTEM_PROXY) {
            config.transport.use_system_proxy = parse_flag(&raw);
        }
        config
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry.base_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.transport.use_system_proxy = enabled;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_app_attribution(
        mut self,
        app_url: impl Into<String>,
        app_title: impl Into<String>,
    ) -> Self {
        self.app_url = app_url.into();
        self.app_title = app_title.into();
        self
    }

    /// Base URL in effect, without a trailing slash.
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(self.variant.default_base_url())
            .trim_end_matches('/')
    }

    /// Full URL for an endpoint path such as `/chat/completions`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.resolved_base_url())
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
