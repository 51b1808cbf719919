//! Supported API flavors.
//!
//! Both speak the OpenAI chat-completions wire format; they differ only in
//! base URL, key variable, and a few headers. Those differences are data on
//! [`ApiVariant`] so the executor and decoder stay shared.

use std::fmt;
use std::str::FromStr;

/// Path of the chat-completions endpoint, relative to the base URL.
pub const COMPLETIONS_PATH: &str = "/chat/completions";

/// Path of the model-listing endpoint, relative to the base URL.
pub const MODELS_PATH: &str = "/models";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVariant {
    #[default]
    OpenRouter,
    OpenAi,
}

impl ApiVariant {
    pub fn name(self) -> &'static str {
        match self {
            ApiVariant::OpenRouter => "openrouter",
            ApiVariant::OpenAi => "openai",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ApiVariant::OpenRouter => "https://openrouter.ai/api/v1",
            ApiVariant::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(self) -> &'static str {
        match self {
            ApiVariant::OpenRouter => "OPENROUTER_KEY",
            ApiVariant::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn completions_path(self) -> &'static str {
        COMPLETIONS_PATH
    }

    pub fn models_path(self) -> &'static str {
        MODELS_PATH
    }

    /// Variant-specific headers sent with every request.
    ///
    /// OpenRouter uses `HTTP-Referer` and `X-Title` for app attribution.
    pub fn extra_headers(self, app_url: &str, app_title: &str) -> Vec<(String, String)> {
        match self {
            ApiVariant::OpenRouter => vec![
                ("HTTP-Referer".to_string(), app_url.to_string()),
                ("X-Title".to_string(), app_title.to_string()),
            ],
            ApiVariant::OpenAi => Vec::new(),
        }
    }
}

impl fmt::Display for ApiVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ApiVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openrouter" => Ok(ApiVariant::OpenRouter),
            "openai" => Ok(ApiVariant::OpenAi),
            other => Err(format!(
                "unknown API variant '{other}' (expected 'openrouter' or 'openai')"
            )),
        }
    }
}
