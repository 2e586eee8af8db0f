//! Relay configuration.
//!
//! [`RelayConfig`] is built once at process start (usually with
//! [`RelayConfig::from_env`]) and handed to the
//! [`PageGenerator`](crate::generate::PageGenerator). Nothing in the relay
//! reads the environment after that.
//!
//! ```ignore
//! let config = RelayConfig::from_env()
//!     .with_model("gpt-4o-mini")
//!     .with_retry(RetryConfig::with_retries(2));
//! ```

use crate::api::retry::RetryConfig;
use crate::{DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

/// Environment variable holding the bearer credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
/// Environment variable overriding [`DEFAULT_MODEL`].
pub const MODEL_VAR: &str = "OPENAI_MODEL";

/// Everything one relay session needs to reach the upstream API.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bearer credential. `None` makes every request fail with a 500 document.
    pub api_key: Option<String>,
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model identifier. Default: `"gpt-3.5-turbo"`.
    pub model: String,
    /// Sampling temperature. Default: `0.7`.
    pub temperature: f32,
    /// Maximum tokens per completion. Default: `2000`.
    pub max_tokens: u32,
    /// Attempt budget, per-attempt deadline, and backoff.
    pub retry: RetryConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            retry: RetryConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Read the key, base URL and model from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the key, base URL and model through `lookup`. Empty values are
    /// treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            api_key: get(API_KEY_VAR),
            base_url: get(BASE_URL_VAR).unwrap_or(defaults.base_url),
            model: get(MODEL_VAR).unwrap_or(defaults.model),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Whether a non-empty API key is configured.
    pub fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// `{base_url}/chat/completions`, tolerating a trailing slash on the base.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = RelayConfig::default();
        assert!(config.api_key.is_none());
        assert!(!config.has_credential());
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.max_tokens, 2000);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn from_lookup_reads_overrides() {
        let config = RelayConfig::from_lookup(lookup(&[
            (API_KEY_VAR, "sk-live"),
            (BASE_URL_VAR, "http://localhost:8080/v1/"),
            (MODEL_VAR, "gpt-4o-mini"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("sk-live"));
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(
            config.chat_completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = RelayConfig::from_lookup(lookup(&[(API_KEY_VAR, "  "), (MODEL_VAR, "")]));
        assert!(config.api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn blank_key_set_directly_is_not_a_credential() {
        let config = RelayConfig::default().with_api_key("");
        assert!(!config.has_credential());
    }
}
