use std::time::Duration;

use crate::config::{Config, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Default connect and read timeout for API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything a provider needs to talk to the chat-completions endpoint.
#[derive(Clone, PartialEq)]
pub struct ProviderSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub stream: bool,
    pub timeout: Duration,
}

impl ProviderSettings {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            stream: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Builds settings from a loaded config and an already resolved key.
    pub fn from_config(config: &Config, api_key: String, model_override: Option<&str>) -> Self {
        Self {
            api_key,
            model: config.resolve_model(model_override),
            base_url: config.base_url(),
            stream: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::new("", DEFAULT_MODEL)
    }
}

// Keeps the key out of logs and panics.
impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("stream", &self.stream)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_uses_overrides() {
        let config = Config {
            model: Some("openai/gpt-4o-mini".to_string()),
            base_url: Some("http://127.0.0.1:9000/v1".to_string()),
            ..Default::default()
        };

        let settings = ProviderSettings::from_config(&config, "sk".to_string(), None);
        assert_eq!(settings.model, "openai/gpt-4o-mini");
        assert_eq!(
            settings.completions_url(),
            "http://127.0.0.1:9000/v1/chat/completions"
        );

        let settings = ProviderSettings::from_config(&config, "sk".to_string(), Some("x/y"));
        assert_eq!(settings.model, "x/y");
        assert!(settings.stream);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let settings = ProviderSettings::new("sk-or-secret", DEFAULT_MODEL);
        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-or-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
