use senti_config::{AuthSettings, ProviderSettings};
use std::collections::HashMap;
use std::time::Duration;

/// Resolved credentials for a provider
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthConfig {
    /// Sent in a provider-specific header (`x-goog-api-key` for Gemini)
    ApiKey { key: String },
    /// `Authorization: Bearer <token>`
    Bearer { token: String },
    /// Credential expected from the named environment variable but absent
    Missing { env: String },
    #[default]
    None,
}

/// Provider configuration, with environment lookups already applied
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Registry name, e.g. "gemini" or "llama"
    pub provider_id: String,
    /// Base URL, or the full endpoint for generic chat backends
    pub base_url: String,
    pub auth: AuthConfig,
    /// Default model
    pub model: String,
    /// Model used by `analyze_image`; falls back to `model`
    pub vision_model: Option<String>,
    pub temperature: Option<f64>,
    pub timeout: Duration,
    /// Transient-failure retries; 0 disables retrying
    pub max_retries: u32,
    pub headers: HashMap<String, String>,
}

impl ProviderConfig {
    pub fn new(provider_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            base_url: base_url.into(),
            auth: AuthConfig::None,
            model: String::new(),
            vision_model: None,
            temperature: None,
            timeout: Duration::from_secs(60),
            max_retries: 0,
            headers: HashMap::new(),
        }
    }

    /// Build from file settings, reading credentials and overrides from the environment
    pub fn from_settings(name: &str, settings: &ProviderSettings) -> Self {
        let auth = match &settings.auth {
            AuthSettings::ApiKey { env } => match settings.credential() {
                Some(key) => AuthConfig::ApiKey { key },
                None => AuthConfig::Missing { env: env.clone() },
            },
            AuthSettings::Bearer { env } => match settings.credential() {
                Some(token) => AuthConfig::Bearer { token },
                None => AuthConfig::Missing { env: env.clone() },
            },
            AuthSettings::None => AuthConfig::None,
        };

        let mut config = Self::new(name, settings.resolved_base_url());
        config.auth = auth;
        config.model = settings.resolved_model().unwrap_or_default();
        config.vision_model = settings.vision_model.clone();
        config.temperature = settings.temperature;
        config.max_retries = settings.max_retries.unwrap_or(0);
        if let Some(secs) = settings.timeout_seconds {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(headers) = &settings.headers {
            config.headers = headers.clone();
        }
        config
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.auth = AuthConfig::ApiKey { key: key.into() };
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthConfig::Bearer {
            token: token.into(),
        };
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Model for image analysis
    pub fn vision_model(&self) -> &str {
        self.vision_model.as_deref().unwrap_or(&self.model)
    }

    pub fn has_credentials(&self) -> bool {
        !matches!(self.auth, AuthConfig::Missing { .. })
    }
}
