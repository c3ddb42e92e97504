use senti_config::{LlmConfig, ProviderKind, ProviderSettings};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{LLMError, Result};
use crate::provider::{ProviderAdapter, ProviderConfig};
use crate::providers::{GeminiProvider, GenericChatProvider, OllamaProvider, OpenAiProvider};

/// Name -> adapter lookup with a mandatory default.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Clone)]
pub struct ProviderRegistry {
    default_name: String,
    default: Arc<dyn ProviderAdapter>,
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    /// Configured but switched off; reported as unavailable
    disabled: BTreeSet<String>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("default", &self.default_name)
            .field("providers", &self.names())
            .field("disabled", &self.disabled)
            .finish()
    }
}

impl ProviderRegistry {
    /// Create a registry around its default adapter
    pub fn new(default_name: impl Into<String>, default: Arc<dyn ProviderAdapter>) -> Self {
        let default_name = normalize(&default_name.into());
        let mut providers = HashMap::new();
        providers.insert(default_name.clone(), Arc::clone(&default));
        Self {
            default_name,
            default,
            providers,
            disabled: BTreeSet::new(),
        }
    }

    /// Register an adapter under `name`, replacing any previous one
    pub fn register(&mut self, name: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) {
        let name = normalize(&name.into());
        if name == self.default_name {
            self.default = Arc::clone(&adapter);
        }
        self.disabled.remove(&name);
        self.providers.insert(name, adapter);
    }

    /// Build every enabled provider in `config`.
    ///
    /// Fails when the default provider is absent or disabled, or when an
    /// adapter cannot be constructed.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let default_name = normalize(&config.default_provider);

        let mut built = HashMap::new();
        let mut disabled = BTreeSet::new();
        for (name, settings) in &config.providers {
            let name = normalize(name);
            if !settings.enabled {
                disabled.insert(name);
                continue;
            }
            let adapter = build_adapter(&name, settings)?;
            log::info!(
                "registered provider '{}' ({}, configured: {})",
                name,
                settings.kind,
                adapter.is_configured()
            );
            built.insert(name, adapter);
        }

        let default = built.get(&default_name).cloned().ok_or_else(|| {
            LLMError::Config(format!(
                "default provider '{}' is not configured or is disabled",
                config.default_provider
            ))
        })?;

        Ok(Self {
            default_name,
            default,
            providers: built,
            disabled,
        })
    }

    /// Adapter registered under `name`, or the default for unknown or absent names
    pub fn resolve(&self, name: Option<&str>) -> Arc<dyn ProviderAdapter> {
        let Some(name) = name.map(normalize).filter(|n| !n.is_empty()) else {
            return Arc::clone(&self.default);
        };
        match self.providers.get(&name) {
            Some(adapter) => Arc::clone(adapter),
            None => {
                log::debug!(
                    "unknown provider '{}', using default '{}'",
                    name,
                    self.default_name
                );
                Arc::clone(&self.default)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(&normalize(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(&normalize(name))
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// `{name: usable}` for every known provider, disabled ones included as `false`
    pub fn configured(&self) -> BTreeMap<String, bool> {
        let mut status: BTreeMap<String, bool> = self
            .providers
            .iter()
            .map(|(name, adapter)| (name.clone(), adapter.is_configured()))
            .collect();
        for name in &self.disabled {
            status.entry(name.clone()).or_insert(false);
        }
        status
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Construct the adapter for one configured provider
pub fn build_adapter(name: &str, settings: &ProviderSettings) -> Result<Arc<dyn ProviderAdapter>> {
    let config = ProviderConfig::from_settings(name, settings);
    let adapter: Arc<dyn ProviderAdapter> = match settings.kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::with_config(config)?),
        ProviderKind::Openai => Arc::new(OpenAiProvider::with_config(config)?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::with_config(config)?),
        ProviderKind::Generic => Arc::new(GenericChatProvider::with_config(config)?),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use senti_config::AuthSettings;

    fn llm_config() -> LlmConfig {
        let mut providers = HashMap::new();
        providers.insert(
            "ollama".to_string(),
            ProviderSettings::new(
                ProviderKind::Ollama,
                "http://localhost:11434",
                "llama2",
                AuthSettings::None,
            ),
        );
        providers.insert(
            "gemini".to_string(),
            ProviderSettings::new(
                ProviderKind::Gemini,
                "https://example.test/v1beta",
                "gemini-2.0-flash-exp",
                AuthSettings::ApiKey {
                    env: "SENTI_REGISTRY_TEST_UNSET".to_string(),
                },
            ),
        );
        let mut llama = ProviderSettings::new(
            ProviderKind::Generic,
            "http://localhost:8000/v1/chat/completions",
            "llama-2-7b-chat",
            AuthSettings::None,
        );
        llama.enabled = false;
        providers.insert("llama".to_string(), llama);

        LlmConfig {
            default_provider: "ollama".to_string(),
            providers,
        }
    }

    #[test]
    fn test_from_config_and_resolve() {
        let registry = ProviderRegistry::from_config(&llm_config()).unwrap();
        assert_eq!(registry.names(), vec!["gemini", "ollama"]);
        assert_eq!(registry.default_name(), "ollama");

        assert_eq!(registry.resolve(Some("gemini")).provider_id(), "gemini");
        assert_eq!(registry.resolve(Some("GEMINI ")).provider_id(), "gemini");
        assert_eq!(registry.resolve(Some("anthropic")).provider_id(), "ollama");
        assert_eq!(registry.resolve(Some("")).provider_id(), "ollama");
        assert_eq!(registry.resolve(None).provider_id(), "ollama");
        // disabled providers fall back too
        assert_eq!(registry.resolve(Some("llama")).provider_id(), "ollama");
    }

    #[test]
    fn test_configured_status() {
        let registry = ProviderRegistry::from_config(&llm_config()).unwrap();
        let status = registry.configured();
        assert_eq!(status.get("ollama"), Some(&true));
        assert_eq!(status.get("gemini"), Some(&false));
        assert_eq!(status.get("llama"), Some(&false));
    }

    #[test]
    fn test_missing_default_fails() {
        let mut config = llm_config();
        config.default_provider = "llama".to_string();
        let err = ProviderRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, LLMError::Config(_)));

        config.default_provider = "nowhere".to_string();
        assert!(ProviderRegistry::from_config(&config).is_err());
    }

    #[test]
    fn test_default_config_builds() {
        let registry = ProviderRegistry::from_config(&LlmConfig::default()).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.default_name(), "gemini");
        assert!(!registry.resolve(Some("llama")).supports_streaming());
        assert!(registry.resolve(Some("openai")).supports_streaming());
    }
}
