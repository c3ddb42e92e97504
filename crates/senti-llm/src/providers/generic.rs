use async_trait::async_trait;
use senti_core::ChatRequest;
use serde_json::{json, Value};

use crate::error::{LLMError, Result};
use crate::provider::{
    BaseClient, ProviderAdapter, ProviderCapabilities, ProviderConfig, ProviderMetadata,
};
use crate::providers::{chat_messages, choice_content};

/// Plain HTTP chat backend, e.g. a llama.cpp server.
///
/// `base_url` is the full endpoint. Requests are single-shot; streaming and
/// image analysis report `Unsupported`.
pub struct GenericChatProvider {
    config: ProviderConfig,
    base: BaseClient,
    metadata: ProviderMetadata,
}

impl GenericChatProvider {
    pub fn with_config(config: ProviderConfig) -> Result<Self> {
        let base = BaseClient::new(&config, "api-key")?;
        let metadata = ProviderMetadata::new(
            config.provider_id.clone(),
            display_name(&config.provider_id),
            ProviderCapabilities::text_only(),
        );
        Ok(Self {
            config,
            base,
            metadata,
        })
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "messages": chat_messages(request),
        });
        let model = request.model_or(&self.config.model);
        if !model.is_empty() {
            body["model"] = json!(model);
        }
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

/// "llama" -> "Llama"
fn display_name(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Generic".to_string(),
    }
}

#[async_trait]
impl ProviderAdapter for GenericChatProvider {
    fn provider_id(&self) -> &str {
        &self.metadata.id
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    fn is_configured(&self) -> bool {
        self.base.is_configured() && !self.config.base_url.trim().is_empty()
    }

    async fn generate(&self, request: &ChatRequest) -> Result<String> {
        let response = self
            .base
            .post_json(&self.config.base_url, &self.build_body(request))
            .await?;
        choice_content(&response)
            .ok_or_else(|| LLMError::Parse("missing choices[0].message.content".to_string()))
    }
}
