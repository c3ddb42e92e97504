use async_trait::async_trait;
use senti_core::{ChatRequest, Role};
use serde_json::{json, Value};

use crate::error::{LLMError, Result};
use crate::provider::{
    BaseClient, ProviderAdapter, ProviderCapabilities, ProviderConfig, ProviderMetadata,
    IMAGE_PROMPT,
};
use crate::providers::encode_image;
use crate::stream::{sse_text_stream, TextStream};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Google Gemini (`generateContent` REST API)
pub struct GeminiProvider {
    config: ProviderConfig,
    base: BaseClient,
    metadata: ProviderMetadata,
}

impl GeminiProvider {
    pub fn with_config(mut config: ProviderConfig) -> Result<Self> {
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }
        let base = BaseClient::new(&config, "x-goog-api-key")?;
        let metadata = ProviderMetadata::new(
            config.provider_id.clone(),
            "Gemini",
            ProviderCapabilities::all(),
        );
        Ok(Self {
            config,
            base,
            metadata,
        })
    }

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(ProviderConfig::new("gemini", DEFAULT_BASE_URL).with_api_key(api_key))
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    /// Gemini only accepts `user` and `model` turns; system entries go to
    /// `systemInstruction`.
    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut contents = Vec::new();
        let mut system = Vec::new();

        for message in request.messages() {
            match message.role {
                Role::System => system.push(message.content),
                Role::User => contents.push(json!({
                    "role": "user",
                    "parts": [{ "text": message.content }],
                })),
                Role::Assistant => contents.push(json!({
                    "role": "model",
                    "parts": [{ "text": message.content }],
                })),
            }
        }

        let mut body = json!({ "contents": contents });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n") }] });
        }
        if let Some(temperature) = self.config.temperature {
            body["generationConfig"] = json!({ "temperature": temperature });
        }
        body
    }
}

/// Concatenated text parts of the first candidate
fn candidate_text(value: &Value) -> Option<String> {
    let parts = value.pointer("/candidates/0/content/parts")?.as_array()?;
    Some(
        parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect(),
    )
}

fn parse_response(value: &Value) -> Result<String> {
    if let Some(text) = candidate_text(value) {
        return Ok(text);
    }
    match value.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
        Some(reason) => Err(LLMError::Api {
            status: 200,
            message: format!("prompt blocked: {}", reason),
        }),
        None => Err(LLMError::Parse("no candidates in response".to_string())),
    }
}

#[async_trait]
impl ProviderAdapter for GeminiProvider {
    fn provider_id(&self) -> &str {
        &self.metadata.id
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    fn is_configured(&self) -> bool {
        self.base.is_configured()
    }

    async fn generate(&self, request: &ChatRequest) -> Result<String> {
        let model = request.model_or(&self.config.model);
        let body = self.build_body(request);
        let response = self
            .base
            .post_json(&self.url(model, "generateContent"), &body)
            .await?;
        parse_response(&response)
    }

    async fn generate_stream(&self, request: &ChatRequest) -> Result<TextStream> {
        let model = request.model_or(&self.config.model);
        let body = self.build_body(request);
        let url = format!("{}?alt=sse", self.url(model, "streamGenerateContent"));
        let response = self.base.post(&url, &body).await?;
        Ok(sse_text_stream(response, candidate_text))
    }

    async fn analyze_image(&self, image: &[u8]) -> Result<String> {
        let (mime_type, data) = encode_image(image);
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": IMAGE_PROMPT },
                    { "inline_data": { "mime_type": mime_type, "data": data } },
                ],
            }],
        });
        let response = self
            .base
            .post_json(&self.url(self.config.vision_model(), "generateContent"), &body)
            .await?;
        parse_response(&response)
    }
}
