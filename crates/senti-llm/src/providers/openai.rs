use async_trait::async_trait;
use senti_core::ChatRequest;
use serde_json::{json, Value};

use crate::error::{LLMError, Result};
use crate::provider::{
    BaseClient, ProviderAdapter, ProviderCapabilities, ProviderConfig, ProviderMetadata,
    IMAGE_PROMPT,
};
use crate::providers::{chat_messages, choice_content, encode_image};
use crate::stream::{sse_text_stream, TextStream};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI Provider
/// Uses OpenAI API or compatible `/chat/completions` endpoints
pub struct OpenAiProvider {
    config: ProviderConfig,
    base: BaseClient,
    metadata: ProviderMetadata,
}

impl OpenAiProvider {
    pub fn with_config(mut config: ProviderConfig) -> Result<Self> {
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }
        let base = BaseClient::new(&config, "api-key")?;
        let metadata = ProviderMetadata::new(
            config.provider_id.clone(),
            "OpenAI",
            ProviderCapabilities::all(),
        );
        Ok(Self {
            config,
            base,
            metadata,
        })
    }

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(
            ProviderConfig::new("openai", DEFAULT_BASE_URL).with_bearer_token(api_key),
        )
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": request.model_or(&self.config.model),
            "messages": chat_messages(request),
        });
        if stream {
            body["stream"] = json!(true);
        }
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

fn delta_content(value: &Value) -> Option<String> {
    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_response(value: &Value) -> Result<String> {
    choice_content(value)
        .ok_or_else(|| LLMError::Parse("missing choices[0].message.content".to_string()))
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
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
        let response = self
            .base
            .post_json(&self.url(), &self.build_body(request, false))
            .await?;
        parse_response(&response)
    }

    async fn generate_stream(&self, request: &ChatRequest) -> Result<TextStream> {
        let response = self
            .base
            .post(&self.url(), &self.build_body(request, true))
            .await?;
        Ok(sse_text_stream(response, delta_content))
    }

    async fn analyze_image(&self, image: &[u8]) -> Result<String> {
        let (mime_type, data) = encode_image(image);
        let body = json!({
            "model": self.config.vision_model(),
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": IMAGE_PROMPT },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:{};base64,{}", mime_type, data) },
                    },
                ],
            }],
        });
        let response = self.base.post_json(&self.url(), &body).await?;
        parse_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::collect_text;
    use mockito::Matcher;

    fn provider(url: &str) -> OpenAiProvider {
        OpenAiProvider::with_config(
            ProviderConfig::new("openai", url)
                .with_bearer_token("sk-test")
                .with_model("gpt-test")
                .with_vision_model("gpt-vision"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-test"})))
            .with_body(json!({"choices": [{"message": {"content": "Hi there"}}]}).to_string())
            .create_async()
            .await;

        let reply = provider(&server.url())
            .generate(&ChatRequest::new("hi"))
            .await
            .unwrap();
        assert_eq!(reply, "Hi there");
    }

    #[tokio::test]
    async fn test_stream() {
        let mut server = mockito::Server::new_async().await;
        let body = [
            json!({"choices": [{"delta": {"role": "assistant"}}]}),
            json!({"choices": [{"delta": {"content": "He"}}]}),
            json!({"choices": [{"delta": {"content": "llo"}}]}),
        ]
        .iter()
        .map(|v| format!("data: {}\n\n", v))
        .collect::<String>()
            + "data: [DONE]\n\n";
        let _m = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({"stream": true})))
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let stream = provider(&server.url())
            .generate_stream(&ChatRequest::new("hi"))
            .await
            .unwrap();
        assert_eq!(collect_text(stream).await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_analyze_image_sends_data_url() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"model": "gpt-vision"})),
                Matcher::Regex("data:image/jpeg;base64,".to_string()),
            ]))
            .with_body(json!({"choices": [{"message": {"content": "a dog"}}]}).to_string())
            .create_async()
            .await;

        let reply = provider(&server.url())
            .analyze_image(b"\xFF\xD8\xFFjpeg")
            .await
            .unwrap();
        assert_eq!(reply, "a dog");
    }

    #[tokio::test]
    async fn test_missing_content() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_body(json!({"choices": []}).to_string())
            .create_async()
            .await;

        let err = provider(&server.url())
            .generate(&ChatRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::Parse(_)));
    }
}
