use async_trait::async_trait;
use senti_core::ChatRequest;
use serde_json::{json, Value};

use crate::error::{LLMError, Result};
use crate::provider::{
    BaseClient, ProviderAdapter, ProviderCapabilities, ProviderConfig, ProviderMetadata,
    IMAGE_PROMPT,
};
use crate::providers::{chat_messages, encode_image};
use crate::stream::{ndjson_text_stream, TextStream};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/chat";
pub const DEFAULT_MODEL: &str = "llama2";
const CHAT_PATH: &str = "/api/chat";

/// Local Ollama server (`/api/chat`, NDJSON streaming)
pub struct OllamaProvider {
    config: ProviderConfig,
    base: BaseClient,
    metadata: ProviderMetadata,
}

impl OllamaProvider {
    pub fn with_config(mut config: ProviderConfig) -> Result<Self> {
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }
        let base = BaseClient::new(&config, "api-key")?;
        let metadata = ProviderMetadata::new(
            config.provider_id.clone(),
            "Ollama",
            ProviderCapabilities::all(),
        );
        Ok(Self {
            config,
            base,
            metadata,
        })
    }

    /// Default local endpoint
    pub fn local() -> Result<Self> {
        Self::with_config(ProviderConfig::new("ollama", DEFAULT_ENDPOINT))
    }

    /// Accepts either the server root or the full chat endpoint
    fn url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with(CHAT_PATH) {
            base.to_string()
        } else {
            format!("{}{}", base, CHAT_PATH)
        }
    }

    fn build_body(&self, model: &str, messages: Vec<Value>, stream: bool) -> Value {
        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(temperature) = self.config.temperature {
            body["options"] = json!({ "temperature": temperature });
        }
        body
    }
}

fn message_content(value: &Value) -> Option<String> {
    value
        .pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn is_done(value: &Value) -> bool {
    value.get("done").and_then(Value::as_bool).unwrap_or(false)
}

fn parse_response(value: &Value) -> Result<String> {
    if let Some(message) = crate::provider::base::embedded_error(value) {
        return Err(LLMError::Api {
            status: 200,
            message,
        });
    }
    message_content(value).ok_or_else(|| LLMError::Parse("missing message.content".to_string()))
}

#[async_trait]
impl ProviderAdapter for OllamaProvider {
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
        let body = self.build_body(
            request.model_or(&self.config.model),
            chat_messages(request),
            false,
        );
        let response = self.base.post_json(&self.url(), &body).await?;
        parse_response(&response)
    }

    async fn generate_stream(&self, request: &ChatRequest) -> Result<TextStream> {
        let body = self.build_body(
            request.model_or(&self.config.model),
            chat_messages(request),
            true,
        );
        let response = self.base.post(&self.url(), &body).await?;
        Ok(ndjson_text_stream(response, message_content, is_done))
    }

    async fn analyze_image(&self, image: &[u8]) -> Result<String> {
        let (_, data) = encode_image(image);
        let messages = vec![json!({
            "role": "user",
            "content": IMAGE_PROMPT,
            "images": [data],
        })];
        let body = self.build_body(self.config.vision_model(), messages, false);
        let response = self.base.post_json(&self.url(), &body).await?;
        parse_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::collect_text;
    use mockito::Matcher;

    fn provider(url: &str) -> OllamaProvider {
        OllamaProvider::with_config(ProviderConfig::new("ollama", url).with_model("llama2")).unwrap()
    }

    #[test]
    fn test_url_normalization() {
        assert_eq!(
            provider("http://localhost:11434").url(),
            "http://localhost:11434/api/chat"
        );
        assert_eq!(
            provider("http://localhost:11434/api/chat/").url(),
            "http://localhost:11434/api/chat"
        );
    }

    #[tokio::test]
    async fn test_generate() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::PartialJson(json!({"model": "llama2", "stream": false})))
            .with_body(json!({"message": {"role": "assistant", "content": "Hey"}, "done": true}).to_string())
            .create_async()
            .await;

        let reply = provider(&server.url())
            .generate(&ChatRequest::new("hi"))
            .await
            .unwrap();
        assert_eq!(reply, "Hey");
    }

    #[tokio::test]
    async fn test_stream_ndjson() {
        let mut server = mockito::Server::new_async().await;
        let body = [
            json!({"message": {"content": "He"}, "done": false}),
            json!({"message": {"content": "llo"}, "done": false}),
            json!({"message": {"content": ""}, "done": true}),
        ]
        .iter()
        .map(|v| format!("{}\n", v))
        .collect::<String>();
        let _m = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::PartialJson(json!({"stream": true})))
            .with_header("content-type", "application/x-ndjson")
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
    async fn test_error_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/chat")
            .with_status(404)
            .with_body(json!({"error": "model 'nope' not found"}).to_string())
            .create_async()
            .await;

        let err = provider(&server.url())
            .generate(&ChatRequest::new("hi").with_model("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::Api { status: 404, message } if message.contains("not found")));
    }

    #[tokio::test]
    async fn test_analyze_image_sends_images() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::Regex(r#""images":\["#.to_string()))
            .with_body(json!({"message": {"content": "a tree"}, "done": true}).to_string())
            .create_async()
            .await;

        let reply = provider(&server.url()).analyze_image(b"pixels").await.unwrap();
        assert_eq!(reply, "a tree");
    }
}
