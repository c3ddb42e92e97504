pub mod gemini;
pub mod generic;
pub mod ollama;
pub mod openai;

pub use gemini::GeminiProvider;
pub use generic::GenericChatProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use base64::Engine;
use senti_core::ChatRequest;
use serde_json::{json, Value};

/// `[{role, content}]` in the OpenAI chat layout, shared by the
/// OpenAI-compatible, Ollama and generic adapters
pub(crate) fn chat_messages(request: &ChatRequest) -> Vec<Value> {
    request
        .messages()
        .into_iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect()
}

/// Sniffed mime type and base64 payload of an image
pub(crate) fn encode_image(image: &[u8]) -> (&'static str, String) {
    let mime = infer::get(image)
        .map(|kind| kind.mime_type())
        .filter(|mime| mime.starts_with("image/"))
        .unwrap_or("image/jpeg");
    let data = base64::engine::general_purpose::STANDARD.encode(image);
    (mime, data)
}

/// `choices[0].message.content`
pub(crate) fn choice_content(value: &Value) -> Option<String> {
    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use senti_core::{HistoryEntry, Sentiment};

    #[test]
    fn test_chat_messages_layout() {
        let request = ChatRequest::new("hello")
            .with_history(vec![HistoryEntry::assistant("earlier")])
            .with_sentiment(Sentiment::Neutral);
        let messages = chat_messages(&request);
        assert_eq!(
            messages,
            vec![
                json!({"role": "assistant", "content": "earlier"}),
                json!({"role": "user", "content": "hello"}),
                json!({"role": "system", "content": "Sentiment Context: neutral"}),
            ]
        );
    }

    #[test]
    fn test_encode_image_sniffs_png() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let (mime, data) = encode_image(&png);
        assert_eq!(mime, "image/png");
        assert!(!data.is_empty());

        let (mime, _) = encode_image(b"not an image");
        assert_eq!(mime, "image/jpeg");
    }
}
