//! Wire protocol
//!
//! JSON frames exchanged with clients over the WebSocket.

use senti_core::HistoryEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `type` value sent by the older chat widget
pub const LEGACY_CHAT_KIND: &str = "chat_message";

/// A client request
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InboundMessage {
    /// `chat_message` selects the legacy reply shape; anything else is ignored
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_text_only")]
    pub is_text_only: bool,
    /// Base64 image, optionally as a `data:` URL
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

fn default_text_only() -> bool {
    true
}

impl InboundMessage {
    pub fn text(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    pub fn is_legacy_chat(&self) -> bool {
        self.kind.as_deref() == Some(LEGACY_CHAT_KIND)
    }

    /// Provider requested by the client. Legacy clients name it in `model`.
    pub fn provider_name(&self) -> Option<&str> {
        match (&self.provider, self.is_legacy_chat()) {
            (Some(provider), _) => Some(provider.as_str()),
            (None, true) => self.model.as_deref(),
            (None, false) => None,
        }
    }

    /// Model override, unless `model` was consumed as the provider name
    pub fn model_override(&self) -> Option<&str> {
        if self.is_legacy_chat() && self.provider.is_none() {
            None
        } else {
            self.model.as_deref()
        }
    }

    /// Image to analyze, when the client asked for one
    pub fn image_payload(&self) -> Option<&str> {
        if self.is_text_only {
            return None;
        }
        self.image.as_deref().filter(|i| !i.trim().is_empty())
    }
}

/// Why a frame was rejected before reaching a provider
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid JSON format")]
    InvalidJson,
    #[error("Invalid message format: {0}")]
    InvalidShape(String),
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Invalid image data")]
    InvalidImage,
}

/// Decode and validate one text frame
pub fn parse_inbound(raw: &str) -> Result<InboundMessage, ValidationError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ValidationError::InvalidJson)?;
    if !value.is_object() {
        return Err(ValidationError::InvalidShape(
            "expected a JSON object".to_string(),
        ));
    }

    let message: InboundMessage = serde_json::from_value(value)
        .map_err(|e| ValidationError::InvalidShape(e.to_string()))?;

    if message.text().trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    Ok(message)
}

/// A frame sent to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// One streamed chunk, or the closing `done` marker with empty content
    Stream { content: String, done: bool },
    /// Complete single-shot reply
    Response { content: String, done: bool },
    /// Reply to a legacy `chat_message` request
    ChatResponse { response: String, model: String },
    Error { content: String },
}

impl OutboundFrame {
    pub fn stream_chunk(content: impl Into<String>) -> Self {
        Self::Stream {
            content: content.into(),
            done: false,
        }
    }

    pub fn stream_done() -> Self {
        Self::Stream {
            content: String::new(),
            done: true,
        }
    }

    pub fn response(content: impl Into<String>) -> Self {
        Self::Response {
            content: content.into(),
            done: true,
        }
    }

    pub fn chat_response(response: impl Into<String>, model: impl Into<String>) -> Self {
        Self::ChatResponse {
            response: response.into(),
            model: model.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    /// Whether this frame ends an exchange
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Stream { done, .. } | Self::Response { done, .. } => *done,
            Self::ChatResponse { .. } | Self::Error { .. } => true,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use senti_core::Role;

    #[test]
    fn test_parse_full_message() {
        let raw = r#"{
            "message": "hello",
            "history": [{"role": "user", "content": "hi"}, {"role": "model", "content": "yo"}],
            "provider": "ollama",
            "model": "mistral",
            "stream": true,
            "is_text_only": false,
            "platform": "android"
        }"#;
        let msg = parse_inbound(raw).unwrap();
        assert_eq!(msg.text(), "hello");
        assert_eq!(msg.history.as_ref().unwrap()[1].role, Role::Assistant);
        assert_eq!(msg.provider_name(), Some("ollama"));
        assert_eq!(msg.model_override(), Some("mistral"));
        assert!(msg.stream);
        assert!(!msg.is_text_only);
        assert_eq!(msg.platform.as_deref(), Some("android"));
    }

    #[test]
    fn test_defaults() {
        let msg = parse_inbound(r#"{"message": "x", "history": null}"#).unwrap();
        assert!(!msg.stream);
        assert!(msg.is_text_only);
        assert!(msg.history.is_none());
        assert_eq!(msg.provider_name(), None);
    }

    #[test]
    fn test_legacy_model_names_provider() {
        let msg = parse_inbound(r#"{"type": "chat_message", "message": "x", "model": "openai"}"#)
            .unwrap();
        assert!(msg.is_legacy_chat());
        assert_eq!(msg.provider_name(), Some("openai"));
        assert_eq!(msg.model_override(), None);
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(parse_inbound("{not json"), Err(ValidationError::InvalidJson));
        assert_eq!(
            parse_inbound(r#"{"message": "   "}"#),
            Err(ValidationError::EmptyMessage)
        );
        assert_eq!(parse_inbound(r#"{}"#), Err(ValidationError::EmptyMessage));
        assert!(matches!(
            parse_inbound(r#"["message"]"#),
            Err(ValidationError::InvalidShape(_))
        ));
        assert!(matches!(
            parse_inbound(r#"{"message": 42}"#),
            Err(ValidationError::InvalidShape(_))
        ));

        assert_eq!(ValidationError::InvalidJson.to_string(), "Invalid JSON format");
        assert_eq!(
            ValidationError::EmptyMessage.to_string(),
            "Message cannot be empty"
        );
    }

    #[test]
    fn test_image_payload_requires_flag() {
        let msg = parse_inbound(r#"{"message": "x", "image": "aGk="}"#).unwrap();
        assert_eq!(msg.image_payload(), None);

        let msg = parse_inbound(r#"{"message": "x", "image": "aGk=", "is_text_only": false}"#)
            .unwrap();
        assert_eq!(msg.image_payload(), Some("aGk="));
    }

    #[test]
    fn test_outbound_wire_shape() {
        assert_eq!(
            OutboundFrame::stream_chunk("He").to_json().unwrap(),
            r#"{"type":"stream","content":"He","done":false}"#
        );
        assert_eq!(
            OutboundFrame::response("ok").to_json().unwrap(),
            r#"{"type":"response","content":"ok","done":true}"#
        );
        assert_eq!(
            OutboundFrame::chat_response("ok", "gemini").to_json().unwrap(),
            r#"{"type":"chat_response","response":"ok","model":"gemini"}"#
        );
        assert_eq!(
            OutboundFrame::error("bad").to_json().unwrap(),
            r#"{"type":"error","content":"bad"}"#
        );
    }

    #[test]
    fn test_terminal_frames() {
        assert!(!OutboundFrame::stream_chunk("a").is_terminal());
        assert!(OutboundFrame::stream_done().is_terminal());
        assert!(OutboundFrame::response("a").is_terminal());
        assert!(OutboundFrame::error("a").is_terminal());
    }
}
