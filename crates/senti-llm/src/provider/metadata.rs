use async_trait::async_trait;
use senti_core::ChatRequest;

use crate::error::{LLMError, Result};
use crate::stream::TextStream;

/// Prompt sent alongside an image when no text accompanies it
pub const IMAGE_PROMPT: &str = "Describe this image in detail.";

/// A backend that can generate text.
///
/// Adapters are stateless between calls and shared behind `Arc`, so
/// concurrent calls on one instance must be safe. Returned streams are lazy:
/// dropping one releases the underlying HTTP response.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Registry name
    fn provider_id(&self) -> &str;

    fn metadata(&self) -> &ProviderMetadata;

    /// Whether credentials and endpoint are present
    fn is_configured(&self) -> bool {
        true
    }

    fn supports_streaming(&self) -> bool {
        self.metadata().capabilities.streaming
    }

    fn supports_vision(&self) -> bool {
        self.metadata().capabilities.vision
    }

    /// Generate a complete reply
    async fn generate(&self, request: &ChatRequest) -> Result<String>;

    /// Generate a reply as a finite, non-restartable sequence of chunks
    async fn generate_stream(&self, _request: &ChatRequest) -> Result<TextStream> {
        Err(LLMError::Unsupported(format!(
            "{} does not support streaming",
            self.metadata().name
        )))
    }

    /// Describe an image
    async fn analyze_image(&self, _image: &[u8]) -> Result<String> {
        Err(LLMError::Unsupported(format!(
            "{} does not support image analysis",
            self.metadata().name
        )))
    }
}

/// Provider metadata
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    /// Provider ID
    pub id: String,
    /// Human-readable name, used in error messages
    pub name: String,
    pub capabilities: ProviderCapabilities,
}

impl ProviderMetadata {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        capabilities: ProviderCapabilities,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capabilities,
        }
    }
}

/// Provider capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Supports streaming responses
    pub streaming: bool,
    /// Supports image inputs
    pub vision: bool,
}

impl ProviderCapabilities {
    pub fn all() -> Self {
        Self {
            streaming: true,
            vision: true,
        }
    }

    pub fn text_only() -> Self {
        Self {
            streaming: false,
            vision: false,
        }
    }
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self::all()
    }
}
