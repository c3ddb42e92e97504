//! Provider adapters for the Senti gateway.
//!
//! Each backend implements [`ProviderAdapter`]; the [`ProviderRegistry`]
//! maps client-supplied provider names onto adapters.

pub mod error;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod stream;

pub use error::{LLMError, Result};
pub use provider::{
    AuthConfig, BaseClient, ProviderAdapter, ProviderCapabilities, ProviderConfig,
    ProviderMetadata, IMAGE_PROMPT,
};
pub use providers::{GeminiProvider, GenericChatProvider, OllamaProvider, OpenAiProvider};
pub use registry::{build_adapter, ProviderRegistry};
pub use stream::TextStream;
