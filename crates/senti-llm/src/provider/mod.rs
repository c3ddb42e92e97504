pub mod base;
pub mod config;
pub mod metadata;

pub use base::BaseClient;
pub use config::{AuthConfig, ProviderConfig};
pub use metadata::{ProviderAdapter, ProviderCapabilities, ProviderMetadata, IMAGE_PROMPT};
