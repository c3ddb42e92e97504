//! Shared conversation types for the Senti gateway.
//!
//! Everything that crosses a crate boundary between the gateway, the
//! provider adapters and the sentiment classifier lives here.

pub mod chat;
pub mod types;

pub use chat::ChatRequest;
pub use types::{HistoryEntry, Role, Sentiment};
