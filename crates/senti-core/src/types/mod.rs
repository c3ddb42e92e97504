pub mod message;
pub mod sentiment;

pub use message::{HistoryEntry, Role};
pub use sentiment::Sentiment;
