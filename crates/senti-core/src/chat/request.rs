use crate::types::{HistoryEntry, Sentiment};

/// A single generation request handed to a provider adapter
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Current user text
    pub text: String,
    /// Prior turns, read-only
    pub history: Vec<HistoryEntry>,
    pub sentiment: Option<Sentiment>,
    /// Per-request model override
    pub model: Option<String>,
}

impl ChatRequest {
    /// Create a new chat request
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Model to use, falling back to the adapter's configured default
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model.as_deref().filter(|m| !m.is_empty()).unwrap_or(default)
    }

    /// Build the outgoing conversation for this request.
    ///
    /// The result is a fresh vector: history, then the user turn, then the
    /// sentiment context as a system entry when one was attached. `history`
    /// itself is never modified, so a later request sharing the same history
    /// does not see this request's sentiment.
    pub fn messages(&self) -> Vec<HistoryEntry> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.extend(self.history.iter().cloned());
        messages.push(HistoryEntry::user(self.text.clone()));
        if let Some(sentiment) = self.sentiment {
            messages.push(HistoryEntry::system(sentiment.context_line()));
        }
        messages
    }
}
