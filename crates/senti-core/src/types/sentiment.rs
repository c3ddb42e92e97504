use serde::{Deserialize, Serialize};

/// Polarity above this is positive
pub const POSITIVE_THRESHOLD: f64 = 0.2;
/// Polarity below this is negative
pub const NEGATIVE_THRESHOLD: f64 = -0.2;

/// Coarse sentiment label attached to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Map a polarity score in [-1, 1] to a label. Both thresholds are strict.
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > POSITIVE_THRESHOLD {
            Sentiment::Positive
        } else if polarity < NEGATIVE_THRESHOLD {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    /// System line appended to the outgoing conversation
    pub fn context_line(&self) -> String {
        format!("Sentiment Context: {}", self.as_str())
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
