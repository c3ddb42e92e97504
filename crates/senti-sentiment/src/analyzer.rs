use once_cell::sync::Lazy;
use regex::Regex;
use senti_core::Sentiment;
use tracing::trace;

use crate::lexicon;

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z]+(?:'[a-z]+)?").expect("word pattern"));

/// Negated words keep half their magnitude with the sign flipped
const NEGATION_FACTOR: f64 = -0.5;

/// Result of scoring a piece of text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Mean polarity of the scored words, clamped to [-1, 1]
    pub polarity: f64,
    /// Number of lexicon words that contributed
    pub matched: usize,
}

impl Score {
    pub fn sentiment(&self) -> Sentiment {
        Sentiment::from_polarity(self.polarity)
    }
}

/// Score `text` against the built-in lexicon.
///
/// A negation or intensifier modifies the next lexicon word and is dropped
/// by any other word in between. Text without lexicon words scores 0.0.
pub fn score(text: &str) -> Score {
    let lowered = text.to_lowercase();

    let mut total = 0.0;
    let mut matched = 0usize;
    let mut negated = false;
    let mut intensity = 1.0;

    for token in WORD.find_iter(&lowered) {
        let word = token.as_str();

        if lexicon::is_negation(word) {
            negated = true;
            continue;
        }
        if let Some(factor) = lexicon::intensity_of(word) {
            intensity *= factor;
            continue;
        }

        if let Some(value) = lexicon::polarity_of(word) {
            let mut value = (value * intensity).clamp(-1.0, 1.0);
            if negated {
                value *= NEGATION_FACTOR;
            }
            total += value;
            matched += 1;
        }

        negated = false;
        intensity = 1.0;
    }

    let polarity = if matched == 0 {
        0.0
    } else {
        (total / matched as f64).clamp(-1.0, 1.0)
    };

    trace!(polarity, matched, "scored text");
    Score { polarity, matched }
}

/// Polarity of `text` in [-1, 1]
pub fn polarity(text: &str) -> f64 {
    score(text).polarity
}

/// Classify `text` as positive, negative or neutral
pub fn classify(text: &str) -> Sentiment {
    score(text).sentiment()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_without_lexicon_words() {
        assert_eq!(polarity("The sky is blue"), 0.0);
        assert_eq!(classify("The sky is blue"), Sentiment::Neutral);
        assert_eq!(classify(""), Sentiment::Neutral);
    }

    #[test]
    fn test_positive_text() {
        assert_eq!(classify("I love this, it's great"), Sentiment::Positive);
        assert_eq!(classify("What an excellent answer!"), Sentiment::Positive);
    }

    #[test]
    fn test_negative_text() {
        assert_eq!(classify("This is terrible"), Sentiment::Negative);
        assert_eq!(classify("I hate waiting, so boring"), Sentiment::Negative);
    }

    #[test]
    fn test_negation_flips_sign() {
        let plain = polarity("good");
        let negated = polarity("not good");
        assert!(plain > 0.0);
        assert!((negated - plain * NEGATION_FACTOR).abs() < 1e-9);
        assert_eq!(classify("this is not good"), Sentiment::Negative);
        assert_eq!(classify("it isn't bad"), Sentiment::Positive);
    }

    #[test]
    fn test_intensifier_scales() {
        assert!(polarity("very good") > polarity("good"));
        assert!(polarity("very bad") < polarity("bad"));
        assert_eq!(polarity("very"), 0.0);
    }

    #[test]
    fn test_modifier_reset_by_other_word() {
        // "not" is consumed by "the", so "best" scores at full strength
        assert_eq!(polarity("not the best"), 1.0);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(polarity("GREAT"), polarity("great"));
    }

    #[test]
    fn test_polarity_clamped() {
        let p = polarity("absolutely extremely excellent");
        assert!(p <= 1.0);
        assert_eq!(score("absolutely extremely excellent").matched, 1);
    }
}
