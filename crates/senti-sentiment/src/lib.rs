//! Lexicon-based sentiment scoring.
//!
//! `classify` is a pure function and safe to call from any task.

mod analyzer;
mod lexicon;

pub use analyzer::{classify, polarity, score, Score};
pub use senti_core::Sentiment;
