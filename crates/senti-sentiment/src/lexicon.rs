use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Word polarity, roughly on the scale used by the pattern/TextBlob lexicon
static POLARITY: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    [
        // positive
        ("good", 0.7),
        ("great", 0.8),
        ("excellent", 1.0),
        ("amazing", 0.6),
        ("awesome", 1.0),
        ("wonderful", 1.0),
        ("fantastic", 0.4),
        ("perfect", 1.0),
        ("best", 1.0),
        ("better", 0.5),
        ("love", 0.5),
        ("loved", 0.7),
        ("lovely", 0.5),
        ("like", 0.2),
        ("happy", 0.8),
        ("glad", 0.5),
        ("nice", 0.6),
        ("beautiful", 0.85),
        ("cool", 0.35),
        ("fun", 0.3),
        ("funny", 0.25),
        ("helpful", 0.4),
        ("interesting", 0.5),
        ("enjoy", 0.4),
        ("enjoyed", 0.4),
        ("pleased", 0.5),
        ("delighted", 0.7),
        ("brilliant", 0.9),
        ("superb", 1.0),
        ("impressive", 1.0),
        ("thank", 0.2),
        ("thanks", 0.2),
        ("easy", 0.43),
        ("fine", 0.42),
        ("right", 0.29),
        ("well", 0.2),
        ("calm", 0.3),
        ("excited", 0.38),
        ("exciting", 0.3),
        ("proud", 0.8),
        ("grateful", 0.7),
        // negative
        ("bad", -0.7),
        ("worse", -0.4),
        ("worst", -1.0),
        ("terrible", -1.0),
        ("awful", -1.0),
        ("horrible", -1.0),
        ("hate", -0.8),
        ("hated", -0.9),
        ("sad", -0.5),
        ("unhappy", -0.6),
        ("angry", -0.5),
        ("mad", -0.6),
        ("poor", -0.4),
        ("annoying", -0.8),
        ("annoyed", -0.4),
        ("boring", -1.0),
        ("bored", -0.5),
        ("disappointed", -0.75),
        ("disappointing", -0.6),
        ("wrong", -0.5),
        ("stupid", -0.8),
        ("ugly", -0.7),
        ("broken", -0.4),
        ("frustrated", -0.7),
        ("frustrating", -0.4),
        ("useless", -0.5),
        ("disgusting", -1.0),
        ("pathetic", -1.0),
        ("slow", -0.3),
        ("difficult", -0.5),
        ("hard", -0.29),
        ("painful", -0.7),
        ("scared", -0.6),
        ("afraid", -0.6),
        ("lonely", -0.5),
        ("tired", -0.4),
        ("sick", -0.71),
        ("upset", -0.5),
        ("miserable", -1.0),
        ("depressed", -0.6),
        ("hurt", -0.5),
    ]
    .into_iter()
    .collect()
});

/// Multipliers applied to the next scored word
static INTENSIFIERS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    [
        ("very", 1.3),
        ("really", 1.2),
        ("so", 1.3),
        ("extremely", 1.5),
        ("incredibly", 1.4),
        ("super", 1.3),
        ("quite", 1.1),
        ("too", 1.2),
        ("totally", 1.3),
        ("absolutely", 1.4),
        ("pretty", 1.1),
        ("slightly", 0.6),
        ("somewhat", 0.7),
    ]
    .into_iter()
    .collect()
});

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "nothing", "neither", "nor", "without", "dont", "cant", "wont",
    "isnt", "wasnt", "arent", "didnt", "doesnt", "aint",
];

pub fn polarity_of(word: &str) -> Option<f64> {
    POLARITY.get(word).copied()
}

pub fn intensity_of(word: &str) -> Option<f64> {
    INTENSIFIERS.get(word).copied()
}

pub fn is_negation(word: &str) -> bool {
    NEGATIONS.contains(&word) || word.ends_with("n't")
}
