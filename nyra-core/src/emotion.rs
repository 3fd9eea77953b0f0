//! Emotional state derivation.
//!
//! Two strategies produce an [`EmotionalState`] from user text:
//!
//! - **Classifier mapping**: a `(label, confidence)` pair from a trained
//!   sentiment model is mapped onto the happiness axis with an asymmetric
//!   formula centred on 0.5.
//! - **Lexicon heuristic**: when no classifier is loaded, fixed positive and
//!   negative word sets are matched against the text and the majority wins.
//!
//! Both strategies leave affection, trust and dependency at their fixed
//! defaults. Those axes are not derived from input yet.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::config::EmotionConfig;
use crate::types::{EmotionalState, Mood, NEUTRAL_HAPPINESS};

/// Happiness produced by the lexicon heuristic when positive words dominate.
pub const LEXICON_HAPPY: f32 = 0.7;
/// Happiness produced by the lexicon heuristic when negative words dominate.
pub const LEXICON_SAD: f32 = 0.3;

// ---------------------------------------------------------------------------
// Classifier output
// ---------------------------------------------------------------------------

/// Direction of a classifier label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Positive sentiment.
    Positive,
    /// Negative sentiment.
    Negative,
    /// Anything else (neutral or an unrecognised label).
    Neutral,
}

impl Polarity {
    /// Classify a raw model label.
    ///
    /// Matching is case-insensitive on the prefix, so `POSITIVE`,
    /// `positive (stars 4 and 5)` and `pos` are all positive.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        if label.starts_with("pos") {
            Self::Positive
        } else if label.starts_with("neg") {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

/// Top prediction returned by an emotion classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Raw label as reported by the model.
    pub label: String,
    /// Confidence of that label, nominally in `[0.0, 1.0]`.
    pub confidence: f32,
}

impl Classification {
    /// Create a classification result.
    #[must_use]
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Polarity of the label.
    #[must_use]
    pub fn polarity(&self) -> Polarity {
        Polarity::from_label(&self.label)
    }
}

/// Map a classifier prediction onto an emotional state.
///
/// Positive: `min(0.5 + c * 0.5, 1.0)`. Negative: `max(0.5 - c * 0.5, 0.0)`.
/// Neutral: `0.5`. The confidence is not calibrated against a neutral class
/// probability. A non-finite confidence is treated as zero; values outside
/// `[0, 1]` are clamped first.
#[must_use]
pub fn state_from_classification(
    classification: &Classification,
    timestamp: DateTime<Utc>,
) -> EmotionalState {
    let confidence = if classification.confidence.is_finite() {
        classification.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let (happiness, mood) = match classification.polarity() {
        Polarity::Positive => ((0.5 + confidence * 0.5).min(1.0), Mood::Happy),
        Polarity::Negative => ((0.5 - confidence * 0.5).max(0.0), Mood::Sad),
        Polarity::Neutral => (NEUTRAL_HAPPINESS, Mood::Calm),
    };

    EmotionalState::derived(happiness, mood, timestamp)
}

// ---------------------------------------------------------------------------
// Lexicon heuristic
// ---------------------------------------------------------------------------

/// Fixed positive/negative word sets for the heuristic fallback.
///
/// Each distinct word counts at most once, however often it appears. Words
/// made only of ASCII letters and digits are matched against whole lowercase
/// tokens; everything else (CJK in particular) is matched as a substring.
#[derive(Debug, Clone)]
pub struct Lexicon {
    positive: Vec<String>,
    negative: Vec<String>,
}

/// Number of distinct lexicon words of each polarity found in a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LexiconScore {
    /// Distinct positive words present.
    pub positive: usize,
    /// Distinct negative words present.
    pub negative: usize,
}

impl LexiconScore {
    /// Majority rule: more positive → happy, more negative → sad, tie → calm.
    #[must_use]
    pub fn mood(self) -> Mood {
        match self.positive.cmp(&self.negative) {
            std::cmp::Ordering::Greater => Mood::Happy,
            std::cmp::Ordering::Less => Mood::Sad,
            std::cmp::Ordering::Equal => Mood::Calm,
        }
    }
}

impl Lexicon {
    /// Build a lexicon from word lists. Duplicates and blank entries are dropped.
    #[must_use]
    pub fn new<P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        Self {
            positive: dedup(positive),
            negative: dedup(negative),
        }
    }

    /// Build the lexicon configured in `[emotion]`.
    #[must_use]
    pub fn from_config(config: &EmotionConfig) -> Self {
        Self::new(config.positive_words.clone(), config.negative_words.clone())
    }

    /// Count distinct positive and negative words present in `text`.
    #[must_use]
    pub fn score(&self, text: &str) -> LexiconScore {
        let lowered = text.to_lowercase();
        let tokens: HashSet<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let count = |words: &[String]| {
            words
                .iter()
                .filter(|word| {
                    if is_ascii_word(word) {
                        tokens.contains(word.as_str())
                    } else {
                        lowered.contains(word.as_str())
                    }
                })
                .count()
        };

        LexiconScore {
            positive: count(&self.positive),
            negative: count(&self.negative),
        }
    }

    /// Derive an emotional state from `text` by majority count.
    #[must_use]
    pub fn estimate(&self, text: &str, timestamp: DateTime<Utc>) -> EmotionalState {
        let mood = self.score(text).mood();
        let happiness = match mood {
            Mood::Happy => LEXICON_HAPPY,
            Mood::Sad => LEXICON_SAD,
            Mood::Calm => NEUTRAL_HAPPINESS,
        };
        EmotionalState::derived(happiness, mood, timestamp)
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::from_config(&EmotionConfig::default())
    }
}

fn dedup<I>(words: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut seen = HashSet::new();
    words
        .into_iter()
        .map(|w| w.into().trim().to_lowercase())
        .filter(|w| !w.is_empty() && seen.insert(w.clone()))
        .collect()
}

fn is_ascii_word(word: &str) -> bool {
    word.chars().all(|c| c.is_ascii_alphanumeric())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
