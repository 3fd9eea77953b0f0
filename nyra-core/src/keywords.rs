//! Rule-based keyword extraction (Tier 0, no model).
//!
//! Text is split into Han runs and Latin/numeric words. Han runs longer than
//! two characters are broken into overlapping bigrams; Latin words are
//! lowercased. Candidates are filtered against a stopword list and ranked by
//! frequency, ties going to the earliest occurrence.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::KeywordConfig;

/// Upper bound on keywords returned for one text.
pub const MAX_KEYWORDS: usize = 10;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{Han}+|[\p{L}\p{N}&&[^\p{Han}]]+").expect("token pattern is valid")
});

/// Split `text` into raw tokens and return the first `limit`.
///
/// This is the fallback used when a keyword extractor fails: no filtering,
/// no ranking, just the leading tokens in text order.
#[must_use]
pub fn raw_tokens(text: &str, limit: usize) -> Vec<String> {
    TOKEN_PATTERN
        .find_iter(text)
        .take(limit)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Frequency-ranked keyword extractor.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    max_keywords: usize,
    min_token_chars: usize,
    stopwords: HashSet<String>,
}

impl KeywordExtractor {
    /// Create an extractor from the `[keywords]` configuration.
    #[must_use]
    pub fn new(config: &KeywordConfig) -> Self {
        Self {
            max_keywords: config.max_keywords.min(MAX_KEYWORDS),
            min_token_chars: config.min_token_chars.max(1),
            stopwords: config.stopwords.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    /// Maximum keywords returned per call.
    #[must_use]
    pub fn max_keywords(&self) -> usize {
        self.max_keywords
    }

    /// Extract up to `max_keywords` keywords, most frequent first.
    #[must_use]
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut order = 0usize;

        for token in TOKEN_PATTERN.find_iter(text).map(|m| m.as_str()) {
            for candidate in self.candidates(token) {
                let entry = counts.entry(candidate).or_insert((0, order));
                entry.0 += 1;
                order += 1;
            }
        }

        let mut ranked: Vec<(String, usize, usize)> = counts
            .into_iter()
            .map(|(word, (count, first))| (word, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        ranked
            .into_iter()
            .take(self.max_keywords)
            .map(|(word, _, _)| word)
            .collect()
    }

    fn candidates(&self, token: &str) -> Vec<String> {
        let chars: Vec<char> = token.chars().collect();
        if chars.first().is_some_and(|c| is_han(*c)) {
            if chars.len() <= 2 {
                return self.keep_han(&chars).into_iter().collect();
            }
            return chars
                .windows(2)
                .filter_map(|pair| self.keep_han(pair))
                .collect();
        }

        let word = token.to_lowercase();
        let too_short = word.chars().count() < self.min_token_chars;
        let numeric = word.chars().all(|c| c.is_numeric());
        if too_short || numeric || self.stopwords.contains(&word) {
            Vec::new()
        } else {
            vec![word]
        }
    }

    fn keep_han(&self, chars: &[char]) -> Option<String> {
        if chars.len() < 2 {
            return None;
        }
        let has_stopword_char = chars
            .iter()
            .any(|c| self.stopwords.contains(c.to_string().as_str()));
        let word: String = chars.iter().collect();
        if has_stopword_char || self.stopwords.contains(&word) {
            None
        } else {
            Some(word)
        }
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(&KeywordConfig::default())
    }
}

fn is_han(c: char) -> bool {
    matches!(c as u32,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2FA1F)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
