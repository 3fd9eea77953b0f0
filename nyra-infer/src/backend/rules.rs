//! Rule-based keyword source (Tier 0, no model).

use async_trait::async_trait;
use nyra_core::config::KeywordConfig;
use nyra_core::keywords::KeywordExtractor;

use crate::error::ModelError;
use crate::provider::KeywordSource;

/// Keyword source backed by the frequency-ranked [`KeywordExtractor`].
#[derive(Debug, Clone, Default)]
pub struct RuleKeywordSource {
    extractor: KeywordExtractor,
}

impl RuleKeywordSource {
    /// Create from the `[keywords]` configuration.
    #[must_use]
    pub fn new(config: &KeywordConfig) -> Self {
        Self {
            extractor: KeywordExtractor::new(config),
        }
    }
}

#[async_trait]
impl KeywordSource for RuleKeywordSource {
    async fn extract(&self, text: &str, limit: usize) -> Result<Vec<String>, ModelError> {
        let mut keywords = self.extractor.extract(text);
        keywords.truncate(limit);
        Ok(keywords)
    }

    fn name(&self) -> &str {
        "rule-based"
    }
}
