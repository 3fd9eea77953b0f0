//! Emotional-state estimation over the loaded capabilities.

use chrono::Utc;
use nyra_core::emotion::{state_from_classification, Lexicon};
use nyra_core::types::EmotionalState;
use tracing::{debug, error};

use crate::provider::ModelProvider;

/// Chooses between the classifier mapping and the lexicon heuristic.
///
/// With a classifier loaded, its top label is mapped onto happiness; any
/// classifier failure yields the neutral state. Without one, the lexicon
/// decides. Estimation never fails.
#[derive(Debug, Clone, Default)]
pub struct EmotionalStateEstimator {
    lexicon: Lexicon,
}

impl EmotionalStateEstimator {
    /// Create an estimator using `lexicon` for the fallback path.
    #[must_use]
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    /// Estimate the emotional state expressed in `text`.
    pub async fn estimate(&self, provider: &ModelProvider, text: &str) -> EmotionalState {
        let now = Utc::now();
        if !provider.has_classifier() {
            let state = self.lexicon.estimate(text, now);
            debug!(mood = state.mood(), "emotion estimated from lexicon");
            return state;
        }

        match provider.classify(text).await {
            Ok(classification) => {
                debug!(label = %classification.label, confidence = classification.confidence, "emotion classified");
                state_from_classification(&classification, now)
            }
            Err(e) => {
                error!(error = %e, "emotion classification failed, returning neutral state");
                EmotionalState::neutral(now)
            }
        }
    }
}
