//! Capability loading with graceful degradation.
//!
//! Each load attempt produces a [`LoadOutcome`]. The generator walks a fixed
//! degradation sequence: reduced precision before standard precision, and
//! within each precision the optimized attention kernel before the standard
//! one. Only [`ModelError::Unsupported`] moves on to the next variant; any
//! other error ends the sequence and leaves the generator unavailable.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ModelError;
use crate::provider::{Embedder, EmotionClassifier, Generator, KeywordSource};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of one capability load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// Loaded with the preferred configuration.
    Loaded,
    /// Loaded, but with a fallback configuration or fallback strategy.
    Degraded(String),
    /// Not loaded; calls to this capability fail.
    Unavailable(String),
}

impl LoadOutcome {
    /// Whether the capability can serve calls.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }
}

/// The capabilities the engine loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Text embedding.
    Embedder,
    /// Reply generation.
    Generator,
    /// Sentiment classification.
    EmotionClassifier,
    /// Keyword extraction.
    KeywordExtractor,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Embedder => "embedder",
            Self::Generator => "generator",
            Self::EmotionClassifier => "emotion_classifier",
            Self::KeywordExtractor => "keyword_extractor",
        };
        f.write_str(name)
    }
}

/// One line of the load report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    /// Which capability.
    pub capability: Capability,
    /// How loading went.
    pub outcome: LoadOutcome,
    /// Model or backend identifier, when something loaded.
    pub model: Option<String>,
}

/// Aggregated outcome of engine initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    entries: Vec<CapabilityReport>,
}

impl LoadReport {
    /// Record a capability outcome and log it.
    pub fn record(&mut self, capability: Capability, outcome: LoadOutcome, model: Option<String>) {
        match &outcome {
            LoadOutcome::Loaded => info!(%capability, model = model.as_deref(), "capability loaded"),
            LoadOutcome::Degraded(reason) => {
                warn!(%capability, model = model.as_deref(), reason = %reason, "capability degraded");
            }
            LoadOutcome::Unavailable(reason) => {
                warn!(%capability, reason = %reason, "capability unavailable");
            }
        }
        self.entries.push(CapabilityReport {
            capability,
            outcome,
            model,
        });
    }

    /// Outcome for `capability`, if it was attempted.
    #[must_use]
    pub fn outcome(&self, capability: Capability) -> Option<&LoadOutcome> {
        self.entries
            .iter()
            .find(|e| e.capability == capability)
            .map(|e| &e.outcome)
    }

    /// All entries in load order.
    #[must_use]
    pub fn entries(&self) -> &[CapabilityReport] {
        &self.entries
    }

    /// True when every attempted capability loaded without degradation.
    #[must_use]
    pub fn is_fully_loaded(&self) -> bool {
        self.entries.iter().all(|e| e.outcome == LoadOutcome::Loaded)
    }
}

// ---------------------------------------------------------------------------
// Generator variants
// ---------------------------------------------------------------------------

/// Weight precision of a generator load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// Reduced precision (4-bit quantized weights).
    Quantized,
    /// Standard precision.
    Standard,
}

/// Attention implementation of a generator load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionKernel {
    /// Optimized fused kernel.
    Flash,
    /// Standard implementation.
    Standard,
}

/// One point in the generator degradation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeneratorVariant {
    /// Weight precision.
    pub precision: Precision,
    /// Attention kernel.
    pub attention: AttentionKernel,
}

impl fmt::Display for GeneratorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = match self.precision {
            Precision::Quantized => "quantized",
            Precision::Standard => "standard precision",
        };
        let attention = match self.attention {
            AttentionKernel::Flash => "flash attention",
            AttentionKernel::Standard => "standard attention",
        };
        write!(f, "{precision}, {attention}")
    }
}

/// The variants to try, in order.
#[must_use]
pub fn generator_variants(prefer_quantized: bool, prefer_flash: bool) -> Vec<GeneratorVariant> {
    let precisions: &[Precision] = if prefer_quantized {
        &[Precision::Quantized, Precision::Standard]
    } else {
        &[Precision::Standard]
    };
    let kernels: &[AttentionKernel] = if prefer_flash {
        &[AttentionKernel::Flash, AttentionKernel::Standard]
    } else {
        &[AttentionKernel::Standard]
    };

    precisions
        .iter()
        .flat_map(|&precision| {
            kernels
                .iter()
                .map(move |&attention| GeneratorVariant { precision, attention })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Loader trait
// ---------------------------------------------------------------------------

/// Source of capability instances. The engine calls these once, in order:
/// embedder, generator variants, classifier.
#[async_trait]
pub trait CapabilityLoader: Send + Sync {
    /// Load the embedder.
    ///
    /// # Errors
    ///
    /// Any load failure; the embedder becomes unavailable.
    async fn load_embedder(&self) -> Result<Arc<dyn Embedder>, ModelError>;

    /// Load the generator with a specific variant.
    ///
    /// # Errors
    ///
    /// [`ModelError::Unsupported`] to move on to the next variant, anything
    /// else to give up.
    async fn load_generator(&self, variant: GeneratorVariant) -> Result<Arc<dyn Generator>, ModelError>;

    /// Load the emotion classifier.
    ///
    /// # Errors
    ///
    /// Any load failure; the rule-based estimator takes over.
    async fn load_classifier(&self) -> Result<Arc<dyn EmotionClassifier>, ModelError>;

    /// The keyword source. Always available.
    fn keyword_source(&self) -> Arc<dyn KeywordSource>;

    /// Whether the classifier should be attempted at all.
    fn classifier_enabled(&self) -> bool {
        true
    }

    /// Whether to start the generator sequence at reduced precision.
    fn prefer_quantized(&self) -> bool {
        true
    }

    /// Whether to try the optimized attention kernel first.
    fn prefer_flash_attention(&self) -> bool {
        true
    }
}

/// Walk the generator degradation sequence.
///
/// Returns the first generator that loads together with its outcome:
/// [`LoadOutcome::Loaded`] for the first variant, [`LoadOutcome::Degraded`]
/// naming the variant and the rejections otherwise.
pub async fn load_generator(
    loader: &dyn CapabilityLoader,
) -> (Option<Arc<dyn Generator>>, LoadOutcome) {
    let variants = generator_variants(loader.prefer_quantized(), loader.prefer_flash_attention());
    let mut rejected: Vec<String> = Vec::new();

    for (attempt, variant) in variants.iter().enumerate() {
        match loader.load_generator(*variant).await {
            Ok(generator) => {
                let outcome = if attempt == 0 {
                    LoadOutcome::Loaded
                } else {
                    LoadOutcome::Degraded(format!("using {variant} ({})", rejected.join("; ")))
                };
                return (Some(generator), outcome);
            }
            Err(ModelError::Unsupported(reason)) => {
                warn!(%variant, reason = %reason, "generator variant unsupported, trying next");
                rejected.push(format!("{variant}: {reason}"));
            }
            Err(e) => {
                return (None, LoadOutcome::Unavailable(format!("{variant}: {e}")));
            }
        }
    }

    (
        None,
        LoadOutcome::Unavailable(format!("no supported variant ({})", rejected.join("; "))),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_sequence_order() {
        let variants = generator_variants(true, true);
        assert_eq!(
            variants,
            vec![
                GeneratorVariant { precision: Precision::Quantized, attention: AttentionKernel::Flash },
                GeneratorVariant { precision: Precision::Quantized, attention: AttentionKernel::Standard },
                GeneratorVariant { precision: Precision::Standard, attention: AttentionKernel::Flash },
                GeneratorVariant { precision: Precision::Standard, attention: AttentionKernel::Standard },
            ]
        );
    }

    #[test]
    fn preferences_shorten_sequence() {
        assert_eq!(generator_variants(false, false).len(), 1);
        assert_eq!(generator_variants(false, true).len(), 2);
        assert!(generator_variants(false, true)
            .iter()
            .all(|v| v.precision == Precision::Standard));
    }

    #[test]
    fn report_tracks_outcomes() {
        let mut report = LoadReport::default();
        report.record(Capability::Embedder, LoadOutcome::Loaded, Some("bge-m3".into()));
        assert!(report.is_fully_loaded());
        report.record(
            Capability::EmotionClassifier,
            LoadOutcome::Degraded("rule-based fallback".into()),
            None,
        );
        assert!(!report.is_fully_loaded());
        assert_eq!(report.outcome(Capability::Embedder), Some(&LoadOutcome::Loaded));
        assert_eq!(report.outcome(Capability::Generator), None);
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_value(LoadOutcome::Degraded("x".into())).expect("serialize");
        assert_eq!(json, serde_json::json!({"status": "degraded", "reason": "x"}));
    }
}
