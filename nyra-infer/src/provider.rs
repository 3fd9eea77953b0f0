//! Capability traits and the [`ModelProvider`] that bundles them.
//!
//! Every model invocation is moved onto its own tokio task. The caller only
//! awaits the join handle, so dropping the caller (timeout, disconnect)
//! detaches from the computation without interrupting it.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use nyra_core::config::GenerationConfig;
use nyra_core::context::strip_structural_tokens;
use nyra_core::embedding::l2_normalize;
use nyra_core::emotion::Classification;
use nyra_core::keywords::{raw_tokens, MAX_KEYWORDS};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ModelError;

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Text → dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text.
    ///
    /// # Errors
    ///
    /// Any backend failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    /// Model identifier for logs and the load report.
    fn model_name(&self) -> &str;
}

/// Prompt → generated text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for a fully rendered prompt.
    ///
    /// # Errors
    ///
    /// Any backend failure.
    async fn generate(&self, prompt: &str, settings: &GenerationSettings) -> Result<String, ModelError>;

    /// Model identifier for logs and the load report.
    fn model_name(&self) -> &str;

    /// Free device-resident weights. Called once during teardown.
    ///
    /// # Errors
    ///
    /// Any backend failure; teardown logs it and continues.
    async fn release(&self) -> Result<(), ModelError> {
        Ok(())
    }
}

/// Text → top sentiment label and confidence.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    /// Classify one text.
    ///
    /// # Errors
    ///
    /// Any backend failure.
    async fn classify(&self, text: &str) -> Result<Classification, ModelError>;

    /// Model identifier for logs and the load report.
    fn model_name(&self) -> &str;
}

/// Text → ranked keywords.
#[async_trait]
pub trait KeywordSource: Send + Sync {
    /// Extract up to `limit` keywords, most relevant first.
    ///
    /// # Errors
    ///
    /// Any extractor failure. The provider falls back to raw tokens.
    async fn extract(&self, text: &str, limit: usize) -> Result<Vec<String>, ModelError>;

    /// Extractor identifier for logs and the load report.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Generation settings
// ---------------------------------------------------------------------------

/// Sampling parameters sent with every generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSettings {
    /// Maximum tokens generated per reply.
    pub max_new_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling threshold.
    pub top_p: f32,
    /// Penalty applied to repeated tokens.
    pub repetition_penalty: f32,
    /// Sample instead of greedy decoding.
    pub do_sample: bool,
}

impl GenerationSettings {
    /// Settings from the `[generation]` configuration.
    #[must_use]
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            repetition_penalty: config.repetition_penalty,
            do_sample: true,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Model provider
// ---------------------------------------------------------------------------

/// Run a model future on its own task and wait for it.
///
/// # Errors
///
/// Returns the future's own error, or [`ModelError::Worker`] if the task
/// panicked.
pub async fn offload<T, F>(future: F) -> Result<T, ModelError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, ModelError>> + Send + 'static,
{
    tokio::spawn(future)
        .await
        .map_err(|e| ModelError::Worker(e.to_string()))?
}

/// The loaded capabilities, immutable once the engine is ready.
///
/// The embedder, generator and classifier are each optional: a capability
/// that failed to load stays `None` and its calls fail with
/// [`ModelError::Unavailable`]. Keyword extraction always has a source.
pub struct ModelProvider {
    embedder: Option<Arc<dyn Embedder>>,
    generator: Option<Arc<dyn Generator>>,
    classifier: Option<Arc<dyn EmotionClassifier>>,
    keywords: Arc<dyn KeywordSource>,
    settings: GenerationSettings,
    structural_tokens: Vec<String>,
    keyword_limit: usize,
}

impl ModelProvider {
    /// Create a provider with only a keyword source.
    #[must_use]
    pub fn new(keywords: Arc<dyn KeywordSource>) -> Self {
        let generation = GenerationConfig::default();
        Self {
            embedder: None,
            generator: None,
            classifier: None,
            keywords,
            settings: GenerationSettings::from_config(&generation),
            structural_tokens: generation.structural_tokens,
            keyword_limit: MAX_KEYWORDS,
        }
    }

    /// Attach an embedder.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Attach a generator.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Attach an emotion classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn EmotionClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Use the sampling parameters and structural tokens from `config`.
    #[must_use]
    pub fn with_generation_config(mut self, config: &GenerationConfig) -> Self {
        self.settings = GenerationSettings::from_config(config);
        self.structural_tokens.clone_from(&config.structural_tokens);
        self
    }

    /// Cap on keywords returned per call, clamped to `1..=MAX_KEYWORDS`.
    #[must_use]
    pub fn with_keyword_limit(mut self, limit: usize) -> Self {
        self.keyword_limit = limit.clamp(1, MAX_KEYWORDS);
        self
    }

    /// Whether the model-backed emotion branch is available.
    #[must_use]
    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Whether a generator is loaded.
    #[must_use]
    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Whether an embedder is loaded.
    #[must_use]
    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Cap on keywords returned per call.
    #[must_use]
    pub fn keyword_limit(&self) -> usize {
        self.keyword_limit
    }

    /// Sampling parameters sent to the generator.
    #[must_use]
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Embed `text` into a unit-length vector.
    ///
    /// # Errors
    ///
    /// [`ModelError::Unavailable`] if no embedder is loaded, or the
    /// embedder's own failure.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let embedder = self
            .embedder
            .clone()
            .ok_or_else(|| ModelError::Unavailable("embedder not loaded".into()))?;
        let text = text.to_string();
        let mut vector = offload(async move { embedder.embed(&text).await }).await?;
        if vector.is_empty() {
            return Err(ModelError::ParseError("embedder returned an empty vector".into()));
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }

    /// Generate a reply for a rendered prompt.
    ///
    /// The returned text is trimmed and free of structural template tokens.
    ///
    /// # Errors
    ///
    /// [`ModelError::Unavailable`] if no generator is loaded, or the
    /// generator's own failure.
    pub async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let generator = self
            .generator
            .clone()
            .ok_or_else(|| ModelError::Unavailable("generator not loaded".into()))?;
        let prompt = prompt.to_string();
        let settings = self.settings.clone();
        let raw = offload(async move { generator.generate(&prompt, &settings).await }).await?;
        Ok(strip_structural_tokens(&raw, &self.structural_tokens))
    }

    /// Classify the sentiment of `text`.
    ///
    /// # Errors
    ///
    /// [`ModelError::Unavailable`] if no classifier is loaded, or the
    /// classifier's own failure.
    pub async fn classify(&self, text: &str) -> Result<Classification, ModelError> {
        let classifier = self
            .classifier
            .clone()
            .ok_or_else(|| ModelError::Unavailable("emotion classifier not loaded".into()))?;
        let text = text.to_string();
        offload(async move { classifier.classify(&text).await }).await
    }

    /// Extract at most `keyword_limit` keywords.
    ///
    /// Never fails: if the keyword source errors, the first raw tokens of
    /// the text are returned instead.
    pub async fn extract_keywords(&self, text: &str) -> Vec<String> {
        let source = Arc::clone(&self.keywords);
        let limit = self.keyword_limit;
        let owned = text.to_string();
        match offload(async move { source.extract(&owned, limit).await }).await {
            Ok(mut keywords) => {
                keywords.truncate(limit);
                keywords
            }
            Err(e) => {
                warn!(error = %e, extractor = self.keywords.name(), "keyword extraction failed, using raw tokens");
                raw_tokens(text, limit)
            }
        }
    }

    /// Release the generator's resources.
    pub async fn release(&self) {
        let Some(generator) = &self.generator else {
            debug!("no generator to release");
            return;
        };
        match generator.release().await {
            Ok(()) => info!(model = generator.model_name(), "generator released"),
            Err(e) => warn!(model = generator.model_name(), error = %e, "generator release failed"),
        }
    }
}

impl std::fmt::Debug for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProvider")
            .field("embedder", &self.embedder.as_ref().map(|e| e.model_name().to_string()))
            .field("generator", &self.generator.as_ref().map(|g| g.model_name().to_string()))
            .field("classifier", &self.classifier.as_ref().map(|c| c.model_name().to_string()))
            .field("keywords", &self.keywords.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
