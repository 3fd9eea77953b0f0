//! Concrete capability backends and the config-driven loader.

pub mod classifier;
pub mod hashed;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod ollama;
pub mod rules;

use std::sync::Arc;

use async_trait::async_trait;
use nyra_core::config::{EmbeddingBackend, NyraConfig};

use crate::error::ModelError;
use crate::loader::{CapabilityLoader, GeneratorVariant};
use crate::provider::{Embedder, EmotionClassifier, Generator, KeywordSource};

/// Loads the backends selected in [`NyraConfig`].
pub struct ConfiguredLoader {
    config: NyraConfig,
}

impl ConfiguredLoader {
    /// Create a loader for `config`.
    #[must_use]
    pub fn new(config: NyraConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CapabilityLoader for ConfiguredLoader {
    async fn load_embedder(&self) -> Result<Arc<dyn Embedder>, ModelError> {
        let config = &self.config.embedding;
        match config.backend {
            EmbeddingBackend::Ollama => Ok(Arc::new(ollama::OllamaEmbedder::connect(config).await?)),
            EmbeddingBackend::Hashed => Ok(Arc::new(hashed::HashedEmbedder::new(config.dimensions))),
            #[cfg(feature = "onnx")]
            EmbeddingBackend::Onnx => Ok(Arc::new(onnx::OnnxEmbedder::load(config).await?)),
            #[cfg(not(feature = "onnx"))]
            EmbeddingBackend::Onnx => Err(ModelError::Unavailable(
                "onnx embedding backend requires the `onnx` feature".into(),
            )),
        }
    }

    async fn load_generator(&self, variant: GeneratorVariant) -> Result<Arc<dyn Generator>, ModelError> {
        let generator = ollama::OllamaGenerator::load(&self.config.generation, variant).await?;
        Ok(Arc::new(generator))
    }

    async fn load_classifier(&self) -> Result<Arc<dyn EmotionClassifier>, ModelError> {
        let classifier = classifier::HttpEmotionClassifier::connect(&self.config.emotion).await?;
        Ok(Arc::new(classifier))
    }

    fn keyword_source(&self) -> Arc<dyn KeywordSource> {
        Arc::new(rules::RuleKeywordSource::new(&self.config.keywords))
    }

    fn classifier_enabled(&self) -> bool {
        self.config.emotion.enabled
    }

    fn prefer_quantized(&self) -> bool {
        self.config.generation.prefer_quantized
    }

    fn prefer_flash_attention(&self) -> bool {
        self.config.generation.prefer_flash_attention
    }
}
