//! In-process ONNX embedder (`onnx` feature).
//!
//! Runs a `fastembed` model on the blocking thread pool so the forward pass
//! never stalls the async scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use nyra_core::config::EmbeddingConfig;

use crate::error::ModelError;
use crate::provider::Embedder;

/// Embedder running a local ONNX model.
pub struct OnnxEmbedder {
    model: Arc<TextEmbedding>,
    name: String,
}

impl OnnxEmbedder {
    /// Load the `fastembed` model named by `config.model` (downloaded on
    /// first use). The name is matched against the model code, with or
    /// without its organisation prefix.
    ///
    /// # Errors
    ///
    /// Fails if the name matches no supported model, or the model cannot be
    /// downloaded or initialized.
    pub async fn load(config: &EmbeddingConfig) -> Result<Self, ModelError> {
        let (model, name) = resolve_model(&config.model)?;
        let embedding = tokio::task::spawn_blocking(move || TextEmbedding::try_new(InitOptions::new(model)))
            .await
            .map_err(|e| ModelError::Worker(e.to_string()))?
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;
        info!(model = %name, "onnx embedding model ready");
        Ok(Self {
            model: Arc::new(embedding),
            name,
        })
    }
}

fn resolve_model(name: &str) -> Result<(EmbeddingModel, String), ModelError> {
    let matches = |code: &str| {
        code.eq_ignore_ascii_case(name)
            || code
                .rsplit('/')
                .next()
                .is_some_and(|short| short.eq_ignore_ascii_case(name))
    };
    TextEmbedding::list_supported_models()
        .into_iter()
        .find(|info| matches(&info.model_code))
        .map(|info| (info.model, info.model_code))
        .ok_or_else(|| ModelError::Unavailable(format!("embedding model {name:?} is not supported by fastembed")))
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let model = Arc::clone(&self.model);
        let input = vec![text.to_string()];
        let mut batch = tokio::task::spawn_blocking(move || model.embed(input, None))
            .await
            .map_err(|e| ModelError::Worker(e.to_string()))?
            .map_err(|e| ModelError::RequestFailed(e.to_string()))?;
        batch
            .pop()
            .ok_or_else(|| ModelError::ParseError("onnx model returned no embedding".into()))
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
