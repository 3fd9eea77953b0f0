//! Model-free embedder for offline runs and tests.

use async_trait::async_trait;
use nyra_core::embedding::hashed_embedding;

use crate::error::ModelError;
use crate::provider::Embedder;

/// Deterministic feature-hashed embedder.
///
/// Useful when no embedding server is available: same text, same vector,
/// and texts sharing tokens score higher on cosine similarity.
pub struct HashedEmbedder {
    dims: usize,
}

impl HashedEmbedder {
    /// Create a hashed embedder with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dims: dimensions.max(1) }
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let vector = hashed_embedding(text, self.dims);
        if vector.iter().all(|&x| x == 0.0) {
            // Token-free input (punctuation only) still gets a unit vector.
            let mut fallback = vec![0.0; self.dims];
            fallback[0] = 1.0;
            return Ok(fallback);
        }
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        "hashed-features"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_unit_vectors() {
        let embedder = HashedEmbedder::new(32);
        for text in ["你好", "hello world", "。。。", ""] {
            let v = embedder.embed(text).await.expect("embed");
            assert_eq!(v.len(), 32);
            let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((mag - 1.0).abs() < 1e-4, "{text:?} gave magnitude {mag}");
        }
    }
}
