//! Ollama-compatible HTTP backends for embedding and generation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use nyra_core::config::{EmbeddingConfig, GenerationConfig};

use crate::error::ModelError;
use crate::loader::{AttentionKernel, GeneratorVariant, Precision};
use crate::provider::{Embedder, GenerationSettings, Generator};

/// Probe text sent when loading the embedder.
const PROBE_TEXT: &str = "ping";

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

async fn error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    format!("HTTP {}: {}", status, resp.text().await.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Embedder
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by `POST /api/embed`.
pub struct OllamaEmbedder {
    http: Client,
    url: String,
    model: String,
    timeout: Duration,
}

impl OllamaEmbedder {
    /// Create the embedder and verify the model answers.
    ///
    /// # Errors
    ///
    /// Fails if the server is unreachable or the model cannot embed.
    pub async fn connect(config: &EmbeddingConfig) -> Result<Self, ModelError> {
        let embedder = Self {
            http: Client::new(),
            url: endpoint(&config.base_url, "api/embed"),
            model: config.model.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        };
        let probe = embedder.embed(PROBE_TEXT).await?;
        info!(model = %embedder.model, dimensions = probe.len(), "embedding model ready");
        Ok(embedder)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let body = json!({ "model": self.model, "input": text });
        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ModelError::from_transport(e, self.timeout))?;

        if !resp.status().is_success() {
            return Err(ModelError::RequestFailed(error_body(resp).await));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.to_string()))?;
        parsed
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::ParseError("no embedding in response".into()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Generator backed by `POST /api/generate` in raw prompt mode.
pub struct OllamaGenerator {
    http: Client,
    url: String,
    model: String,
    flash_attention: bool,
    timeout: Duration,
}

impl OllamaGenerator {
    /// Load `variant` into the server.
    ///
    /// The quantized variant uses `quantized_model`; the standard variant
    /// uses `model`. Loading sends an empty prompt, which makes the server
    /// load the weights without generating.
    ///
    /// # Errors
    ///
    /// [`ModelError::Unsupported`] if the variant has no model configured,
    /// the model is missing (404) or the server rejects the attention
    /// option. Other failures are returned as-is.
    pub async fn load(config: &GenerationConfig, variant: GeneratorVariant) -> Result<Self, ModelError> {
        let model = match variant.precision {
            Precision::Quantized => config
                .quantized_model
                .clone()
                .ok_or_else(|| ModelError::Unsupported("no quantized model configured".into()))?,
            Precision::Standard => config.model.clone(),
        };

        let generator = Self {
            http: Client::new(),
            url: endpoint(&config.base_url, "api/generate"),
            model,
            flash_attention: variant.attention == AttentionKernel::Flash,
            timeout: Duration::from_millis(config.timeout_ms),
        };

        let body = json!({
            "model": generator.model,
            "prompt": "",
            "stream": false,
            "options": { "flash_attention": generator.flash_attention },
        });
        let resp = generator
            .http
            .post(&generator.url)
            .json(&body)
            .timeout(generator.timeout)
            .send()
            .await
            .map_err(|e| ModelError::from_transport(e, generator.timeout))?;

        match resp.status() {
            s if s.is_success() => {
                info!(model = %generator.model, %variant, "generator loaded");
                Ok(generator)
            }
            StatusCode::NOT_FOUND if variant.precision == Precision::Quantized => {
                Err(ModelError::Unsupported(error_body(resp).await))
            }
            StatusCode::BAD_REQUEST if generator.flash_attention => {
                Err(ModelError::Unsupported(error_body(resp).await))
            }
            _ => Err(ModelError::Unavailable(error_body(resp).await)),
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str, settings: &GenerationSettings) -> Result<String, ModelError> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "raw": true,
            "stream": false,
            "options": {
                "num_predict": settings.max_new_tokens,
                "temperature": if settings.do_sample { settings.temperature } else { 0.0 },
                "top_p": settings.top_p,
                "repeat_penalty": settings.repetition_penalty,
                "flash_attention": self.flash_attention,
            }
        });

        let start = Instant::now();
        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ModelError::from_transport(e, self.timeout))?;

        if !resp.status().is_success() {
            return Err(ModelError::RequestFailed(error_body(resp).await));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.to_string()))?;
        debug!(
            model = %self.model,
            tokens = parsed.eval_count.unwrap_or(0),
            latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "generation finished"
        );
        Ok(parsed.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn release(&self) -> Result<(), ModelError> {
        let body = json!({ "model": self.model, "keep_alive": 0 });
        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ModelError::from_transport(e, self.timeout))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ModelError::RequestFailed(error_body(resp).await))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_cleanly() {
        assert_eq!(endpoint("http://h:1/", "api/embed"), "http://h:1/api/embed");
        assert_eq!(endpoint("http://h:1", "api/generate"), "http://h:1/api/generate");
    }

    #[tokio::test]
    async fn quantized_without_model_is_unsupported() {
        let config = GenerationConfig {
            quantized_model: None,
            ..GenerationConfig::default()
        };
        let variant = GeneratorVariant {
            precision: Precision::Quantized,
            attention: AttentionKernel::Standard,
        };
        let result = OllamaGenerator::load(&config, variant).await;
        assert!(matches!(result, Err(ModelError::Unsupported(_))));
    }

    #[test]
    fn parses_generate_response() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"model":"m","response":"你好","done":true,"eval_count":3}"#)
                .expect("parse");
        assert_eq!(parsed.response, "你好");
        assert_eq!(parsed.eval_count, Some(3));
    }

    #[test]
    fn parses_embed_response() {
        let parsed: EmbedResponse =
            serde_json::from_str(r#"{"model":"m","embeddings":[[0.1,0.2]]}"#).expect("parse");
        assert_eq!(parsed.embeddings, vec![vec![0.1, 0.2]]);
    }

    /// Accepts connections and never answers.
    async fn silent_server() -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn embed_timeout_reports_configured_deadline() {
        let (base, server) = silent_server().await;
        let embedder = OllamaEmbedder {
            http: Client::new(),
            url: endpoint(&base, "api/embed"),
            model: "bge-m3".into(),
            timeout: Duration::from_millis(50),
        };
        let err = embedder.embed("你好").await.expect_err("server never answers");
        assert!(matches!(err, ModelError::Timeout(50)), "got {err}");
        server.abort();
    }

    #[tokio::test]
    async fn generate_timeout_reports_configured_deadline() {
        let (base, server) = silent_server().await;
        let generator = OllamaGenerator {
            http: Client::new(),
            url: endpoint(&base, "api/generate"),
            model: "qwen".into(),
            flash_attention: false,
            timeout: Duration::from_millis(40),
        };
        let settings = GenerationSettings::from_config(&GenerationConfig::default());
        let err = generator.generate("你好", &settings).await.expect_err("server never answers");
        assert!(matches!(err, ModelError::Timeout(40)), "got {err}");
        server.abort();
    }
}
