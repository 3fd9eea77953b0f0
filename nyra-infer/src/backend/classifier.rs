//! HTTP text-classification backend.
//!
//! Talks to a `POST /predict` endpoint that takes `{"inputs": text}` and
//! answers with `[{label, score}, ...]`, optionally nested one level deeper
//! as sentiment pipelines often do. The highest-scoring label wins.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use nyra_core::config::EmotionConfig;
use nyra_core::emotion::Classification;

use crate::error::ModelError;
use crate::provider::EmotionClassifier;

const PROBE_TEXT: &str = "今天天气很好";

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictResponse {
    Flat(Vec<LabelScore>),
    Nested(Vec<Vec<LabelScore>>),
}

impl PredictResponse {
    fn top(self) -> Option<LabelScore> {
        let scores = match self {
            Self::Flat(scores) => scores,
            Self::Nested(batches) => batches.into_iter().next().unwrap_or_default(),
        };
        scores
            .into_iter()
            .filter(|s| s.score.is_finite())
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

/// Emotion classifier served over HTTP.
pub struct HttpEmotionClassifier {
    http: Client,
    url: String,
    model: String,
    timeout: Duration,
}

impl HttpEmotionClassifier {
    /// Create the classifier and verify it answers a probe.
    ///
    /// # Errors
    ///
    /// Fails if the server is unreachable or the probe cannot be classified.
    pub async fn connect(config: &EmotionConfig) -> Result<Self, ModelError> {
        let classifier = Self {
            http: Client::new(),
            url: format!("{}/predict", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        };
        let probe = classifier.classify(PROBE_TEXT).await?;
        info!(model = %classifier.model, label = %probe.label, "emotion classifier ready");
        Ok(classifier)
    }
}

#[async_trait]
impl EmotionClassifier for HttpEmotionClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ModelError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&json!({ "inputs": text }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ModelError::from_transport(e, self.timeout))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(ModelError::RequestFailed(format!(
                "HTTP {}: {}",
                status,
                resp.text().await.unwrap_or_default()
            )));
        }

        let parsed: PredictResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.to_string()))?;
        let top = parsed
            .top()
            .ok_or_else(|| ModelError::ParseError("classifier returned no labels".into()))?;
        Ok(Classification::new(top.label, top.score))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_highest_score_flat() {
        let parsed: PredictResponse = serde_json::from_str(
            r#"[{"label":"negative (stars 1, 2 and 3)","score":0.2},{"label":"positive (stars 4 and 5)","score":0.8}]"#,
        )
        .expect("parse");
        let top = parsed.top().expect("label");
        assert!(top.label.starts_with("positive"));
    }

    #[test]
    fn picks_highest_score_nested() {
        let parsed: PredictResponse =
            serde_json::from_str(r#"[[{"label":"NEGATIVE","score":0.9},{"label":"POSITIVE","score":0.1}]]"#)
                .expect("parse");
        assert_eq!(parsed.top().expect("label").label, "NEGATIVE");
    }

    #[test]
    fn empty_response_has_no_top() {
        let parsed: PredictResponse = serde_json::from_str("[]").expect("parse");
        assert!(parsed.top().is_none());
    }

    #[tokio::test]
    async fn classify_timeout_reports_configured_deadline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let classifier = HttpEmotionClassifier {
            http: Client::new(),
            url: format!("http://{addr}/predict"),
            model: "sentiment".into(),
            timeout: Duration::from_millis(30),
        };
        let err = classifier.classify("我好开心").await.expect_err("server never answers");
        assert!(matches!(err, ModelError::Timeout(30)), "got {err}");
        server.abort();
    }
}
