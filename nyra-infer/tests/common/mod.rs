//! In-process fake capabilities shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use nyra_core::config::NyraConfig;
use nyra_core::emotion::Classification;
use nyra_core::types::{EmotionalState, MemoryEntry};
use nyra_infer::backend::hashed::HashedEmbedder;
use nyra_infer::backend::rules::RuleKeywordSource;
use nyra_infer::loader::{AttentionKernel, CapabilityLoader, GeneratorVariant, Precision};
use nyra_infer::provider::{Embedder, EmotionClassifier, GenerationSettings, Generator, KeywordSource};
use nyra_infer::{Engine, ModelError};

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Records prompts and answers with a canned reply.
#[derive(Default)]
pub struct FakeGenerator {
    pub reply: String,
    pub delay: Option<Duration>,
    pub fail: bool,
    pub calls: AtomicUsize,
    pub released: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, prompt: &str, _settings: &GenerationSettings) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ModelError::RequestFailed("CUDA out of memory".into()));
        }
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "fake-generator"
    }

    async fn release(&self) -> Result<(), ModelError> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Wraps a shared `FakeGenerator` so the test keeps a handle to it.
pub struct SharedGenerator(pub Arc<FakeGenerator>);

#[async_trait]
impl Generator for SharedGenerator {
    async fn generate(&self, prompt: &str, settings: &GenerationSettings) -> Result<String, ModelError> {
        self.0.generate(prompt, settings).await
    }

    fn model_name(&self) -> &str {
        self.0.model_name()
    }

    async fn release(&self) -> Result<(), ModelError> {
        self.0.release().await
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

pub struct FakeClassifier {
    pub label: &'static str,
    pub confidence: f32,
    pub delay: Option<Duration>,
}

#[async_trait]
impl EmotionClassifier for FakeClassifier {
    async fn classify(&self, _text: &str) -> Result<Classification, ModelError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Classification::new(self.label, self.confidence))
    }

    fn model_name(&self) -> &str {
        "fake-classifier"
    }
}

pub struct BrokenKeywords;

#[async_trait]
impl KeywordSource for BrokenKeywords {
    async fn extract(&self, _text: &str, _limit: usize) -> Result<Vec<String>, ModelError> {
        Err(ModelError::RequestFailed("segmenter dictionary missing".into()))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// Rule-based extraction that first sleeps for `delay`.
pub struct SlowKeywords {
    pub delay: Duration,
}

#[async_trait]
impl KeywordSource for SlowKeywords {
    async fn extract(&self, text: &str, limit: usize) -> Result<Vec<String>, ModelError> {
        tokio::time::sleep(self.delay).await;
        RuleKeywordSource::default().extract(text, limit).await
    }

    fn name(&self) -> &str {
        "slow"
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Scriptable capability loader.
pub struct FakeLoader {
    pub generator: Arc<FakeGenerator>,
    pub reject_quantized: bool,
    pub reject_flash: bool,
    pub generator_unavailable: bool,
    pub embedder_fails: bool,
    pub classifier: Option<(&'static str, f32)>,
    pub classifier_delay: Option<Duration>,
    pub broken_keywords: bool,
    pub keyword_delay: Option<Duration>,
    pub load_delay: Option<Duration>,
    pub prefer_quantized: bool,
    pub prefer_flash: bool,
    pub attempts: Mutex<Vec<GeneratorVariant>>,
    pub embedder_loads: AtomicUsize,
}

impl FakeLoader {
    pub fn new(generator: Arc<FakeGenerator>) -> Self {
        Self {
            generator,
            reject_quantized: false,
            reject_flash: false,
            generator_unavailable: false,
            embedder_fails: false,
            classifier: Some(("POSITIVE", 0.9)),
            classifier_delay: None,
            broken_keywords: false,
            keyword_delay: None,
            load_delay: None,
            prefer_quantized: true,
            prefer_flash: true,
            attempts: Mutex::new(Vec::new()),
            embedder_loads: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> Vec<GeneratorVariant> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl CapabilityLoader for FakeLoader {
    async fn load_embedder(&self) -> Result<Arc<dyn Embedder>, ModelError> {
        self.embedder_loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        if self.embedder_fails {
            return Err(ModelError::Unavailable("embedding server unreachable".into()));
        }
        Ok(Arc::new(HashedEmbedder::new(64)))
    }

    async fn load_generator(&self, variant: GeneratorVariant) -> Result<Arc<dyn Generator>, ModelError> {
        self.attempts.lock().push(variant);
        if self.generator_unavailable {
            return Err(ModelError::Unavailable("model weights missing".into()));
        }
        if self.reject_quantized && variant.precision == Precision::Quantized {
            return Err(ModelError::Unsupported("4-bit kernels not available".into()));
        }
        if self.reject_flash && variant.attention == AttentionKernel::Flash {
            return Err(ModelError::Unsupported("flash attention not supported on this device".into()));
        }
        Ok(Arc::new(SharedGenerator(Arc::clone(&self.generator))))
    }

    async fn load_classifier(&self) -> Result<Arc<dyn EmotionClassifier>, ModelError> {
        match self.classifier {
            Some((label, confidence)) => Ok(Arc::new(FakeClassifier {
                label,
                confidence,
                delay: self.classifier_delay,
            })),
            None => Err(ModelError::Unavailable("classifier download failed".into())),
        }
    }

    fn keyword_source(&self) -> Arc<dyn KeywordSource> {
        if self.broken_keywords {
            Arc::new(BrokenKeywords)
        } else if let Some(delay) = self.keyword_delay {
            Arc::new(SlowKeywords { delay })
        } else {
            Arc::new(RuleKeywordSource::default())
        }
    }

    fn prefer_quantized(&self) -> bool {
        self.prefer_quantized
    }

    fn prefer_flash_attention(&self) -> bool {
        self.prefer_flash
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub async fn ready_engine(loader: FakeLoader) -> (Arc<Engine>, Arc<FakeLoader>) {
    ready_engine_with(NyraConfig::default(), loader).await
}

pub async fn ready_engine_with(config: NyraConfig, loader: FakeLoader) -> (Arc<Engine>, Arc<FakeLoader>) {
    let loader = Arc::new(loader);
    let engine = Arc::new(Engine::with_loader(config, loader.clone()));
    engine.initialize().await;
    (engine, loader)
}

pub fn memory(i: usize, content: &str) -> MemoryEntry {
    MemoryEntry::new(format!("m{i}"), content, vec![], 0.5, Utc::now(), "conversation")
        .expect("valid memory")
}

pub fn happy_state() -> EmotionalState {
    EmotionalState::new(0.8, 0.6, 0.7, 0.3, "happy", Utc::now()).expect("valid state")
}
