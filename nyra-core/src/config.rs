//! Configuration for the Nyra inference core.
//!
//! Maps directly to `nyra.toml`. Every field has a default, so an empty file
//! (or no file at all) yields a working configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NyraError, Result};
use crate::keywords::MAX_KEYWORDS;

/// Top-level Nyra configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NyraConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Embedding capability.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Reply generation capability.
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Emotion classification and the lexical fallback.
    #[serde(default)]
    pub emotion: EmotionConfig,
    /// Keyword extraction.
    #[serde(default)]
    pub keywords: KeywordConfig,
    /// Prompt context assembly.
    #[serde(default)]
    pub context: ContextConfig,
    /// Request dispatch.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl NyraConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `NyraError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| NyraError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from an optional TOML file layered under
    /// `NYRA__<SECTION>__<FIELD>` environment overrides.
    ///
    /// # Errors
    /// Returns `NyraError::Config` if a source cannot be read, a value has the
    /// wrong type, or the result fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("NYRA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| NyraError::Config(e.to_string()))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| NyraError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns `NyraError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.generation.model.trim().is_empty() {
            return Err(NyraError::Config("generation.model must not be empty".into()));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(NyraError::Config("embedding.model must not be empty".into()));
        }
        if self.embedding.dimensions == 0 {
            return Err(NyraError::Config("embedding.dimensions must be > 0".into()));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(NyraError::Config(format!(
                "generation.temperature {} must be within [0.0, 2.0]",
                self.generation.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.generation.top_p) || self.generation.top_p == 0.0 {
            return Err(NyraError::Config(format!(
                "generation.top_p {} must be within (0.0, 1.0]",
                self.generation.top_p
            )));
        }
        if !(1..=MAX_KEYWORDS).contains(&self.keywords.max_keywords) {
            return Err(NyraError::Config(format!(
                "keywords.max_keywords {} must be within [1, {MAX_KEYWORDS}]",
                self.keywords.max_keywords
            )));
        }
        if self.context.max_memories == 0 {
            return Err(NyraError::Config("context.max_memories must be > 0".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per line, for the observability pipeline.
    Json,
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log line format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Which embedding implementation to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama-compatible `/api/embed` endpoint.
    #[default]
    Ollama,
    /// Deterministic feature-hashed vectors; no model required.
    Hashed,
    /// In-process ONNX model (requires the `onnx` feature).
    Onnx,
}

/// Embedding capability settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Implementation to load.
    #[serde(default)]
    pub backend: EmbeddingBackend,
    /// Base URL of the embedding server.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Vector dimensionality (used by the hashed backend and for validation).
    #[serde(default = "default_1024")]
    pub dimensions: usize,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_10000")]
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            base_url: default_ollama_url(),
            model: default_embedding_model(),
            dimensions: 1024,
            timeout_ms: 10_000,
        }
    }
}

/// Reply generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the generation server.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Standard-precision model name.
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Reduced-precision (quantized) variant tried first, if any.
    #[serde(default = "default_quantized_model")]
    pub quantized_model: Option<String>,
    /// Try the quantized variant before standard precision.
    #[serde(default = "default_true")]
    pub prefer_quantized: bool,
    /// Try the optimized attention kernel before the standard one.
    #[serde(default = "default_true")]
    pub prefer_flash_attention: bool,
    /// Maximum tokens generated per reply.
    #[serde(default = "default_256")]
    pub max_new_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Nucleus sampling threshold.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Penalty applied to repeated tokens.
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
    /// Upper bound on prompt length in characters.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_60000")]
    pub timeout_ms: u64,
    /// Template tokens removed from generated text.
    #[serde(default = "default_structural_tokens")]
    pub structural_tokens: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_chat_model(),
            quantized_model: default_quantized_model(),
            prefer_quantized: true,
            prefer_flash_attention: true,
            max_new_tokens: 256,
            temperature: default_temperature(),
            top_p: default_top_p(),
            repetition_penalty: default_repetition_penalty(),
            max_prompt_chars: default_max_prompt_chars(),
            timeout_ms: 60_000,
            structural_tokens: default_structural_tokens(),
        }
    }
}

/// Emotion classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionConfig {
    /// Whether to attempt loading the classifier at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base URL of the text-classification server.
    #[serde(default = "default_classifier_url")]
    pub base_url: String,
    /// Classifier model name (informational; the server decides).
    #[serde(default = "default_emotion_model")]
    pub model: String,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_5000")]
    pub timeout_ms: u64,
    /// Lexicon of positive words for the heuristic fallback.
    #[serde(default = "default_positive_words")]
    pub positive_words: Vec<String>,
    /// Lexicon of negative words for the heuristic fallback.
    #[serde(default = "default_negative_words")]
    pub negative_words: Vec<String>,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_classifier_url(),
            model: default_emotion_model(),
            timeout_ms: 5_000,
            positive_words: default_positive_words(),
            negative_words: default_negative_words(),
        }
    }
}

/// Keyword extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    /// Maximum keywords returned per request.
    #[serde(default = "default_10")]
    pub max_keywords: usize,
    /// Minimum length (in chars) of a Latin-script keyword.
    #[serde(default = "default_2")]
    pub min_token_chars: usize,
    /// Tokens never returned as keywords.
    #[serde(default = "default_stopwords")]
    pub stopwords: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            max_keywords: 10,
            min_token_chars: 2,
            stopwords: default_stopwords(),
        }
    }
}

/// Prompt context assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum memory entries rendered into a prompt.
    #[serde(default = "default_5")]
    pub max_memories: usize,
    /// Persona name substituted into `{persona_name}`.
    #[serde(default = "default_persona_name")]
    pub persona_name: String,
    /// Persona instruction block (system role).
    #[serde(default = "default_persona")]
    pub persona: String,
    /// Rendered in place of the memory list when no entries are supplied.
    #[serde(default = "default_no_memory_placeholder")]
    pub no_memory_placeholder: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_memories: 5,
            persona_name: default_persona_name(),
            persona: default_persona(),
            no_memory_placeholder: default_no_memory_placeholder(),
        }
    }
}

/// Request dispatch settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Optional wall-clock deadline per request. `None` waits indefinitely.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Default value functions (required by serde)
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_ollama_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_classifier_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_embedding_model() -> String {
    "bge-m3".to_string()
}
fn default_chat_model() -> String {
    "qwen3:14b".to_string()
}
#[allow(clippy::unnecessary_wraps)]
fn default_quantized_model() -> Option<String> {
    Some("qwen3:14b-q4_K_M".to_string())
}
fn default_emotion_model() -> String {
    "uer/roberta-base-finetuned-dianping-chinese".to_string()
}
fn default_1024() -> usize {
    1024
}
fn default_10000() -> u64 {
    10_000
}
fn default_60000() -> u64 {
    60_000
}
fn default_5000() -> u64 {
    5_000
}
fn default_256() -> u32 {
    256
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_repetition_penalty() -> f32 {
    1.1
}
fn default_max_prompt_chars() -> usize {
    6_000
}
fn default_10() -> usize {
    10
}
fn default_5() -> usize {
    5
}
fn default_2() -> usize {
    2
}
fn default_structural_tokens() -> Vec<String> {
    ["<|im_start|>", "<|im_end|>", "<|endoftext|>"]
        .iter()
        .map(ToString::to_string)
        .collect()
}
fn default_positive_words() -> Vec<String> {
    [
        "好", "棒", "喜欢", "爱", "开心", "高兴", "快乐", "赞", "good", "great", "love", "happy",
        "like", "glad",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
fn default_negative_words() -> Vec<String> {
    [
        "坏", "讨厌", "难过", "伤心", "痛苦", "糟糕", "失望", "bad", "hate", "sad", "awful",
        "terrible", "disappointed",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
fn default_stopwords() -> Vec<String> {
    [
        "的", "了", "是", "我", "你", "他", "她", "它", "们", "在", "有", "和", "就", "不", "也",
        "都", "这", "那", "吗", "呢", "吧", "啊", "the", "a", "an", "and", "or", "but", "is",
        "are", "was", "were", "to", "of", "in", "on", "for", "with", "it", "this", "that", "i",
        "you", "me", "my", "your",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
fn default_persona_name() -> String {
    "Nyra".to_string()
}
fn default_persona() -> String {
    "你是{persona_name}，一个聪明、嘴甜、体贴的AI伴侣。\
{persona_name}的名字寓意夜晚与神秘，象征着优雅和智慧。\n\n\
你的特点是：\n\
1. 聪明：能理解用户的真实意图和情感需求\n\
2. 嘴甜：说话温柔体贴，善于表达关爱\n\
3. 体贴：优先考虑用户的感受和需求\n\n\
请以{persona_name}的身份，根据当前的情感状态和对话上下文，生成合适的回复。"
        .to_string()
}
fn default_no_memory_placeholder() -> String {
    "暂无相关记忆。".to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
