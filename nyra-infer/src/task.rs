//! Request/response envelopes and the closed task enum.
//!
//! The wire format follows the inference service contract: snake_case field
//! names (`task_type`, `emotional_state`, `processing_time_ms`), with the
//! camelCase spellings accepted on input. The task tag is a string on the
//! wire and becomes an [`InferenceTask`] exactly once, in
//! [`InferenceTask::try_from`].

use std::fmt;
use std::str::FromStr;

use nyra_core::types::{EmotionalState, MemoryEntry};
use serde::{Deserialize, Serialize};

use crate::error::{FailureKind, InferenceError};

// ---------------------------------------------------------------------------
// Request envelope
// ---------------------------------------------------------------------------

/// Inbound request as received from the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// User text the task operates on.
    pub text: String,
    /// Memory entries, most relevant first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<MemoryEntry>>,
    /// Current emotional state of the companion.
    #[serde(default, alias = "emotionalState", skip_serializing_if = "Option::is_none")]
    pub emotional_state: Option<EmotionalState>,
    /// Task tag, e.g. `"GenerateEmbedding"`.
    #[serde(alias = "taskType")]
    pub task_type: String,
}

impl InferenceRequest {
    /// A request with only text and a task tag.
    #[must_use]
    pub fn new(task_type: TaskType, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
            emotional_state: None,
            task_type: task_type.as_str().to_string(),
        }
    }

    /// Attach memory context.
    #[must_use]
    pub fn with_context(mut self, context: Vec<MemoryEntry>) -> Self {
        self.context = Some(context);
        self
    }

    /// Attach an emotional state.
    #[must_use]
    pub fn with_emotional_state(mut self, state: EmotionalState) -> Self {
        self.emotional_state = Some(state);
        self
    }

    /// Parse a JSON request body.
    ///
    /// # Errors
    ///
    /// [`InferenceError::ClientError`] for malformed JSON, missing fields,
    /// or records that fail validation (an emotional axis outside
    /// `[0.0, 1.0]`, for example).
    pub fn from_json(body: &str) -> Result<Self, InferenceError> {
        serde_json::from_str(body).map_err(|e| InferenceError::ClientError(format!("invalid request: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Task type
// ---------------------------------------------------------------------------

/// The four supported task tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Text embedding.
    GenerateEmbedding,
    /// Reply generation.
    GenerateResponse,
    /// Emotion analysis.
    AnalyzeEmotion,
    /// Keyword extraction.
    ExtractKeywords,
}

impl TaskType {
    /// Wire tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenerateEmbedding => "GenerateEmbedding",
            Self::GenerateResponse => "GenerateResponse",
            Self::AnalyzeEmotion => "AnalyzeEmotion",
            Self::ExtractKeywords => "ExtractKeywords",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = InferenceError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "GenerateEmbedding" => Ok(Self::GenerateEmbedding),
            "GenerateResponse" => Ok(Self::GenerateResponse),
            "AnalyzeEmotion" => Ok(Self::AnalyzeEmotion),
            "ExtractKeywords" => Ok(Self::ExtractKeywords),
            other => Err(InferenceError::ClientError(format!("unsupported task type: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A validated unit of work.
///
/// `Response` can only be built with a non-empty memory list and an
/// emotional state, so the dispatcher never has to re-check them.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceTask {
    /// Embed `text`.
    Embedding {
        /// Input text.
        text: String,
    },
    /// Generate a reply to `text`.
    Response {
        /// User utterance.
        text: String,
        /// Memories, most relevant first. Never empty.
        context: Vec<MemoryEntry>,
        /// Current emotional state.
        state: EmotionalState,
    },
    /// Estimate the emotional state of `text`.
    Emotion {
        /// Input text.
        text: String,
    },
    /// Extract keywords from `text`.
    Keywords {
        /// Input text.
        text: String,
    },
}

impl InferenceTask {
    /// Build a reply task.
    ///
    /// # Errors
    ///
    /// [`InferenceError::ClientError`] if `context` is empty or `state` is
    /// absent.
    pub fn response(
        text: impl Into<String>,
        context: Option<Vec<MemoryEntry>>,
        state: Option<EmotionalState>,
    ) -> Result<Self, InferenceError> {
        match (context, state) {
            (Some(context), Some(state)) if !context.is_empty() => Ok(Self::Response {
                text: text.into(),
                context,
                state,
            }),
            _ => Err(InferenceError::ClientError(
                "response generation requires non-empty context and emotional_state".into(),
            )),
        }
    }

    /// The task's tag.
    #[must_use]
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::Embedding { .. } => TaskType::GenerateEmbedding,
            Self::Response { .. } => TaskType::GenerateResponse,
            Self::Emotion { .. } => TaskType::AnalyzeEmotion,
            Self::Keywords { .. } => TaskType::ExtractKeywords,
        }
    }

    /// The input text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Embedding { text }
            | Self::Response { text, .. }
            | Self::Emotion { text }
            | Self::Keywords { text } => text,
        }
    }
}

impl TryFrom<InferenceRequest> for InferenceTask {
    type Error = InferenceError;

    fn try_from(request: InferenceRequest) -> Result<Self, Self::Error> {
        let InferenceRequest {
            text,
            context,
            emotional_state,
            task_type,
        } = request;

        match task_type.parse::<TaskType>()? {
            TaskType::GenerateEmbedding => Ok(Self::Embedding { text }),
            TaskType::GenerateResponse => Self::response(text, context, emotional_state),
            TaskType::AnalyzeEmotion => Ok(Self::Emotion { text }),
            TaskType::ExtractKeywords => Ok(Self::Keywords { text }),
        }
    }
}

// ---------------------------------------------------------------------------
// Result envelope
// ---------------------------------------------------------------------------

/// Task-shaped success payload.
///
/// Serialized untagged, so the shape alone does not identify the task: an
/// empty keyword list and an empty vector both render as `[]`. Results are
/// outbound only and are never parsed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskPayload {
    /// Unit-length embedding vector.
    Embedding(Vec<f32>),
    /// Generated reply.
    Text(String),
    /// Estimated emotional state.
    Emotion(EmotionalState),
    /// Ranked keywords.
    Keywords(Vec<String>),
}

/// Outbound response envelope. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    /// Whether the task succeeded.
    pub success: bool,
    /// Payload on success, `null` on failure.
    pub result: Option<TaskPayload>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// How the request failed. Not part of the wire format.
    #[serde(skip_serializing)]
    pub failure: Option<FailureKind>,
    /// Wall-clock processing time.
    pub processing_time_ms: u64,
}

impl InferenceResult {
    /// A successful result.
    #[must_use]
    pub fn succeeded(payload: TaskPayload, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            result: Some(payload),
            error: None,
            failure: None,
            processing_time_ms,
        }
    }

    /// A failed result.
    #[must_use]
    pub fn failed(error: &InferenceError, processing_time_ms: u64) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_string()),
            failure: Some(error.failure_kind()),
            processing_time_ms,
        }
    }

    /// HTTP status the transport should answer with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.failure.map_or(200, FailureKind::http_status)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
