//! # nyra-infer — Inference Layer for Nyra
//!
//! Routes user text to one of four AI subtasks and wraps the outcome in a
//! uniform envelope:
//!   - **GenerateEmbedding**: text → unit-length vector
//!   - **GenerateResponse**: memories + emotional state + text → reply
//!   - **AnalyzeEmotion**: text → emotional state
//!   - **ExtractKeywords**: text → at most ten keywords
//!
//! # Architecture
//!
//! ```text
//! Engine (lifecycle, readiness gate, health)
//!   └─ InferenceDispatcher (validation, timing, one log event per request)
//!        ├─ ContextAssembler (nyra-core) ── prompt
//!        ├─ EmotionalStateEstimator ─────── classifier or lexicon
//!        └─ ModelProvider ───────────────── embedder / generator /
//!                                           classifier / keyword source
//! ```
//!
//! Capabilities load with graceful degradation: the generator walks
//! quantized → standard precision and flash → standard attention, and a
//! missing classifier hands emotion analysis to the lexicon heuristic.

pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod estimator;
pub mod lifecycle;
pub mod loader;
pub mod provider;
pub mod task;
pub mod telemetry;

pub use dispatcher::InferenceDispatcher;
pub use error::{FailureKind, InferenceError, ModelError};
pub use estimator::EmotionalStateEstimator;
pub use lifecycle::{Engine, HealthSnapshot, LifecycleState};
pub use loader::{LoadOutcome, LoadReport};
pub use provider::{GenerationSettings, ModelProvider};
pub use task::{InferenceRequest, InferenceResult, InferenceTask, TaskPayload, TaskType};
