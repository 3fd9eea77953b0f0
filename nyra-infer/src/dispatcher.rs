//! Task routing.
//!
//! The dispatcher turns one task into one [`InferenceResult`]. It never
//! returns an error and never panics past its boundary: every failure is
//! folded into the envelope, timed, and logged exactly once on the
//! `nyra::dispatch` target.

use std::time::{Duration, Instant};

use chrono::Utc;
use nyra_core::config::NyraConfig;
use nyra_core::context::ContextAssembler;
use nyra_core::emotion::Lexicon;
use nyra_core::keywords::raw_tokens;
use nyra_core::types::EmotionalState;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::InferenceError;
use crate::estimator::EmotionalStateEstimator;
use crate::provider::ModelProvider;
use crate::task::{InferenceRequest, InferenceResult, InferenceTask, TaskPayload};
use crate::telemetry::DISPATCH_TARGET;

/// Routes tasks to capabilities and wraps the outcome.
#[derive(Debug, Clone)]
pub struct InferenceDispatcher {
    assembler: ContextAssembler,
    estimator: EmotionalStateEstimator,
    max_prompt_chars: usize,
    request_timeout: Option<Duration>,
}

impl InferenceDispatcher {
    /// Build a dispatcher from configuration.
    #[must_use]
    pub fn new(config: &NyraConfig) -> Self {
        Self {
            assembler: ContextAssembler::new(&config.context),
            estimator: EmotionalStateEstimator::new(Lexicon::from_config(&config.emotion)),
            max_prompt_chars: config.generation.max_prompt_chars,
            request_timeout: config.dispatch.request_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Override the per-request deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Convert and dispatch a raw request.
    ///
    /// Conversion failures (unknown task tag, missing reply context) are
    /// reported as client errors without touching any capability.
    pub async fn dispatch_request(&self, provider: &ModelProvider, request: InferenceRequest) -> InferenceResult {
        let start = Instant::now();
        let task_tag = request.task_type.clone();
        match InferenceTask::try_from(request) {
            Ok(task) => self.dispatch_from(provider, task, start).await,
            Err(err) => Self::finish(&task_tag, start, Err(err)),
        }
    }

    /// Dispatch a validated task.
    pub async fn dispatch(&self, provider: &ModelProvider, task: InferenceTask) -> InferenceResult {
        self.dispatch_from(provider, task, Instant::now()).await
    }

    /// Build a failure envelope for a request refused before dispatch.
    #[must_use]
    pub fn reject(task_tag: &str, error: InferenceError) -> InferenceResult {
        Self::finish(task_tag, Instant::now(), Err(error))
    }

    async fn dispatch_from(&self, provider: &ModelProvider, task: InferenceTask, start: Instant) -> InferenceResult {
        let task_tag = task.task_type().as_str();
        let outcome = match self.request_timeout {
            Some(deadline) => {
                let fallback = DeadlineFallback::for_task(&task);
                match tokio::time::timeout(deadline, self.execute(provider, task)).await {
                    Ok(outcome) => outcome,
                    Err(_) => match fallback {
                        Some(fallback) => {
                            warn!(
                                target: DISPATCH_TARGET,
                                task = task_tag,
                                deadline_ms = duration_ms(deadline),
                                "deadline elapsed, returning fallback result"
                            );
                            Ok(fallback.into_payload(provider))
                        }
                        None => Err(InferenceError::Timeout(duration_ms(deadline))),
                    },
                }
            }
            None => self.execute(provider, task).await,
        };
        Self::finish(task_tag, start, outcome)
    }

    async fn execute(&self, provider: &ModelProvider, task: InferenceTask) -> Result<TaskPayload, InferenceError> {
        match task {
            InferenceTask::Embedding { text } => Ok(TaskPayload::Embedding(provider.embed(&text).await?)),
            InferenceTask::Response { text, context, state } => {
                let prompt = self
                    .assembler
                    .build_prompt(Some(&state), &context, &text, self.max_prompt_chars);
                Ok(TaskPayload::Text(provider.generate(&prompt).await?))
            }
            InferenceTask::Emotion { text } => Ok(TaskPayload::Emotion(self.estimator.estimate(provider, &text).await)),
            InferenceTask::Keywords { text } => Ok(TaskPayload::Keywords(provider.extract_keywords(&text).await)),
        }
    }

    fn finish(task_tag: &str, start: Instant, outcome: Result<TaskPayload, InferenceError>) -> InferenceResult {
        let elapsed_ms = duration_ms(start.elapsed());
        let request_id = Uuid::new_v4();
        match outcome {
            Ok(payload) => {
                info!(
                    target: DISPATCH_TARGET,
                    %request_id,
                    task = task_tag,
                    elapsed_ms,
                    success = true,
                    "task completed"
                );
                InferenceResult::succeeded(payload, elapsed_ms)
            }
            Err(err) => {
                let failure = err.failure_kind();
                warn!(
                    target: DISPATCH_TARGET,
                    %request_id,
                    task = task_tag,
                    elapsed_ms,
                    success = false,
                    failure = failure.as_str(),
                    error = %err,
                    "task failed"
                );
                InferenceResult::failed(&err, elapsed_ms)
            }
        }
    }
}

impl Default for InferenceDispatcher {
    fn default() -> Self {
        Self::new(&NyraConfig::default())
    }
}

/// Result served when an emotion or keyword task outlives its deadline.
/// Neither task is allowed to fail.
enum DeadlineFallback {
    NeutralEmotion,
    RawTokens(String),
}

impl DeadlineFallback {
    fn for_task(task: &InferenceTask) -> Option<Self> {
        match task {
            InferenceTask::Emotion { .. } => Some(Self::NeutralEmotion),
            InferenceTask::Keywords { text } => Some(Self::RawTokens(text.clone())),
            InferenceTask::Embedding { .. } | InferenceTask::Response { .. } => None,
        }
    }

    fn into_payload(self, provider: &ModelProvider) -> TaskPayload {
        match self {
            Self::NeutralEmotion => TaskPayload::Emotion(EmotionalState::neutral(Utc::now())),
            Self::RawTokens(text) => TaskPayload::Keywords(raw_tokens(&text, provider.keyword_limit())),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
