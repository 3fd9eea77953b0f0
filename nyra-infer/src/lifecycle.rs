//! Engine lifecycle: loading, readiness gate, health, teardown.
//!
//! ```text
//! Uninitialized → Initializing → Ready → ShuttingDown → Stopped
//! ```
//!
//! Transitions only move forward. Capabilities are loaded once during
//! `Initializing` and never reloaded. Requests are refused with
//! `ServiceNotReady` in every state but `Ready`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use nyra_core::config::NyraConfig;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::backend::ConfiguredLoader;
use crate::dispatcher::InferenceDispatcher;
use crate::error::InferenceError;
use crate::loader::{load_generator, Capability, CapabilityLoader, LoadOutcome, LoadReport};
use crate::provider::ModelProvider;
use crate::task::{InferenceRequest, InferenceResult};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Created, nothing loaded.
    Uninitialized,
    /// Capabilities are loading.
    Initializing,
    /// Serving requests.
    Ready,
    /// Teardown in progress.
    ShuttingDown,
    /// Resources released.
    Stopped,
}

impl LifecycleState {
    /// Lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time health report for an external health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// "healthy", "starting" or "stopping".
    pub status: &'static str,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Whether requests are being served.
    pub engine_ready: bool,
    /// Lifecycle state.
    pub state: LifecycleState,
    /// Per-capability load outcomes.
    pub capabilities: LoadReport,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Process-wide inference engine handle. Share it as `Arc<Engine>`.
pub struct Engine {
    loader: Arc<dyn CapabilityLoader>,
    config: NyraConfig,
    dispatcher: InferenceDispatcher,
    state: RwLock<LifecycleState>,
    provider: OnceLock<Arc<ModelProvider>>,
    report: RwLock<LoadReport>,
    /// Set by a shutdown that arrived while capabilities were loading.
    shutdown_pending: AtomicBool,
}

impl Engine {
    /// Create an engine that loads the backends selected in `config`.
    #[must_use]
    pub fn new(config: NyraConfig) -> Self {
        let loader = Arc::new(ConfiguredLoader::new(config.clone()));
        Self::with_loader(config, loader)
    }

    /// Create an engine with a custom capability loader.
    #[must_use]
    pub fn with_loader(config: NyraConfig, loader: Arc<dyn CapabilityLoader>) -> Self {
        Self {
            loader,
            dispatcher: InferenceDispatcher::new(&config),
            config,
            state: RwLock::new(LifecycleState::Uninitialized),
            provider: OnceLock::new(),
            report: RwLock::new(LoadReport::default()),
            shutdown_pending: AtomicBool::new(false),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    /// Whether requests are being served.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    /// Snapshot of the load report.
    #[must_use]
    pub fn load_report(&self) -> LoadReport {
        self.report.read().clone()
    }

    /// Move from `from` to `to` if the engine is currently in `from`.
    fn advance(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let mut state = self.state.write();
        if *state == from && to > from {
            *state = to;
            true
        } else {
            false
        }
    }

    /// Load every capability and open the readiness gate.
    ///
    /// Load order: embedder, generator (walking its degradation sequence),
    /// emotion classifier, keyword source. Each outcome is logged and
    /// recorded independently; a failed capability does not stop the
    /// others. Calling this more than once is a no-op that returns the
    /// existing report.
    pub async fn initialize(&self) -> LoadReport {
        if !self.advance(LifecycleState::Uninitialized, LifecycleState::Initializing) {
            warn!(state = %self.state(), "initialize called more than once, ignoring");
            return self.load_report();
        }
        info!("initializing inference engine");

        let mut report = LoadReport::default();
        let loader = self.loader.as_ref();
        let keywords = loader.keyword_source();
        let keyword_source = keywords.name().to_string();
        let mut provider = ModelProvider::new(keywords)
            .with_generation_config(&self.config.generation)
            .with_keyword_limit(self.config.keywords.max_keywords);

        match loader.load_embedder().await {
            Ok(embedder) => {
                report.record(Capability::Embedder, LoadOutcome::Loaded, Some(embedder.model_name().to_string()));
                provider = provider.with_embedder(embedder);
            }
            Err(e) => report.record(Capability::Embedder, LoadOutcome::Unavailable(e.to_string()), None),
        }

        let (generator, outcome) = load_generator(loader).await;
        let generator_model = generator.as_ref().map(|g| g.model_name().to_string());
        report.record(Capability::Generator, outcome, generator_model);
        if let Some(generator) = generator {
            provider = provider.with_generator(generator);
        }

        if loader.classifier_enabled() {
            match loader.load_classifier().await {
                Ok(classifier) => {
                    report.record(
                        Capability::EmotionClassifier,
                        LoadOutcome::Loaded,
                        Some(classifier.model_name().to_string()),
                    );
                    provider = provider.with_classifier(classifier);
                }
                Err(e) => report.record(
                    Capability::EmotionClassifier,
                    LoadOutcome::Degraded(format!("using lexicon fallback: {e}")),
                    None,
                ),
            }
        } else {
            report.record(
                Capability::EmotionClassifier,
                LoadOutcome::Degraded("disabled by configuration, using lexicon fallback".into()),
                None,
            );
        }

        report.record(
            Capability::KeywordExtractor,
            LoadOutcome::Loaded,
            Some(keyword_source),
        );

        // OnceLock is only ever set here, behind the Initializing transition.
        let _ = self.provider.set(Arc::new(provider));
        *self.report.write() = report.clone();

        let shutdown_pending = {
            let mut state = self.state.write();
            let pending = self.shutdown_pending.load(Ordering::SeqCst);
            *state = if pending {
                LifecycleState::ShuttingDown
            } else {
                LifecycleState::Ready
            };
            pending
        };
        if shutdown_pending {
            info!("shutdown was requested during initialization, not opening the gate");
            self.teardown().await;
        } else {
            info!(fully_loaded = report.is_fully_loaded(), "inference engine ready");
        }
        report
    }

    /// Serve one request.
    ///
    /// Refused with `ServiceNotReady` unless the engine is `Ready`.
    pub async fn handle(&self, request: InferenceRequest) -> InferenceResult {
        let state = self.state();
        match (state, self.provider.get()) {
            (LifecycleState::Ready, Some(provider)) => {
                self.dispatcher.dispatch_request(provider, request).await
            }
            _ => InferenceDispatcher::reject(
                &request.task_type,
                InferenceError::ServiceNotReady(state.to_string()),
            ),
        }
    }

    /// Health snapshot.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        let state = self.state();
        let status = match state {
            LifecycleState::Ready => "healthy",
            LifecycleState::Uninitialized | LifecycleState::Initializing => "starting",
            LifecycleState::ShuttingDown | LifecycleState::Stopped => "stopping",
        };
        HealthSnapshot {
            status,
            timestamp: Utc::now(),
            engine_ready: state == LifecycleState::Ready,
            state,
            capabilities: self.load_report(),
        }
    }

    /// Close the readiness gate and release the generator.
    ///
    /// From `Uninitialized` the engine goes straight to `Stopped`. During
    /// `Initializing` the shutdown is deferred: loading finishes, the gate
    /// never opens, and the generator is released right away. Calls after
    /// shutdown has begun are ignored.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.write();
            match *state {
                LifecycleState::Uninitialized => {
                    *state = LifecycleState::Stopped;
                    info!("engine stopped before initialization");
                    return;
                }
                LifecycleState::Initializing => {
                    self.shutdown_pending.store(true, Ordering::SeqCst);
                    info!("shutdown requested while initializing, deferring until loading completes");
                    return;
                }
                LifecycleState::Ready => *state = LifecycleState::ShuttingDown,
                current @ (LifecycleState::ShuttingDown | LifecycleState::Stopped) => {
                    warn!(state = %current, "shutdown ignored");
                    return;
                }
            }
        }
        self.teardown().await;
    }

    /// Release capabilities and finish the `ShuttingDown → Stopped` move.
    async fn teardown(&self) {
        info!("shutting down inference engine");
        if let Some(provider) = self.provider.get() {
            provider.release().await;
        }
        self.advance(LifecycleState::ShuttingDown, LifecycleState::Stopped);
        info!("inference engine stopped");
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state())
            .field("provider", &self.provider.get())
            .finish_non_exhaustive()
    }
}
