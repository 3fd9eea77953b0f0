//! Inference error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a capability provider (embedder, generator, classifier,
/// keyword source) at load time or on invocation.
#[derive(Debug, Error)]
pub enum ModelError {
    /// HTTP request failed or the backend returned an error status.
    #[error("model request failed: {0}")]
    RequestFailed(String),

    /// Backend response could not be parsed.
    #[error("failed to parse model response: {0}")]
    ParseError(String),

    /// Request timed out.
    #[error("model request timed out after {0}ms")]
    Timeout(u64),

    /// Capability is not loaded or the backend cannot be reached.
    #[error("model unavailable: {0}")]
    Unavailable(String),

    /// The requested load variant is not supported here. Triggers the next
    /// variant in the degradation sequence.
    #[error("unsupported load variant: {0}")]
    Unsupported(String),

    /// The spawned worker running the computation panicked or was aborted.
    #[error("model worker failed: {0}")]
    Worker(String),
}

impl ModelError {
    /// Classify a transport error from a request sent with `timeout`.
    #[must_use]
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ModelError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
        } else {
            ModelError::from(err)
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ModelError::Unavailable(err.to_string())
        } else if err.is_decode() {
            ModelError::ParseError(err.to_string())
        } else {
            ModelError::RequestFailed(err.to_string())
        }
    }
}

/// How a request failed, as seen by the transport shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed or incomplete task. Never retried.
    Client,
    /// Engine not ready (starting, or shutting down).
    NotReady,
    /// A capability failed while serving the task.
    Model,
    /// The per-request deadline elapsed.
    Timeout,
}

impl FailureKind {
    /// HTTP status the transport should answer with.
    ///
    /// Model and timeout failures travel inside a normal response envelope
    /// with `success: false`, so they map to 200.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::Client => 400,
            Self::NotReady => 503,
            Self::Model | Self::Timeout => 200,
        }
    }

    /// Short label for log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client_error",
            Self::NotReady => "service_not_ready",
            Self::Model => "model_failure",
            Self::Timeout => "timeout",
        }
    }
}

/// Failure of a single inference request.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The request was malformed; the message is returned verbatim.
    #[error("{0}")]
    ClientError(String),

    /// The engine is not in the `Ready` state.
    #[error("inference engine not ready (state: {0})")]
    ServiceNotReady(String),

    /// A capability failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The per-request deadline elapsed before the task finished.
    #[error("request exceeded deadline of {0}ms")]
    Timeout(u64),
}

impl InferenceError {
    /// Classification used for status mapping and logging.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::ClientError(_) => FailureKind::Client,
            Self::ServiceNotReady(_) => FailureKind::NotReady,
            Self::Model(_) => FailureKind::Model,
            Self::Timeout(_) => FailureKind::Timeout,
        }
    }

    /// HTTP status the transport should answer with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.failure_kind().http_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(InferenceError::ClientError("x".into()).http_status(), 400);
        assert_eq!(InferenceError::ServiceNotReady("initializing".into()).http_status(), 503);
        assert_eq!(InferenceError::Model(ModelError::Timeout(5)).http_status(), 200);
        assert_eq!(InferenceError::Timeout(100).http_status(), 200);
    }

    #[test]
    fn client_error_message_is_verbatim() {
        let err = InferenceError::ClientError("unsupported task type: Foo".into());
        assert_eq!(err.to_string(), "unsupported task type: Foo");
    }

    #[test]
    fn model_error_is_transparent() {
        let err = InferenceError::from(ModelError::Unavailable("generator not loaded".into()));
        assert_eq!(err.to_string(), "model unavailable: generator not loaded");
        assert_eq!(err.failure_kind(), FailureKind::Model);
    }
}
