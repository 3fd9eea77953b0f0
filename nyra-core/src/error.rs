//! Error types for the Nyra core library.

use thiserror::Error;

/// Top-level error type for all Nyra core operations.
#[derive(Error, Debug)]
pub enum NyraError {
    /// An emotional axis was outside `[0.0, 1.0]` or not a finite number.
    #[error("Invalid emotional state: {axis} = {value} (must be within [0.0, 1.0])")]
    InvalidEmotionalState {
        /// Which axis failed validation.
        axis: &'static str,
        /// The offending value.
        value: f32,
    },

    /// A memory entry failed validation.
    #[error("Invalid memory entry {id}: {reason}")]
    InvalidMemoryEntry {
        /// Identifier of the rejected entry.
        id: String,
        /// Why the entry was rejected.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, NyraError>;
