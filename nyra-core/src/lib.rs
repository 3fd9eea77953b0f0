//! # Nyra Core Library
//!
//! Model-free building blocks of the Nyra companion agent's inference core.
//!
//! - **Types**: [`EmotionalState`] and [`MemoryEntry`], validated on
//!   construction and on deserialization
//! - **Emotion**: classifier-output mapping and the lexicon heuristic
//! - **Context**: persona, emotion summary and memory block rendering into a
//!   ChatML prompt
//! - **Keywords**: rule-based extraction and the raw-token fallback
//! - **Embedding**: vector helpers and a deterministic hashed embedding
//! - **Config**: `nyra.toml` plus `NYRA__*` environment overrides
//!
//! Everything here is synchronous and free of I/O except config loading.
//! Model backends, dispatch and lifecycle live in `nyra-infer`.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod embedding;
pub mod emotion;
pub mod error;
pub mod keywords;
pub mod types;

pub use config::NyraConfig;
pub use context::ContextAssembler;
pub use emotion::{Classification, Lexicon};
pub use error::{NyraError, Result};
pub use keywords::KeywordExtractor;
pub use types::*;
