//! Core type definitions for the Nyra inference core.
//!
//! Both record types are immutable once constructed. Validation happens in
//! the constructors and again on deserialization, so a value that exists is
//! always within bounds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{NyraError, Result};

// ---------------------------------------------------------------------------
// Mood
// ---------------------------------------------------------------------------

/// The three mood categories the estimator can produce.
///
/// Caller-supplied states may carry any free-form mood string; this enum only
/// names the labels the core itself derives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mood {
    /// Positive sentiment dominated.
    Happy,
    /// Negative sentiment dominated.
    Sad,
    /// Neither side dominated.
    Calm,
}

impl Mood {
    /// The label written into [`EmotionalState::mood`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Calm => "calm",
        }
    }

    /// All derivable moods.
    #[must_use]
    pub fn all() -> &'static [Mood] {
        &[Self::Happy, Self::Sad, Self::Calm]
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Emotional State
// ---------------------------------------------------------------------------

/// Affection value used whenever the core derives a state itself.
pub const DEFAULT_AFFECTION: f32 = 0.5;
/// Trust value used whenever the core derives a state itself.
pub const DEFAULT_TRUST: f32 = 0.5;
/// Dependency value used whenever the core derives a state itself.
pub const DEFAULT_DEPENDENCY: f32 = 0.3;
/// Happiness of the neutral state.
pub const NEUTRAL_HAPPINESS: f32 = 0.5;

/// Four-axis affective snapshot plus a mood label.
///
/// Every axis lies in `[0.0, 1.0]`. Out-of-range input is rejected by
/// [`EmotionalState::new`] and by deserialization; it is never clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EmotionalStateRepr")]
pub struct EmotionalState {
    happiness: f32,
    affection: f32,
    trust: f32,
    dependency: f32,
    mood: String,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct EmotionalStateRepr {
    happiness: f32,
    affection: f32,
    trust: f32,
    dependency: f32,
    mood: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    timestamp: DateTime<Utc>,
}

impl TryFrom<EmotionalStateRepr> for EmotionalState {
    type Error = NyraError;

    fn try_from(raw: EmotionalStateRepr) -> Result<Self> {
        Self::new(
            raw.happiness,
            raw.affection,
            raw.trust,
            raw.dependency,
            raw.mood,
            raw.timestamp,
        )
    }
}

impl EmotionalState {
    /// Create a validated emotional state.
    ///
    /// # Errors
    ///
    /// Returns [`NyraError::InvalidEmotionalState`] if any axis is outside
    /// `[0.0, 1.0]` or is NaN.
    pub fn new(
        happiness: f32,
        affection: f32,
        trust: f32,
        dependency: f32,
        mood: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        check_unit("happiness", happiness)?;
        check_unit("affection", affection)?;
        check_unit("trust", trust)?;
        check_unit("dependency", dependency)?;
        Ok(Self {
            happiness,
            affection,
            trust,
            dependency,
            mood: mood.into(),
            timestamp,
        })
    }

    /// The neutral default: happiness 0.5, affection 0.5, trust 0.5,
    /// dependency 0.3, mood "calm".
    #[must_use]
    pub fn neutral(timestamp: DateTime<Utc>) -> Self {
        Self::derived(NEUTRAL_HAPPINESS, Mood::Calm, timestamp)
    }

    /// Build a state from an estimator-derived happiness value.
    ///
    /// Happiness is clamped here; this is the only place clamping is allowed.
    /// The other three axes take the fixed defaults.
    pub(crate) fn derived(happiness: f32, mood: Mood, timestamp: DateTime<Utc>) -> Self {
        let happiness = if happiness.is_nan() {
            NEUTRAL_HAPPINESS
        } else {
            happiness.clamp(0.0, 1.0)
        };
        Self {
            happiness,
            affection: DEFAULT_AFFECTION,
            trust: DEFAULT_TRUST,
            dependency: DEFAULT_DEPENDENCY,
            mood: mood.as_str().to_string(),
            timestamp,
        }
    }

    /// How happy (0 = miserable, 1 = elated).
    #[must_use]
    pub fn happiness(&self) -> f32 {
        self.happiness
    }

    /// How close (0 = distant, 1 = intimate).
    #[must_use]
    pub fn affection(&self) -> f32 {
        self.affection
    }

    /// How trusting (0 = suspicious, 1 = fully trusting).
    #[must_use]
    pub fn trust(&self) -> f32 {
        self.trust
    }

    /// How dependent (0 = independent, 1 = reliant).
    #[must_use]
    pub fn dependency(&self) -> f32 {
        self.dependency
    }

    /// Free-form mood label.
    #[must_use]
    pub fn mood(&self) -> &str {
        &self.mood
    }

    /// When this snapshot was taken.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

fn check_unit(axis: &'static str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(NyraError::InvalidEmotionalState { axis, value })
    }
}

// ---------------------------------------------------------------------------
// Memory Entry
// ---------------------------------------------------------------------------

/// A past conversational fact supplied by the caller as context.
///
/// The core never creates, scores, or persists these; it only reads an
/// ordered slice of them during context assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MemoryEntryRepr")]
pub struct MemoryEntry {
    id: String,
    content: String,
    keywords: Vec<String>,
    importance: f32,
    created_at: DateTime<Utc>,
    memory_type: String,
}

#[derive(Deserialize)]
struct MemoryEntryRepr {
    id: String,
    content: String,
    #[serde(default)]
    keywords: Vec<String>,
    importance: f32,
    #[serde(deserialize_with = "timestamp::deserialize")]
    created_at: DateTime<Utc>,
    memory_type: String,
}

impl TryFrom<MemoryEntryRepr> for MemoryEntry {
    type Error = NyraError;

    fn try_from(raw: MemoryEntryRepr) -> Result<Self> {
        Self::new(
            raw.id,
            raw.content,
            raw.keywords,
            raw.importance,
            raw.created_at,
            raw.memory_type,
        )
    }
}

impl MemoryEntry {
    /// Create a validated memory entry.
    ///
    /// # Errors
    ///
    /// Returns [`NyraError::InvalidMemoryEntry`] if `importance` is outside
    /// `[0.0, 1.0]`.
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        keywords: Vec<String>,
        importance: f32,
        created_at: DateTime<Utc>,
        memory_type: impl Into<String>,
    ) -> Result<Self> {
        let id = id.into();
        if !(0.0..=1.0).contains(&importance) {
            return Err(NyraError::InvalidMemoryEntry {
                id,
                reason: format!("importance {importance} must be within [0.0, 1.0]"),
            });
        }
        Ok(Self {
            id,
            content: content.into(),
            keywords,
            importance,
            created_at,
            memory_type: memory_type.into(),
        })
    }

    /// Opaque identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The remembered text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Keywords in caller order.
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Importance score in `[0.0, 1.0]`.
    #[must_use]
    pub fn importance(&self) -> f32 {
        self.importance
    }

    /// When the memory was recorded.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Categorical tag ("conversation", "preference", "emotional", ...).
    #[must_use]
    pub fn memory_type(&self) -> &str {
        &self.memory_type
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Lenient timestamp parsing for caller-supplied records.
///
/// Accepts RFC 3339 (`2025-01-14T12:00:00Z`, with offset) as well as naive
/// ISO 8601 (`2025-01-14T12:00:00`), which is read as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    /// Parse a timestamp string.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure if neither format matches.
    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
    }

    /// Serde adapter for [`parse`].
    ///
    /// # Errors
    ///
    /// Propagates parse failures as deserialization errors.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_state_constructs() {
        let state = EmotionalState::new(0.8, 0.7, 0.9, 0.5, "happy", Utc::now()).expect("valid");
        assert!((state.happiness() - 0.8).abs() < f32::EPSILON);
        assert_eq!(state.mood(), "happy");
    }

    #[test]
    fn out_of_range_axis_rejected() {
        let err = EmotionalState::new(1.5, 0.7, 0.9, 0.5, "happy", Utc::now())
            .expect_err("happiness 1.5 must be rejected");
        assert!(matches!(
            err,
            NyraError::InvalidEmotionalState { axis: "happiness", .. }
        ));
        assert!(EmotionalState::new(0.5, 0.5, -0.1, 0.5, "calm", Utc::now()).is_err());
        assert!(EmotionalState::new(0.5, 0.5, 0.5, f32::NAN, "calm", Utc::now()).is_err());
    }

    #[test]
    fn neutral_state_has_fixed_defaults() {
        let state = EmotionalState::neutral(Utc::now());
        assert_eq!(state.happiness(), 0.5);
        assert_eq!(state.affection(), 0.5);
        assert_eq!(state.trust(), 0.5);
        assert_eq!(state.dependency(), 0.3);
        assert_eq!(state.mood(), "calm");
    }

    #[test]
    fn derived_clamps_happiness() {
        assert_eq!(EmotionalState::derived(1.7, Mood::Happy, Utc::now()).happiness(), 1.0);
        assert_eq!(EmotionalState::derived(-0.2, Mood::Sad, Utc::now()).happiness(), 0.0);
        assert_eq!(EmotionalState::derived(f32::NAN, Mood::Calm, Utc::now()).happiness(), 0.5);
    }

    #[test]
    fn deserialize_accepts_naive_timestamp() {
        let json = r#"{"happiness":0.8,"affection":0.7,"trust":0.9,"dependency":0.5,
                       "mood":"开心","timestamp":"2025-01-14T12:00:00"}"#;
        let state: EmotionalState = serde_json::from_str(json).expect("parse");
        assert_eq!(state.mood(), "开心");
        assert_eq!(state.timestamp().to_rfc3339(), "2025-01-14T12:00:00+00:00");
    }

    #[test]
    fn deserialize_rejects_out_of_range() {
        let json = r#"{"happiness":1.5,"affection":0.7,"trust":0.9,"dependency":0.5,
                       "mood":"happy","timestamp":"2025-01-14T12:00:00Z"}"#;
        assert!(serde_json::from_str::<EmotionalState>(json).is_err());
    }

    #[test]
    fn memory_entry_validates_importance() {
        assert!(MemoryEntry::new("m1", "likes coffee", vec![], 0.8, Utc::now(), "preference").is_ok());
        assert!(MemoryEntry::new("m2", "likes tea", vec![], 1.2, Utc::now(), "preference").is_err());
    }

    #[test]
    fn memory_entry_deserializes_without_keywords() {
        let json = r#"{"id":"test-1","content":"用户喜欢喝咖啡","importance":0.8,
                       "created_at":"2025-01-14T10:00:00","memory_type":"preference"}"#;
        let entry: MemoryEntry = serde_json::from_str(json).expect("parse");
        assert_eq!(entry.id(), "test-1");
        assert!(entry.keywords().is_empty());
    }

    #[test]
    fn timestamp_parse_rejects_garbage() {
        assert!(timestamp::parse("yesterday").is_err());
        assert!(timestamp::parse("2025-01-14T12:00:00.250").is_ok());
        assert!(timestamp::parse("2025-01-14T12:00:00+08:00").is_ok());
    }
}
