//! Prompt context assembly.
//!
//! Turns a persona, an optional [`EmotionalState`] and an ordered slice of
//! [`MemoryEntry`] values into model-ready text. The assembler trusts the
//! caller's ordering: the first entries are the most relevant, and only the
//! first `max_memories` are rendered.

use tracing::debug;

use crate::config::ContextConfig;
use crate::types::{EmotionalState, MemoryEntry};

/// ChatML framing for the reply generator.
pub const CHAT_PROMPT_TEMPLATE: &str = "<|im_start|>system\n{system}<|im_end|>\n\
<|im_start|>user\n上下文信息：\n{context}\n\n用户说：{user_input}<|im_end|>\n\
<|im_start|>assistant\n";

/// Heading placed above the memory bullet list.
pub const MEMORY_HEADING: &str = "相关记忆：";

/// Emotional-state summary appended to the persona block.
pub const EMOTION_SUMMARY_TEMPLATE: &str = "\n\n当前情感状态：\n\
- 开心程度: {happiness}\n\
- 亲密程度: {affection}\n\
- 信任程度: {trust}\n\
- 心情: {mood}\n\n\
请根据这个情感状态调整你的回复风格。";

/// Role marker some servers echo at the start of a completion.
const ASSISTANT_MARKER: &str = "assistant";

/// Single-pass template interpolation.
///
/// Replaces `{key}` with the corresponding value. Unknown placeholders are
/// left untouched, and substituted values are never re-scanned, so user text
/// containing `{context}` cannot inject into the template.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });

        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Remove template tokens from generated text and trim surrounding whitespace.
///
/// A bare leading `assistant` role line left behind by the template is
/// dropped as well.
#[must_use]
pub fn strip_structural_tokens(text: &str, tokens: &[String]) -> String {
    let mut cleaned = text.to_string();
    for token in tokens.iter().filter(|t| !t.is_empty()) {
        cleaned = cleaned.replace(token.as_str(), "");
    }

    let trimmed = cleaned.trim();
    let without_marker = match trimmed.strip_prefix(ASSISTANT_MARKER) {
        Some(rest) if rest.starts_with('\n') => rest,
        _ => trimmed,
    };
    without_marker.trim().to_string()
}

/// The two text blocks produced for one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContext {
    /// System-role block: persona plus optional emotional summary.
    pub system: String,
    /// User-role context block: memory bullets or the placeholder.
    pub context: String,
    /// How many memory entries were rendered.
    pub memory_count: usize,
}

/// Renders persona, emotional state and memories into prompt text.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_memories: usize,
    persona: String,
    no_memory_placeholder: String,
}

impl ContextAssembler {
    /// Create an assembler from the `[context]` configuration.
    #[must_use]
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            max_memories: config.max_memories.max(1),
            persona: render_template(&config.persona, &[("persona_name", config.persona_name.as_str())]),
            no_memory_placeholder: config.no_memory_placeholder.clone(),
        }
    }

    /// Maximum number of memory entries rendered.
    #[must_use]
    pub fn max_memories(&self) -> usize {
        self.max_memories
    }

    /// Render the system block and the memory block.
    #[must_use]
    pub fn render(&self, state: Option<&EmotionalState>, memories: &[MemoryEntry]) -> RenderedContext {
        self.render_window(state, memories, self.max_memories)
    }

    /// Render the full generator prompt for `user_input`.
    ///
    /// If the prompt exceeds `max_chars`, trailing memory lines are dropped
    /// until it fits or a single memory remains. The persona and the user
    /// utterance are never cut.
    #[must_use]
    pub fn build_prompt(
        &self,
        state: Option<&EmotionalState>,
        memories: &[MemoryEntry],
        user_input: &str,
        max_chars: usize,
    ) -> String {
        let mut window = memories.len().min(self.max_memories);
        loop {
            let rendered = self.render_window(state, memories, window);
            let prompt = render_template(
                CHAT_PROMPT_TEMPLATE,
                &[
                    ("system", rendered.system.as_str()),
                    ("context", rendered.context.as_str()),
                    ("user_input", user_input),
                ],
            );
            let length = prompt.chars().count();
            if length <= max_chars || window <= 1 {
                if length > max_chars {
                    debug!(length, max_chars, "prompt exceeds budget with a single memory");
                }
                return prompt;
            }
            window -= 1;
        }
    }

    fn render_window(
        &self,
        state: Option<&EmotionalState>,
        memories: &[MemoryEntry],
        window: usize,
    ) -> RenderedContext {
        let mut system = self.persona.clone();
        if let Some(state) = state {
            system.push_str(&emotion_summary(state));
        }

        let shown = &memories[..memories.len().min(window)];
        let context = if shown.is_empty() {
            self.no_memory_placeholder.clone()
        } else {
            let bullets: Vec<String> = shown.iter().map(bullet_line).collect();
            format!("{MEMORY_HEADING}\n{}", bullets.join("\n"))
        };

        RenderedContext {
            system,
            context,
            memory_count: shown.len(),
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(&ContextConfig::default())
    }
}

fn emotion_summary(state: &EmotionalState) -> String {
    let happiness = format!("{:.1}", state.happiness());
    let affection = format!("{:.1}", state.affection());
    let trust = format!("{:.1}", state.trust());
    render_template(
        EMOTION_SUMMARY_TEMPLATE,
        &[
            ("happiness", happiness.as_str()),
            ("affection", affection.as_str()),
            ("trust", trust.as_str()),
            ("mood", state.mood()),
        ],
    )
}

fn bullet_line(entry: &MemoryEntry) -> String {
    let flattened: Vec<&str> = entry.content().split_whitespace().collect();
    format!("- {}", flattened.join(" "))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
