//! Prompt composition.
//!
//! A prompt has three layers, in order:
//!
//! 1. **System** — the agent's active prompt, verbatim
//! 2. **Conversation history** — recent messages, role-tagged, each content
//!    cut to a fixed preview length to bound the prompt size
//! 3. **New content** — the user message or tool follow-up for this level
//!
//! Composition is deterministic: identical inputs give identical prompts.

use parley_core::message::Message;

const HISTORY_HEADER: &str = "Conversation history:";

/// Inputs for one model call.
pub struct PromptInput<'a> {
    pub system: &'a str,
    pub history: &'a [Message],
    pub content: &'a str,
    /// Maximum characters of each history entry.
    pub preview_chars: usize,
}

/// Render the outbound prompt.
pub fn compose(input: &PromptInput<'_>) -> String {
    let mut sections = Vec::with_capacity(3);

    if !input.system.trim().is_empty() {
        sections.push(input.system.trim_end().to_string());
    }

    if !input.history.is_empty() {
        let mut block = String::from(HISTORY_HEADER);
        for message in input.history {
            block.push('\n');
            block.push_str(message.role.as_str());
            block.push_str(": ");
            block.push_str(preview(&message.content, input.preview_chars));
        }
        sections.push(block);
    }

    sections.push(format!("user: {}", input.content));
    sections.join("\n\n")
}

/// The first `max_chars` characters of `text`, on a char boundary.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}
