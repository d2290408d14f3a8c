//! Top-level answer and thinking text.

use crate::text::split_think_blocks;

/// Append-only accumulation of the top-level answer.
///
/// The stored answer is always the exact concatenation of the pieces
/// received; think-block extraction only happens in [`AnswerAssembler::render`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerAssembler {
    answer: String,
    thinking: String,
}

impl AnswerAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_piece(&mut self, piece: &str) {
        self.answer.push_str(piece);
    }

    pub fn push_thinking(&mut self, text: &str) {
        self.thinking.push_str(text);
    }

    /// Answer and thinking text as a consumer should see them.
    ///
    /// With `extract_think` set, `<think>` blocks inside the answer are
    /// moved after any separately streamed thinking tokens.
    pub fn render(&self, extract_think: bool) -> (String, String) {
        if !extract_think {
            return (self.answer.clone(), self.thinking.clone());
        }

        let (visible, embedded) = split_think_blocks(&self.answer);
        let thinking = match (self.thinking.is_empty(), embedded.is_empty()) {
            (_, true) => self.thinking.clone(),
            (true, false) => embedded,
            (false, false) => format!("{}\n{}", self.thinking, embedded),
        };
        (visible, thinking)
    }
}
