//! Per-message accumulation of classified packets.

use crate::answer::AnswerAssembler;
use crate::compile::apply_detail;
use crate::documents::DocumentSet;
use crate::packet::{ClassifiedPacket, MessageDetail};
use crate::tree::{fold, Fragment, SubQuestionTree};

/// Everything known so far about one in-flight assistant message.
///
/// Owned by exactly one engine and discarded after final compilation.
#[derive(Debug, Clone, Default)]
pub struct StreamingAnswerState {
    pub(crate) answer: AnswerAssembler,
    pub(crate) tree: SubQuestionTree,
    pub(crate) documents: DocumentSet,
    pub(crate) is_complete: bool,
    pub(crate) error: Option<String>,
    pub(crate) detail: Option<Box<MessageDetail>>,
}

impl StreamingAnswerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one packet into the state.
    pub fn apply(&mut self, packet: &ClassifiedPacket) {
        match packet {
            ClassifiedPacket::AnswerPiece { text: Some(text) } => self.answer.push_piece(text),
            ClassifiedPacket::AnswerPiece { text: None } => self.is_complete = true,
            ClassifiedPacket::ThinkingTokens { text } => self.answer.push_thinking(text),
            ClassifiedPacket::DocumentInfo(doc) => {
                self.documents.add(doc.clone());
            }
            ClassifiedPacket::DocumentBatch { documents, .. } => {
                self.documents.extend(documents.iter().cloned());
            }
            ClassifiedPacket::StreamingError { message } => {
                self.error = Some(message.clone());
                self.is_complete = true;
            }
            ClassifiedPacket::MessageDetail(detail) => {
                if self.error.is_none() {
                    self.error = detail.error.clone().filter(|e| !e.is_empty());
                }
                apply_detail(&mut self.tree, &mut self.documents, detail);
                self.detail = Some(detail.clone());
            }
            ClassifiedPacket::Completion => self.is_complete = true,
            ClassifiedPacket::SubQuestionPiece { .. }
            | ClassifiedPacket::SubQueryPiece { .. }
            | ClassifiedPacket::SubAnswerPiece { .. }
            | ClassifiedPacket::StreamStop { .. }
            | ClassifiedPacket::ToolCall(_)
            | ClassifiedPacket::BackendMessage(_)
            | ClassifiedPacket::Unknown(_) => {}
        }

        if let Some(fragment) = Fragment::from_packet(packet) {
            self.tree = fold(std::mem::take(&mut self.tree), fragment);
        }
    }

    /// Mark the message complete without a completion packet.
    pub fn mark_complete(&mut self) {
        self.is_complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }
}
