//! Sub-question tree reconstruction.
//!
//! The tree is rebuilt by folding fragments into an owned state value:
//! `fold(state, fragment) -> state'`.  Every sub-question is identified by
//! `(level, level_question_num)` and created lazily on its first fragment.
//! Text is stored raw; cleaning happens at the output boundary.

use std::collections::HashMap;

use ds_domain::model::{Document, SubQueryDetail, SubQuestion, SubQuestionKey};

use crate::packet::ClassifiedPacket;
use crate::text::clean_text;

/// `stream_type` of a stop signal that ends a sub-answer.
const SUB_ANSWER_STREAM: &str = "sub_answer";

/// One unit of sub-question data.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// `key` is `None` when the packet carried no key fields.
    QuestionText {
        key: Option<SubQuestionKey>,
        text: String,
    },
    QueryText {
        key: SubQuestionKey,
        query_id: i64,
        text: String,
    },
    AnswerText {
        key: SubQuestionKey,
        text: String,
    },
    DocumentBatch {
        key: SubQuestionKey,
        documents: Vec<Document>,
    },
    Stop {
        key: SubQuestionKey,
        stream_type: Option<String>,
    },
}

impl Fragment {
    /// The tree fragment carried by a packet, if any.
    ///
    /// Top-level document batches are not tree fragments.
    pub fn from_packet(packet: &ClassifiedPacket) -> Option<Fragment> {
        let fragment = match packet {
            ClassifiedPacket::SubQuestionPiece { key, text } => Fragment::QuestionText {
                key: *key,
                text: text.clone(),
            },
            ClassifiedPacket::SubQueryPiece {
                key,
                query_id,
                text,
            } => Fragment::QueryText {
                key: *key,
                query_id: *query_id,
                text: text.clone(),
            },
            ClassifiedPacket::SubAnswerPiece { key, text } => Fragment::AnswerText {
                key: *key,
                text: text.clone(),
            },
            ClassifiedPacket::DocumentBatch {
                key: Some(key),
                documents,
            } => Fragment::DocumentBatch {
                key: *key,
                documents: documents.clone(),
            },
            ClassifiedPacket::StreamStop {
                key, stream_type, ..
            } => Fragment::Stop {
                key: *key,
                stream_type: stream_type.clone(),
            },
            _ => return None,
        };
        Some(fragment)
    }
}

/// Accumulated sub-questions for one answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubQuestionTree {
    entries: HashMap<SubQuestionKey, SubQuestion>,
    /// Sub-question whose question text was extended last.
    last_question: Option<SubQuestionKey>,
    /// Unkeyed question text seen before any keyed question text.
    orphan_text: String,
}

/// Apply one fragment, returning the new state.
pub fn fold(state: SubQuestionTree, fragment: Fragment) -> SubQuestionTree {
    let mut next = state;
    next.apply(fragment);
    next
}

impl SubQuestionTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&mut self, fragment: Fragment) {
        match fragment {
            Fragment::QuestionText { key: None, text } => match self.last_question {
                Some(key) => self.entry(key).question_text.push_str(&text),
                None => self.orphan_text.push_str(&text),
            },
            Fragment::QuestionText {
                key: Some(key),
                text,
            } => {
                if key.is_root() {
                    return;
                }
                let orphan = std::mem::take(&mut self.orphan_text);
                let entry = self.entry(key);
                entry.question_text.push_str(&orphan);
                entry.question_text.push_str(&text);
                self.last_question = Some(key);
            }
            Fragment::QueryText {
                key,
                query_id,
                text,
            } => {
                if key.is_root() {
                    return;
                }
                let entry = self.entry(key);
                match entry.sub_queries.iter_mut().find(|q| q.query_id == query_id) {
                    Some(query) => query.query_text.push_str(&text),
                    None => entry.sub_queries.push(SubQueryDetail {
                        query_id,
                        query_text: text,
                    }),
                }
            }
            Fragment::AnswerText { key, text } => {
                if key.is_root() {
                    return;
                }
                let entry = self.entry(key);
                entry.answer_text.push_str(&text);
                entry.answer_streaming = true;
            }
            Fragment::DocumentBatch { key, documents } => {
                if key.is_root() {
                    return;
                }
                self.entry(key).documents = Some(documents);
            }
            Fragment::Stop { key, stream_type } => {
                if key.is_root() {
                    return;
                }
                let entry = self.entry(key);
                entry.is_complete = true;
                if stream_type.as_deref() == Some(SUB_ANSWER_STREAM) {
                    entry.answer_streaming = false;
                } else {
                    entry.is_stopped = true;
                }
            }
        }
    }

    fn entry(&mut self, key: SubQuestionKey) -> &mut SubQuestion {
        self.entries
            .entry(key)
            .or_insert_with(|| SubQuestion::empty(key))
    }

    /// Replace the whole collection with an authoritative list.
    ///
    /// Root entries are dropped; a later entry with the same key wins.
    pub fn replace_all(&mut self, sub_questions: Vec<SubQuestion>) {
        self.entries.clear();
        self.last_question = None;
        self.orphan_text.clear();
        for sq in sub_questions {
            let key = sq.key();
            if !key.is_root() {
                self.entries.insert(key, sq);
            }
        }
    }

    pub fn get(&self, key: SubQuestionKey) -> Option<&SubQuestion> {
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw entries sorted by `(level, level_question_num)`.
    pub fn sorted(&self) -> Vec<SubQuestion> {
        let mut out: Vec<SubQuestion> = self.entries.values().cloned().collect();
        out.sort_by_key(SubQuestion::key);
        out
    }

    /// Sorted entries with question and query text cleaned.
    pub fn cleaned(&self) -> Vec<SubQuestion> {
        self.sorted().into_iter().map(clean_sub_question).collect()
    }
}

/// Strip tags and collapse whitespace in question and query text.
///
/// Answer text is markdown and only trimmed.
pub fn clean_sub_question(mut sq: SubQuestion) -> SubQuestion {
    sq.question_text = clean_text(&sq.question_text);
    sq.answer_text = sq.answer_text.trim().to_string();
    for query in &mut sq.sub_queries {
        query.query_text = clean_text(&query.query_text);
    }
    sq
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
