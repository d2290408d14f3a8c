//! Data model shared between the reconstruction engine and its consumers.
//!
//! `Document`, `SubQueryDetail` and `SubQuestion` keep the backend's
//! snake_case field names.  `ChatMessage`, `Citation` and `SearchProgress`
//! are the UI-facing artifacts and serialize camelCase.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde_util::null_as_default;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Documents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A retrieved source document.  Identity is `document_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    #[serde(
        default,
        alias = "semantic_identifier",
        deserialize_with = "null_as_default"
    )]
    pub display_name: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub blurb: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, alias = "chunk_ind")]
    pub chunk_index: Option<u32>,
    #[serde(
        default,
        alias = "match_highlights",
        deserialize_with = "null_as_default"
    )]
    pub highlights: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_internet: bool,
}

impl Document {
    /// A document with only its identity set; used by tests and fixtures.
    pub fn with_id(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            display_name: String::new(),
            link: None,
            source_type: String::new(),
            blurb: String::new(),
            score: None,
            chunk_index: None,
            highlights: Vec::new(),
            metadata: BTreeMap::new(),
            is_internet: false,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sub-questions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Identity of a sub-question within one answer.
///
/// Ordering is `(level, level_question_num)`, which is also the display
/// order.  `level_question_num == 0` denotes the root question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubQuestionKey {
    pub level: u32,
    pub level_question_num: u32,
}

impl SubQuestionKey {
    pub fn new(level: u32, level_question_num: u32) -> Self {
        Self {
            level,
            level_question_num,
        }
    }

    pub fn is_root(&self) -> bool {
        self.level_question_num == 0
    }
}

impl fmt::Display for SubQuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.level, self.level_question_num)
    }
}

/// One search query issued in service of a sub-question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQueryDetail {
    pub query_id: i64,
    #[serde(default, alias = "query", deserialize_with = "null_as_default")]
    pub query_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub level: u32,
    pub level_question_num: u32,
    pub question_text: String,
    pub answer_text: String,
    pub sub_queries: Vec<SubQueryDetail>,
    pub documents: Option<Vec<Document>>,
    pub is_complete: bool,
    pub is_stopped: bool,
    pub answer_streaming: bool,
}

impl SubQuestion {
    /// A fresh record with empty text and no sub-queries.
    pub fn empty(key: SubQuestionKey) -> Self {
        Self {
            level: key.level,
            level_question_num: key.level_question_num,
            question_text: String::new(),
            answer_text: String::new(),
            sub_queries: Vec::new(),
            documents: None,
            is_complete: false,
            is_stopped: false,
            answer_streaming: false,
        }
    }

    pub fn key(&self) -> SubQuestionKey {
        SubQuestionKey::new(self.level, self.level_question_num)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Progress phase
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Coarse progress label.  Variant order is the phase ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Waiting,
    SubQueries,
    ContextDocs,
    Answer,
    Evaluate,
    Complete,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Waiting,
        Phase::SubQueries,
        Phase::ContextDocs,
        Phase::Answer,
        Phase::Evaluate,
        Phase::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::SubQueries => "sub_queries",
            Phase::ContextDocs => "context_docs",
            Phase::Answer => "answer",
            Phase::Evaluate => "evaluate",
            Phase::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UI-facing artifacts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub document_id: String,
    pub document_name: String,
    pub link: Option<String>,
    pub excerpt: String,
    pub source_type: String,
}

impl From<&Document> for Citation {
    fn from(doc: &Document) -> Self {
        Self {
            document_id: doc.document_id.clone(),
            document_name: doc.display_name.clone(),
            link: doc.link.clone(),
            excerpt: doc.blurb.clone(),
            source_type: doc.source_type.clone(),
        }
    }
}

/// The immutable terminal artifact for one assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: uuid::Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    pub is_streaming: bool,
    pub documents: Vec<Document>,
    pub sub_questions: Vec<SubQuestion>,
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Backend id of the message, when the final detail packet carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time view of an in-flight answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchProgress {
    pub phase: Phase,
    pub answer: String,
    pub thinking: String,
    pub sub_questions: Vec<SubQuestion>,
    pub documents: Vec<Document>,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub packet_counts: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ranking_follows_declaration_order() {
        for pair in Phase::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn phase_serializes_snake_case() {
        let json = serde_json::to_string(&Phase::ContextDocs).unwrap();
        assert_eq!(json, r#""context_docs""#);
    }

    #[test]
    fn document_accepts_backend_field_names() {
        let doc: Document = serde_json::from_str(
            r#"{
                "document_id": "doc-1",
                "semantic_identifier": "Quarterly report",
                "link": null,
                "source_type": "file",
                "blurb": "Revenue grew",
                "score": 0.82,
                "chunk_ind": 3,
                "match_highlights": ["grew"],
                "metadata": {"owner": "finance"},
                "is_internet": false,
                "extra_field": true
            }"#,
        )
        .unwrap();
        assert_eq!(doc.display_name, "Quarterly report");
        assert_eq!(doc.chunk_index, Some(3));
        assert_eq!(doc.highlights, vec!["grew"]);
        assert_eq!(doc.metadata["owner"], "finance");
    }

    #[test]
    fn document_tolerates_nulls_and_missing_fields() {
        let doc: Document =
            serde_json::from_str(r#"{"document_id": "d", "blurb": null, "match_highlights": null}"#)
                .unwrap();
        assert_eq!(doc, Document::with_id("d"));
    }

    #[test]
    fn sub_query_accepts_query_alias() {
        let q: SubQueryDetail =
            serde_json::from_str(r#"{"query_id": 2, "query": "define X"}"#).unwrap();
        assert_eq!(q.query_text, "define X");
    }

    #[test]
    fn key_orders_by_level_then_number() {
        let mut keys = vec![
            SubQuestionKey::new(2, 1),
            SubQuestionKey::new(1, 2),
            SubQuestionKey::new(1, 1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                SubQuestionKey::new(1, 1),
                SubQuestionKey::new(1, 2),
                SubQuestionKey::new(2, 1),
            ]
        );
        assert_eq!(SubQuestionKey::new(1, 2).to_string(), "1.2");
    }

    #[test]
    fn citation_from_document() {
        let mut doc = Document::with_id("d1");
        doc.display_name = "Doc".into();
        doc.blurb = "excerpt".into();
        let c = Citation::from(&doc);
        assert_eq!(c.document_id, "d1");
        assert_eq!(c.document_name, "Doc");
        assert_eq!(c.excerpt, "excerpt");
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("documentId").is_some());
    }
}
