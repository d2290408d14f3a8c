//! Packet classification.
//!
//! The wire format has no discriminant field: the kind of a packet is
//! implied by which optional fields are present.  [`CLASSIFICATION_RULES`]
//! is the single ordered table of predicates; the first matching rule wins,
//! and a payload that matches nothing is passed through as
//! [`ClassifiedPacket::Unknown`].

use ds_domain::error::Result;
use ds_domain::model::{Document, SubQueryDetail, SubQuestionKey};
use ds_domain::serde_util::null_as_default;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Packet kinds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketKind {
    AnswerPiece,
    SubAnswerPiece,
    DocumentInfo,
    SubQuestionPiece,
    SubQueryPiece,
    ThinkingTokens,
    StreamingError,
    ToolCall,
    BackendMessage,
    DocumentBatch,
    MessageDetail,
    Completion,
    StreamStop,
    Unknown,
}

impl PacketKind {
    /// Stable label used in packet statistics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            PacketKind::AnswerPiece => "answer_piece",
            PacketKind::SubAnswerPiece => "sub_answer_piece",
            PacketKind::DocumentInfo => "document",
            PacketKind::SubQuestionPiece => "sub_question",
            PacketKind::SubQueryPiece => "sub_query",
            PacketKind::ThinkingTokens => "thinking",
            PacketKind::StreamingError => "error",
            PacketKind::ToolCall => "tool_call",
            PacketKind::BackendMessage => "backend_message",
            PacketKind::DocumentBatch => "documents",
            PacketKind::MessageDetail => "message_detail",
            PacketKind::Completion => "complete",
            PacketKind::StreamStop => "stream_stop",
            PacketKind::Unknown => "other",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rule table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type Predicate = fn(&Map<String, Value>) -> bool;

/// One row of the classification table.
pub struct Rule {
    pub kind: PacketKind,
    pub matches: Predicate,
}

/// Ordered classification table.  Precedence is the row order.
///
/// `AnswerPiece` is refined to `SubAnswerPiece` after matching, see
/// [`kind_of`].
pub static CLASSIFICATION_RULES: [Rule; 12] = [
    Rule { kind: PacketKind::AnswerPiece, matches: has_answer_piece },
    Rule { kind: PacketKind::DocumentInfo, matches: has_document_id },
    Rule { kind: PacketKind::SubQuestionPiece, matches: has_sub_question },
    Rule { kind: PacketKind::SubQueryPiece, matches: has_sub_query },
    Rule { kind: PacketKind::ThinkingTokens, matches: has_thinking_content },
    Rule { kind: PacketKind::StreamingError, matches: has_error },
    Rule { kind: PacketKind::ToolCall, matches: has_tool_name },
    Rule { kind: PacketKind::BackendMessage, matches: is_backend_message },
    Rule { kind: PacketKind::DocumentBatch, matches: is_document_batch },
    Rule { kind: PacketKind::MessageDetail, matches: is_message_detail },
    Rule { kind: PacketKind::Completion, matches: is_completion },
    Rule { kind: PacketKind::StreamStop, matches: has_stop_reason },
];

fn has_answer_piece(m: &Map<String, Value>) -> bool {
    m.contains_key("answer_piece")
}

fn has_document_id(m: &Map<String, Value>) -> bool {
    m.contains_key("document_id")
}

fn has_sub_question(m: &Map<String, Value>) -> bool {
    m.contains_key("sub_question")
}

fn has_sub_query(m: &Map<String, Value>) -> bool {
    m.contains_key("sub_query")
}

fn has_thinking_content(m: &Map<String, Value>) -> bool {
    m.contains_key("thinking_content")
}

fn has_error(m: &Map<String, Value>) -> bool {
    m.get("error").is_some_and(|v| !v.is_null())
}

fn has_tool_name(m: &Map<String, Value>) -> bool {
    m.contains_key("tool_name")
}

// The final detail also carries `message_type`; excluding it here keeps the
// detail rule reachable.
fn is_backend_message(m: &Map<String, Value>) -> bool {
    m.contains_key("message_type") && !is_document_batch(m) && !is_message_detail(m)
}

fn is_document_batch(m: &Map<String, Value>) -> bool {
    m.get("top_documents").is_some_and(Value::is_array)
}

fn is_message_detail(m: &Map<String, Value>) -> bool {
    m.contains_key("message_id")
        && m.get("message_type").and_then(Value::as_str) == Some("assistant")
        && m.contains_key("time_sent")
        && m.contains_key("message")
}

fn is_completion(m: &Map<String, Value>) -> bool {
    m.get("type").and_then(Value::as_str) == Some("complete")
        || m.get("complete").and_then(Value::as_bool) == Some(true)
}

fn has_stop_reason(m: &Map<String, Value>) -> bool {
    m.contains_key("stop_reason")
}

/// Determine the packet kind of a JSON object.
pub fn kind_of(m: &Map<String, Value>) -> PacketKind {
    let kind = CLASSIFICATION_RULES
        .iter()
        .find(|rule| (rule.matches)(m))
        .map(|rule| rule.kind)
        .unwrap_or(PacketKind::Unknown);

    if kind == PacketKind::AnswerPiece
        && m.get("answer_type").and_then(Value::as_str) == Some("agent_sub_answer")
        && m.contains_key("level")
        && m.contains_key("level_question_num")
    {
        return PacketKind::SubAnswerPiece;
    }
    kind
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typed packets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A decoded packet with the fields its kind cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedPacket {
    /// Top-level answer text.  `None` is the end-of-stream marker.
    AnswerPiece { text: Option<String> },
    SubAnswerPiece { key: SubQuestionKey, text: String },
    DocumentInfo(Document),
    /// `key` is `None` when the packet carried no key fields at all.
    SubQuestionPiece {
        key: Option<SubQuestionKey>,
        text: String,
    },
    SubQueryPiece {
        key: SubQuestionKey,
        query_id: i64,
        text: String,
    },
    ThinkingTokens { text: String },
    StreamingError { message: String },
    ToolCall(Map<String, Value>),
    BackendMessage(Map<String, Value>),
    /// `key` is `None` for a top-level batch.
    DocumentBatch {
        key: Option<SubQuestionKey>,
        documents: Vec<Document>,
    },
    MessageDetail(Box<MessageDetail>),
    Completion,
    StreamStop {
        key: SubQuestionKey,
        stream_type: Option<String>,
        stop_reason: String,
    },
    Unknown(Value),
}

impl ClassifiedPacket {
    pub fn kind(&self) -> PacketKind {
        match self {
            ClassifiedPacket::AnswerPiece { .. } => PacketKind::AnswerPiece,
            ClassifiedPacket::SubAnswerPiece { .. } => PacketKind::SubAnswerPiece,
            ClassifiedPacket::DocumentInfo(_) => PacketKind::DocumentInfo,
            ClassifiedPacket::SubQuestionPiece { .. } => PacketKind::SubQuestionPiece,
            ClassifiedPacket::SubQueryPiece { .. } => PacketKind::SubQueryPiece,
            ClassifiedPacket::ThinkingTokens { .. } => PacketKind::ThinkingTokens,
            ClassifiedPacket::StreamingError { .. } => PacketKind::StreamingError,
            ClassifiedPacket::ToolCall(_) => PacketKind::ToolCall,
            ClassifiedPacket::BackendMessage(_) => PacketKind::BackendMessage,
            ClassifiedPacket::DocumentBatch { .. } => PacketKind::DocumentBatch,
            ClassifiedPacket::MessageDetail(_) => PacketKind::MessageDetail,
            ClassifiedPacket::Completion => PacketKind::Completion,
            ClassifiedPacket::StreamStop { .. } => PacketKind::StreamStop,
            ClassifiedPacket::Unknown(_) => PacketKind::Unknown,
        }
    }

    /// Packets after which nothing more is read for this message.
    ///
    /// The `null` answer marker completes the answer but is not terminal:
    /// the backend still sends its final detail packet after it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ClassifiedPacket::Completion | ClassifiedPacket::StreamingError { .. }
        )
    }
}

/// `context_docs` block of the final detail packet.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContextDocs {
    #[serde(default, deserialize_with = "lenient_documents")]
    pub top_documents: Vec<Document>,
}

/// One sub-question as summarized by the backend at the end of a stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubQuestionDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub level_question_num: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_queries: Vec<SubQueryDetail>,
    #[serde(default)]
    pub context_docs: Option<ContextDocs>,
}

impl SubQuestionDetail {
    pub fn key(&self) -> SubQuestionKey {
        SubQuestionKey::new(self.level, self.level_question_num)
    }
}

/// The backend's final summary of the assistant message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageDetail {
    #[serde(default)]
    pub message_id: Option<i64>,
    #[serde(default)]
    pub parent_message: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_type: String,
    #[serde(default)]
    pub time_sent: Value,
    #[serde(default)]
    pub context_docs: Option<ContextDocs>,
    /// `None` when absent; `Some(vec![])` when explicitly empty.
    #[serde(default)]
    pub sub_questions: Option<Vec<SubQuestionDetail>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MessageDetail {
    pub fn top_documents(&self) -> &[Document] {
        self.context_docs
            .as_ref()
            .map(|c| c.top_documents.as_slice())
            .unwrap_or_default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
struct AnswerPieceWire {
    answer_piece: Option<String>,
}

#[derive(Deserialize)]
struct SubAnswerWire {
    #[serde(default, deserialize_with = "null_as_default")]
    answer_piece: String,
    #[serde(default, deserialize_with = "null_as_default")]
    level: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    level_question_num: u32,
}

#[derive(Deserialize)]
struct SubQuestionWire {
    #[serde(default, deserialize_with = "null_as_default")]
    sub_question: String,
    level: Option<u32>,
    level_question_num: Option<u32>,
}

#[derive(Deserialize)]
struct SubQueryWire {
    #[serde(default, deserialize_with = "null_as_default")]
    sub_query: String,
    #[serde(default, deserialize_with = "null_as_default")]
    level: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    level_question_num: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    query_id: i64,
}

#[derive(Deserialize)]
struct ThinkingWire {
    #[serde(default, deserialize_with = "null_as_default")]
    thinking_content: String,
}

#[derive(Deserialize)]
struct DocumentBatchWire {
    #[serde(deserialize_with = "lenient_documents")]
    top_documents: Vec<Document>,
    level: Option<u32>,
    level_question_num: Option<u32>,
}

#[derive(Deserialize)]
struct StopWire {
    #[serde(default, deserialize_with = "null_as_default")]
    stop_reason: String,
    stream_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    level: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    level_question_num: u32,
}

/// Parse a document list element by element, dropping malformed entries
/// instead of failing the whole packet.
fn lenient_documents<'de, D>(deserializer: D) -> std::result::Result<Vec<Document>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Document>(value) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed document in batch");
                None
            }
        })
        .collect())
}

fn optional_key(level: Option<u32>, level_question_num: Option<u32>) -> Option<SubQuestionKey> {
    if level.is_none() && level_question_num.is_none() {
        return None;
    }
    Some(SubQuestionKey::new(
        level.unwrap_or(0),
        level_question_num.unwrap_or(0),
    ))
}

fn error_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Classify one decoded payload.
///
/// Errors only when the payload is not JSON or a matched kind's fields have
/// the wrong types; both are non-fatal for the caller.
pub fn classify(payload: &str) -> Result<ClassifiedPacket> {
    let value: Value = serde_json::from_str(payload)?;
    let Value::Object(map) = value else {
        return Ok(ClassifiedPacket::Unknown(value));
    };

    let kind = kind_of(&map);
    let packet = match kind {
        PacketKind::AnswerPiece => {
            let wire: AnswerPieceWire = from_map(map)?;
            ClassifiedPacket::AnswerPiece {
                text: wire.answer_piece,
            }
        }
        PacketKind::SubAnswerPiece => {
            let wire: SubAnswerWire = from_map(map)?;
            ClassifiedPacket::SubAnswerPiece {
                key: SubQuestionKey::new(wire.level, wire.level_question_num),
                text: wire.answer_piece,
            }
        }
        PacketKind::DocumentInfo => ClassifiedPacket::DocumentInfo(from_map(map)?),
        PacketKind::SubQuestionPiece => {
            let wire: SubQuestionWire = from_map(map)?;
            ClassifiedPacket::SubQuestionPiece {
                key: optional_key(wire.level, wire.level_question_num),
                text: wire.sub_question,
            }
        }
        PacketKind::SubQueryPiece => {
            let wire: SubQueryWire = from_map(map)?;
            ClassifiedPacket::SubQueryPiece {
                key: SubQuestionKey::new(wire.level, wire.level_question_num),
                query_id: wire.query_id,
                text: wire.sub_query,
            }
        }
        PacketKind::ThinkingTokens => {
            let wire: ThinkingWire = from_map(map)?;
            ClassifiedPacket::ThinkingTokens {
                text: wire.thinking_content,
            }
        }
        PacketKind::StreamingError => ClassifiedPacket::StreamingError {
            message: map.get("error").map(error_message).unwrap_or_default(),
        },
        PacketKind::ToolCall => ClassifiedPacket::ToolCall(map),
        PacketKind::BackendMessage => ClassifiedPacket::BackendMessage(map),
        PacketKind::DocumentBatch => {
            let wire: DocumentBatchWire = from_map(map)?;
            ClassifiedPacket::DocumentBatch {
                key: optional_key(wire.level, wire.level_question_num),
                documents: wire.top_documents,
            }
        }
        PacketKind::MessageDetail => ClassifiedPacket::MessageDetail(Box::new(from_map(map)?)),
        PacketKind::Completion => ClassifiedPacket::Completion,
        PacketKind::StreamStop => {
            let wire: StopWire = from_map(map)?;
            ClassifiedPacket::StreamStop {
                key: SubQuestionKey::new(wire.level, wire.level_question_num),
                stream_type: wire.stream_type,
                stop_reason: wire.stop_reason,
            }
        }
        PacketKind::Unknown => ClassifiedPacket::Unknown(Value::Object(map)),
    };

    Ok(packet)
}

fn from_map<T: serde::de::DeserializeOwned>(map: Map<String, Value>) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(map))?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
