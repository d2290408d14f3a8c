//! Final message compilation.
//!
//! Turns the accumulated state of one message into the immutable
//! [`ChatMessage`] handed to consumers.  The backend's final detail packet
//! is authoritative: a non-empty `sub_questions` array in it replaces every
//! streamed sub-question.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ds_domain::model::{ChatMessage, Citation, MessageRole, SubQuestion};
use serde_json::Value;

use crate::documents::DocumentSet;
use crate::packet::{MessageDetail, SubQuestionDetail};
use crate::state::StreamingAnswerState;
use crate::tree::SubQuestionTree;

/// Compile `state` into its terminal artifact.
///
/// `now` is used as the timestamp when the detail packet carried no
/// parseable `time_sent`.
pub fn compile(state: StreamingAnswerState, extract_think: bool, now: DateTime<Utc>) -> ChatMessage {
    let StreamingAnswerState {
        answer,
        mut tree,
        mut documents,
        is_complete,
        error,
        detail,
    } = state;

    // Fragments that arrived after the detail do not outlive it.
    if let Some(detail) = detail.as_deref() {
        apply_detail(&mut tree, &mut documents, detail);
    }

    let (visible, thinking) = answer.render(extract_think);
    let mut content = visible.trim().to_string();
    if content.is_empty() {
        if let Some(detail) = detail.as_deref() {
            content = detail.message.trim().to_string();
        }
    }

    let sub_questions: Vec<SubQuestion> = tree
        .cleaned()
        .into_iter()
        .map(|mut sq| {
            sq.is_complete = true;
            sq.answer_streaming = false;
            sq
        })
        .collect();

    let documents = documents.into_vec();
    let citations = documents.iter().map(Citation::from).collect();
    let thinking = Some(thinking.trim().to_string()).filter(|t| !t.is_empty());

    let timestamp = detail
        .as_deref()
        .and_then(|d| parse_time_sent(&d.time_sent))
        .unwrap_or(now);

    ChatMessage {
        id: uuid::Uuid::new_v4(),
        role: MessageRole::Assistant,
        content,
        thinking,
        is_streaming: !is_complete,
        documents,
        sub_questions,
        citations,
        error,
        message_id: detail.as_deref().and_then(|d| d.message_id),
        parent_message_id: detail.as_deref().and_then(|d| d.parent_message),
        timestamp,
    }
}

/// Merge the final detail packet into the tree and document set.
///
/// Applying the same detail twice yields the same result.
pub fn apply_detail(tree: &mut SubQuestionTree, documents: &mut DocumentSet, detail: &MessageDetail) {
    documents.extend(detail.top_documents().iter().cloned());

    let Some(authoritative) = detail.sub_questions.as_ref().filter(|s| !s.is_empty()) else {
        return;
    };

    for sq in authoritative {
        if let Some(docs) = &sq.context_docs {
            documents.extend(docs.top_documents.iter().cloned());
        }
    }

    tracing::debug!(
        streamed = tree.len(),
        authoritative = authoritative.len(),
        "replacing streamed sub-questions with final summary"
    );
    tree.replace_all(authoritative.iter().map(sub_question_from_detail).collect());
}

fn sub_question_from_detail(detail: &SubQuestionDetail) -> SubQuestion {
    let mut sq = SubQuestion::empty(detail.key());
    sq.question_text = detail.question.clone();
    sq.answer_text = detail.answer.clone();
    sq.sub_queries = detail.sub_queries.clone();
    sq.documents = detail
        .context_docs
        .as_ref()
        .map(|c| c.top_documents.clone());
    sq.is_complete = true;
    sq
}

/// `time_sent` as RFC 3339, naive ISO 8601 (taken as UTC), or epoch seconds.
fn parse_time_sent(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
