//! Human-readable rendering of compiled messages.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use ds_domain::model::{ChatMessage, SubQuestion};

/// Render a final message as an indented text tree.
pub fn render_message(message: &ChatMessage) -> String {
    let mut out = String::new();

    if let Some(thinking) = &message.thinking {
        let _ = writeln!(out, "Thinking:");
        for line in thinking.lines() {
            let _ = writeln!(out, "  {line}");
        }
        out.push('\n');
    }

    let _ = writeln!(out, "Answer:");
    if message.content.is_empty() {
        let _ = writeln!(out, "  (empty)");
    }
    for line in message.content.lines() {
        let _ = writeln!(out, "  {line}");
    }

    if !message.sub_questions.is_empty() {
        let _ = writeln!(out, "\nSub-questions:");
        for sq in &message.sub_questions {
            render_sub_question(&mut out, sq);
        }
    }

    if !message.documents.is_empty() {
        let _ = writeln!(out, "\nDocuments ({}):", message.documents.len());
        for doc in &message.documents {
            let name = if doc.display_name.is_empty() {
                doc.document_id.as_str()
            } else {
                doc.display_name.as_str()
            };
            match &doc.link {
                Some(link) => {
                    let _ = writeln!(out, "  - [{}] {name} <{link}>", doc.document_id);
                }
                None => {
                    let _ = writeln!(out, "  - [{}] {name}", doc.document_id);
                }
            }
        }
    }

    if let Some(error) = &message.error {
        let _ = writeln!(out, "\nError: {error}");
    }

    out
}

fn render_sub_question(out: &mut String, sq: &SubQuestion) {
    let status = match (sq.is_stopped, sq.is_complete) {
        (true, _) => "stopped",
        (false, true) => "complete",
        (false, false) => "in progress",
    };
    let _ = writeln!(out, "  [{}] {} ({status})", sq.key(), sq.question_text);
    for query in &sq.sub_queries {
        let _ = writeln!(out, "      query {}: {}", query.query_id, query.query_text);
    }
    if !sq.answer_text.is_empty() {
        let _ = writeln!(out, "      answer: {}", sq.answer_text);
    }
    if let Some(docs) = &sq.documents {
        let _ = writeln!(out, "      documents: {}", docs.len());
    }
}

/// `kind=count` pairs on one line.
pub fn render_counts(counts: &BTreeMap<String, u64>) -> String {
    if counts.is_empty() {
        return "no packets".into();
    }
    counts
        .iter()
        .map(|(kind, n)| format!("{kind}={n}"))
        .collect::<Vec<_>>()
        .join(", ")
}
