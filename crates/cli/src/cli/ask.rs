//! `deepsearch ask`: send one message and stream the reconstructed answer.
//!
//! Answer text goes to stdout as it arrives; phase changes go to stderr so
//! they do not pollute piped output.  Ctrl-C cancels the stream and prints
//! whatever was received.

use std::io::Write;

use ds_domain::config::Config;
use ds_domain::model::{Phase, SearchProgress};
use ds_engine::{drive_stream, StreamOutcome, StreamingEngine};
use tokio_util::sync::CancellationToken;

use crate::client::{BackendClient, SendMessageRequest};

/// Incremental stdout writer for progress snapshots.
#[derive(Debug, Default)]
pub struct LivePrinter {
    phase: Option<Phase>,
    printed: usize,
}

impl LivePrinter {
    /// Returns the answer text not yet printed, and notes a phase change.
    pub fn advance(&mut self, snapshot: &SearchProgress) -> (Option<Phase>, Option<String>) {
        let phase_changed = (self.phase != Some(snapshot.phase)).then_some(snapshot.phase);
        self.phase = Some(snapshot.phase);

        let answer = &snapshot.answer;
        let delta = if answer.len() > self.printed && answer.is_char_boundary(self.printed) {
            let delta = answer[self.printed..].to_string();
            self.printed = answer.len();
            Some(delta)
        } else {
            None
        };
        (phase_changed, delta)
    }

    fn update(&mut self, snapshot: &SearchProgress) {
        let (phase, delta) = self.advance(snapshot);
        if let Some(phase) = phase {
            eprintln!("\x1b[2m[{phase}]\x1b[0m");
        }
        if let Some(delta) = delta {
            print!("{delta}");
            std::io::stdout().flush().ok();
        }
    }
}

/// Entry point for `deepsearch ask`.  Returns false when the backend
/// reported an error.
pub async fn run(
    config: &Config,
    message: String,
    session: String,
    parent: Option<i64>,
    json_output: bool,
) -> anyhow::Result<bool> {
    let client = BackendClient::new(&config.backend)?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ncancelling...");
            trigger.cancel();
        }
    });

    let request = SendMessageRequest {
        chat_session_id: session,
        message,
        parent_message_id: parent,
        use_agentic_search: config.backend.use_agentic_search,
    };
    tracing::debug!(url = client.url(), session = %request.chat_session_id, "sending message");

    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            eprintln!("cancelled before the backend responded");
            return Ok(true);
        }
        resp = client.send_message(&request) => resp?,
    };

    let mut engine = StreamingEngine::new(config.engine.clone());
    let mut printer = LivePrinter::default();
    let outcome = drive_stream(&mut engine, body, cancel, |snapshot| {
        if !json_output {
            printer.update(snapshot);
        }
    })
    .await;

    let failed = matches!(outcome, StreamOutcome::Errored(_));
    let message = outcome.into_message();

    if json_output {
        let json = serde_json::to_string_pretty(&message)
            .map_err(|e| anyhow::anyhow!("serializing message: {e}"))?;
        println!("{json}");
    } else {
        println!();
        if !message.citations.is_empty() {
            println!("\nSources:");
            for (i, citation) in message.citations.iter().enumerate() {
                match &citation.link {
                    Some(link) => println!("  [{}] {} <{link}>", i + 1, citation.document_name),
                    None => println!("  [{}] {}", i + 1, citation.document_name),
                }
            }
        }
        if let Some(error) = &message.error {
            eprintln!("error: {error}");
        }
    }

    Ok(!failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn snapshot(phase: Phase, answer: &str) -> SearchProgress {
        SearchProgress {
            phase,
            answer: answer.into(),
            thinking: String::new(),
            sub_questions: Vec::new(),
            documents: Vec::new(),
            is_complete: false,
            error: None,
            packet_counts: BTreeMap::new(),
        }
    }

    #[test]
    fn printer_emits_only_new_text() {
        let mut printer = LivePrinter::default();
        assert_eq!(
            printer.advance(&snapshot(Phase::Answer, "X is")),
            (Some(Phase::Answer), Some("X is".into()))
        );
        assert_eq!(
            printer.advance(&snapshot(Phase::Answer, "X is a letter")),
            (None, Some(" a letter".into()))
        );
        assert_eq!(printer.advance(&snapshot(Phase::Answer, "X is a letter")), (None, None));
        assert_eq!(
            printer.advance(&snapshot(Phase::Complete, "X is a letter")),
            (Some(Phase::Complete), None)
        );
    }

    #[test]
    fn printer_handles_multibyte_text() {
        let mut printer = LivePrinter::default();
        printer.advance(&snapshot(Phase::Answer, "caf\u{e9}"));
        let (_, delta) = printer.advance(&snapshot(Phase::Answer, "caf\u{e9} \u{4e2d}"));
        assert_eq!(delta.as_deref(), Some(" \u{4e2d}"));
    }
}
