//! Drive one response body through the engine to a final message.

use std::time::Instant;

use ds_domain::error::Result;
use ds_domain::model::{ChatMessage, SearchProgress};
use ds_domain::stream::BoxStream;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::engine::StreamingEngine;
use crate::packet::ClassifiedPacket;
use crate::sse::decode_frames;

/// How a stream ended.  Every variant carries the compiled message.
#[derive(Debug, Clone)]
pub enum StreamOutcome {
    /// The backend sent its completion packet.
    Completed(ChatMessage),
    /// The backend sent an error packet.
    Errored(ChatMessage),
    /// The caller cancelled; the message holds what arrived before.
    Cancelled(ChatMessage),
    /// The body ended, or the transport failed, without either packet.
    Ended(ChatMessage),
}

impl StreamOutcome {
    pub fn message(&self) -> &ChatMessage {
        match self {
            StreamOutcome::Completed(m)
            | StreamOutcome::Errored(m)
            | StreamOutcome::Cancelled(m)
            | StreamOutcome::Ended(m) => m,
        }
    }

    pub fn into_message(self) -> ChatMessage {
        match self {
            StreamOutcome::Completed(m)
            | StreamOutcome::Errored(m)
            | StreamOutcome::Cancelled(m)
            | StreamOutcome::Ended(m) => m,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StreamOutcome::Completed(_) => "completed",
            StreamOutcome::Errored(_) => "errored",
            StreamOutcome::Cancelled(_) => "cancelled",
            StreamOutcome::Ended(_) => "ended",
        }
    }
}

enum Step {
    Frame(Option<Result<String>>),
    PhaseDue,
}

enum Stop {
    Completed,
    Errored,
    Drained,
}

/// Consume `body` into `engine` until a terminal packet, the end of the
/// body, or cancellation.
///
/// Throttled snapshots go to `on_snapshot` while the stream runs, plus one
/// unthrottled snapshot right before the final message is compiled.  The
/// engine is left reset.
pub async fn drive_stream<F>(
    engine: &mut StreamingEngine,
    body: BoxStream<'static, Result<Vec<u8>>>,
    cancel: CancellationToken,
    mut on_snapshot: F,
) -> StreamOutcome
where
    F: FnMut(&SearchProgress),
{
    let mut frames = decode_frames(body, cancel.clone());

    let stop = loop {
        let phase_due = engine.next_phase_due();
        let step = tokio::select! {
            frame = frames.next() => Step::Frame(frame),
            _ = sleep_until(phase_due), if phase_due.is_some() => Step::PhaseDue,
        };

        let now = Instant::now();
        match step {
            Step::Frame(Some(Ok(payload))) => {
                if let Some(packet) = engine.submit_at(&payload, now) {
                    if packet.is_terminal() {
                        break match packet {
                            ClassifiedPacket::StreamingError { .. } => Stop::Errored,
                            _ => Stop::Completed,
                        };
                    }
                }
                if let Some(snapshot) = engine.poll_snapshot(now) {
                    on_snapshot(&snapshot);
                }
            }
            Step::Frame(Some(Err(e))) => {
                tracing::warn!(error = %e, "answer stream failed mid-flight");
                engine.record_transport_error(e.to_string());
                break Stop::Drained;
            }
            Step::Frame(None) => break Stop::Drained,
            Step::PhaseDue => {
                if engine.tick(now).is_some() {
                    on_snapshot(&engine.progress_snapshot());
                }
            }
        }
    };

    // Releases the body on every path.
    drop(frames);

    let cancelled = matches!(stop, Stop::Drained) && cancel.is_cancelled();
    if matches!(stop, Stop::Drained) {
        engine.finish();
    }

    on_snapshot(&engine.progress_snapshot());
    let message = engine.final_message();

    let outcome = match stop {
        Stop::Completed => StreamOutcome::Completed(message),
        Stop::Errored => StreamOutcome::Errored(message),
        Stop::Drained if cancelled => StreamOutcome::Cancelled(message),
        Stop::Drained => StreamOutcome::Ended(message),
    };
    tracing::debug!(outcome = outcome.label(), "answer stream finished");
    outcome
}

async fn sleep_until(due: Option<Instant>) {
    if let Some(due) = due {
        tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use ds_domain::error::Error;
    use ds_domain::model::Phase;
    use std::time::Duration;

    fn body(chunks: Vec<Result<Vec<u8>>>) -> BoxStream<'static, Result<Vec<u8>>> {
        Box::pin(futures_util::stream::iter(chunks))
    }

    fn lines(payloads: &[&str]) -> Vec<u8> {
        payloads
            .iter()
            .map(|p| format!("data: {p}\n"))
            .collect::<String>()
            .into_bytes()
    }

    #[tokio::test]
    async fn completion_packet_ends_stream_and_ignores_the_rest() {
        let mut engine = StreamingEngine::default();
        let bytes = lines(&[
            r#"{"answer_piece":"Hello"}"#,
            r#"{"type":"complete"}"#,
            r#"{"answer_piece":" never"}"#,
        ]);
        let outcome = drive_stream(&mut engine, body(vec![Ok(bytes)]), CancellationToken::new(), |_| {}).await;
        assert!(matches!(outcome, StreamOutcome::Completed(_)));
        assert_eq!(outcome.message().content, "Hello");
        assert!(!outcome.message().is_streaming);
    }

    #[tokio::test]
    async fn error_packet_is_errored_outcome() {
        let mut engine = StreamingEngine::default();
        let bytes = lines(&[r#"{"answer_piece":"part"}"#, r#"{"error":"quota exceeded"}"#]);
        let outcome = drive_stream(&mut engine, body(vec![Ok(bytes)]), CancellationToken::new(), |_| {}).await;
        assert_eq!(outcome.label(), "errored");
        assert_eq!(outcome.message().error.as_deref(), Some("quota exceeded"));
    }

    #[tokio::test]
    async fn body_end_without_completion_is_ended() {
        let mut engine = StreamingEngine::default();
        let bytes = lines(&[r#"{"answer_piece":"only"}"#]);
        let outcome = drive_stream(&mut engine, body(vec![Ok(bytes)]), CancellationToken::new(), |_| {}).await;
        assert!(matches!(outcome, StreamOutcome::Ended(_)));
        assert!(!outcome.message().is_streaming);
    }

    #[tokio::test]
    async fn transport_error_is_recorded() {
        let mut engine = StreamingEngine::default();
        let chunks = vec![
            Ok(lines(&[r#"{"answer_piece":"so far"}"#])),
            Err(Error::Network("connection reset".into())),
        ];
        let outcome = drive_stream(&mut engine, body(chunks), CancellationToken::new(), |_| {}).await;
        assert_eq!(outcome.label(), "ended");
        let message = outcome.into_message();
        assert_eq!(message.content, "so far");
        assert!(message.error.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn cancellation_finalizes_partial_state() {
        let mut engine = StreamingEngine::default();
        let cancel = CancellationToken::new();
        let first = futures_util::stream::iter(vec![Ok(lines(&[r#"{"answer_piece":"partial"}"#]))]);
        let body: BoxStream<'static, Result<Vec<u8>>> =
            Box::pin(first.chain(futures_util::stream::pending()));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            drive_stream(&mut engine, body, cancel, |_| {}),
        )
        .await
        .expect("cancel should end the stream");
        assert!(matches!(outcome, StreamOutcome::Cancelled(_)));
        assert_eq!(outcome.message().content, "partial");
    }

    #[tokio::test]
    async fn final_snapshot_carries_packet_counts() {
        let mut engine = StreamingEngine::default();
        let bytes = lines(&[
            r#"{"answer_piece":"a"}"#,
            r#"{"answer_piece":"b"}"#,
            r#"{"type":"complete"}"#,
        ]);
        let mut last = None;
        drive_stream(&mut engine, body(vec![Ok(bytes)]), CancellationToken::new(), |s| {
            last = Some(s.clone())
        })
        .await;
        let last = last.unwrap();
        assert_eq!(last.packet_counts.get("answer_piece"), Some(&2));
        assert_eq!(last.packet_counts.get("complete"), Some(&1));
        assert!(last.is_complete);
        assert_eq!(last.phase, Phase::Complete);
    }

    #[tokio::test]
    async fn final_snapshot_includes_detail_documents() {
        let mut engine = StreamingEngine::default();
        let bytes = lines(&[
            r#"{"answer_piece":"a"}"#,
            r#"{"message_id":3,"message_type":"assistant","time_sent":"2024-05-01T12:00:00Z","message":"a","context_docs":{"top_documents":[{"document_id":"d1"},{"document_id":"d2"}]}}"#,
            r#"{"type":"complete"}"#,
        ]);
        let mut last = None;
        drive_stream(&mut engine, body(vec![Ok(bytes)]), CancellationToken::new(), |s| {
            last = Some(s.clone())
        })
        .await;
        let last = last.unwrap();
        assert_eq!(last.documents.len(), 2);
        assert_eq!(last.phase, Phase::Complete);
    }
}
