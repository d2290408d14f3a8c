//! The streaming engine: one instance per in-flight assistant message.
//!
//! Payloads go in through [`StreamingEngine::submit_fragment`]; readers take
//! [`SearchProgress`] snapshots while the stream runs and one
//! [`ChatMessage`] when it ends.  Everything here is synchronous; the only
//! suspension point of a stream is the network read in [`crate::drive`].

use std::time::Instant;

use chrono::Utc;
use ds_domain::config::EngineConfig;
use ds_domain::model::{ChatMessage, Phase, SearchProgress};

use crate::compile::compile;
use crate::packet::{classify, ClassifiedPacket};
use crate::phase::{detect, PhaseMachine};
use crate::state::StreamingAnswerState;
use crate::stats::PacketStats;
use crate::throttle::SnapshotThrottle;

pub struct StreamingEngine {
    config: EngineConfig,
    state: StreamingAnswerState,
    phase: PhaseMachine,
    stats: PacketStats,
    throttle: SnapshotThrottle,
}

impl StreamingEngine {
    pub fn new(config: EngineConfig) -> Self {
        let now = Instant::now();
        Self {
            phase: PhaseMachine::new(config.min_phase_dwell(), now),
            throttle: SnapshotThrottle::new(config.snapshot_interval()),
            state: StreamingAnswerState::new(),
            stats: PacketStats::new(),
            config,
        }
    }

    // ── Input ──────────────────────────────────────────────────────

    /// Classify and fold one decoded payload.
    ///
    /// Returns `None` when the payload could not be parsed; that is logged
    /// and never fatal.
    pub fn submit_fragment(&mut self, payload: &str) -> Option<ClassifiedPacket> {
        self.submit_at(payload, Instant::now())
    }

    /// [`submit_fragment`](Self::submit_fragment) with an explicit clock.
    pub fn submit_at(&mut self, payload: &str, now: Instant) -> Option<ClassifiedPacket> {
        let packet = match classify(payload) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, payload = %preview(payload), "dropping unparseable packet");
                self.stats.record_invalid();
                return None;
            }
        };

        self.stats.record(packet.kind());
        match &packet {
            ClassifiedPacket::Unknown(value) => {
                tracing::debug!(packet = %value, "unrecognized packet passed through");
            }
            ClassifiedPacket::StreamingError { message } => {
                tracing::warn!(error = %message, "backend reported a streaming error");
            }
            _ => {}
        }

        self.state.apply(&packet);

        // Completion and errors bypass the dwell time.
        if let ClassifiedPacket::StreamingError { .. } = packet {
            let current = self.phase.current();
            self.phase.force_transition(current, now);
        } else {
            match detect(&packet) {
                Some(Phase::Complete) => self.phase.force_transition(Phase::Complete, now),
                Some(candidate) => {
                    self.phase.transition_to(candidate, now);
                }
                None => {}
            }
        }

        Some(packet)
    }

    /// Record a transport failure that ended the stream.
    ///
    /// An error already reported by the backend takes precedence.
    pub fn record_transport_error(&mut self, message: impl Into<String>) {
        if self.state.error.is_none() {
            self.state.error = Some(message.into());
        }
        self.state.mark_complete();
    }

    /// Mark the message complete after the stream ended without a
    /// completion packet.
    pub fn finish(&mut self) {
        if !self.state.is_complete() {
            tracing::debug!("stream ended without completion; finalizing");
        }
        self.state.mark_complete();
    }

    // ── Output ─────────────────────────────────────────────────────

    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    pub fn phase(&self) -> Phase {
        self.phase.current()
    }

    /// Current view of the in-flight answer.
    pub fn progress_snapshot(&self) -> SearchProgress {
        let (answer, thinking) = self.state.answer.render(self.config.extract_think_blocks);
        SearchProgress {
            phase: self.phase.current(),
            answer,
            thinking,
            sub_questions: self.state.tree.cleaned(),
            documents: self.state.documents.as_slice().to_vec(),
            is_complete: self.state.is_complete(),
            error: self.state.error.clone(),
            packet_counts: self.stats.to_map(),
        }
    }

    /// Fire due phase transitions.
    pub fn tick(&mut self, now: Instant) -> Option<Phase> {
        self.phase.tick(now)
    }

    /// Earliest instant at which a pending phase transition becomes due.
    pub fn next_phase_due(&self) -> Option<Instant> {
        self.phase.next_due()
    }

    /// A snapshot, if the throttle allows one at `now`.
    pub fn poll_snapshot(&mut self, now: Instant) -> Option<SearchProgress> {
        self.phase.tick(now);
        self.throttle
            .ready(now)
            .then(|| self.progress_snapshot())
    }

    /// Compile the terminal artifact and start over with fresh state.
    pub fn final_message(&mut self) -> ChatMessage {
        let state = std::mem::take(&mut self.state);
        let message = compile(state, self.config.extract_think_blocks, Utc::now());
        tracing::debug!(
            id = %message.id,
            sub_questions = message.sub_questions.len(),
            documents = message.documents.len(),
            packets = self.stats.total(),
            error = message.error.is_some(),
            "final message compiled"
        );
        self.reset();
        message
    }

    /// Discard all per-message state.
    pub fn reset(&mut self) {
        self.state = StreamingAnswerState::new();
        self.phase.reset(Instant::now());
        self.stats = PacketStats::new();
        self.throttle.reset();
    }
}

impl Default for StreamingEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn preview(s: &str) -> &str {
    match s.char_indices().nth(80) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn engine() -> StreamingEngine {
        StreamingEngine::default()
    }

    #[test]
    fn parse_failure_is_not_fatal() {
        let mut e = engine();
        assert!(e.submit_fragment("{not json").is_none());
        assert!(e.submit_fragment(r#"{"answer_piece":"ok"}"#).is_some());
        assert_eq!(e.progress_snapshot().answer, "ok");
        assert_eq!(e.progress_snapshot().packet_counts.get("invalid"), Some(&1));
    }

    #[test]
    fn unknown_packets_pass_through_without_state_change() {
        let mut e = engine();
        let packet = e.submit_fragment(r#"{"foo":"bar"}"#).unwrap();
        assert!(matches!(packet, ClassifiedPacket::Unknown(_)));
        let snap = e.progress_snapshot();
        assert_eq!(snap.answer, "");
        assert!(snap.sub_questions.is_empty());
        assert_eq!(snap.phase, Phase::Waiting);
    }

    #[test]
    fn error_completes_and_cancels_pending_phase() {
        let t0 = Instant::now();
        let mut e = engine();
        e.submit_at(r#"{"sub_question":"q","level":1,"level_question_num":1}"#, t0);
        assert!(e.next_phase_due().is_some());

        let packet = e.submit_at(r#"{"error":"boom"}"#, t0 + Duration::from_millis(10));
        assert!(packet.unwrap().is_terminal());
        assert!(e.is_complete());
        assert_eq!(e.next_phase_due(), None);
        assert_eq!(e.phase(), Phase::Waiting);
        assert_eq!(e.progress_snapshot().error.as_deref(), Some("boom"));
    }

    #[test]
    fn completion_inside_dwell_window_forces_complete() {
        let t0 = Instant::now();
        let mut e = engine();
        e.submit_at(r#"{"answer_piece":"Hello"}"#, t0);
        assert_eq!(e.phase(), Phase::Waiting);
        assert!(e.next_phase_due().is_some());

        e.submit_at(r#"{"type":"complete"}"#, t0 + Duration::from_millis(50));
        assert_eq!(e.phase(), Phase::Complete);
        assert_eq!(e.next_phase_due(), None);
        let snap = e.progress_snapshot();
        assert!(snap.is_complete);
        assert_eq!(snap.phase, Phase::Complete);
    }

    #[test]
    fn null_answer_marker_forces_complete() {
        let t0 = Instant::now();
        let mut e = engine();
        e.submit_at(r#"{"sub_question":"q","level":1,"level_question_num":1}"#, t0);
        e.submit_at(r#"{"answer_piece":null}"#, t0 + Duration::from_millis(20));
        assert_eq!(e.phase(), Phase::Complete);
        assert_eq!(e.tick(t0 + Duration::from_secs(5)), None);
    }

    #[test]
    fn detail_packet_shows_up_in_snapshots_before_compile() {
        let mut e = engine();
        e.submit_fragment(r#"{"sub_question":"streamed","level":1,"level_question_num":2}"#);
        e.submit_fragment(
            r#"{"message_id":9,"message_type":"assistant","time_sent":"2024-05-01T12:00:00Z","message":"done","context_docs":{"top_documents":[{"document_id":"d9"}]},"sub_questions":[{"level":1,"level_question_num":1,"question":"final"}]}"#,
        );

        let snap = e.progress_snapshot();
        let docs: Vec<&str> = snap.documents.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(docs, vec!["d9"]);
        let questions: Vec<&str> = snap
            .sub_questions
            .iter()
            .map(|s| s.question_text.as_str())
            .collect();
        assert_eq!(questions, vec!["final"]);

        let msg = e.final_message();
        assert_eq!(msg.documents.len(), 1);
        assert_eq!(msg.sub_questions.len(), 1);
    }

    #[test]
    fn snapshots_are_throttled() {
        let t0 = Instant::now();
        let mut e = engine();
        e.submit_at(r#"{"answer_piece":"a"}"#, t0);
        assert!(e.poll_snapshot(t0).is_some());
        assert!(e.poll_snapshot(t0 + Duration::from_millis(10)).is_none());
        assert!(e.poll_snapshot(t0 + Duration::from_millis(200)).is_some());
    }

    #[test]
    fn final_message_resets_state() {
        let mut e = engine();
        e.submit_fragment(r#"{"answer_piece":"done"}"#);
        e.submit_fragment(r#"{"type":"complete"}"#);
        assert!(e.is_complete());

        let msg = e.final_message();
        assert_eq!(msg.content, "done");
        assert!(!msg.is_streaming);

        assert!(!e.is_complete());
        assert_eq!(e.phase(), Phase::Waiting);
        assert_eq!(e.progress_snapshot().answer, "");
        assert!(e.progress_snapshot().packet_counts.is_empty());
    }

    #[test]
    fn transport_error_keeps_backend_error() {
        let mut e = engine();
        e.submit_fragment(r#"{"error":"backend said no"}"#);
        e.record_transport_error("connection reset");
        assert_eq!(e.final_message().error.as_deref(), Some("backend said no"));

        e.record_transport_error("connection reset");
        assert_eq!(e.final_message().error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn finish_marks_implicit_completion() {
        let mut e = engine();
        e.submit_fragment(r#"{"answer_piece":"partial"}"#);
        e.finish();
        let msg = e.final_message();
        assert!(!msg.is_streaming);
        assert_eq!(msg.content, "partial");
    }
}
