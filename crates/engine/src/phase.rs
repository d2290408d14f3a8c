//! Debounced progress phase.
//!
//! The phase is presentation only: packet data is folded immediately, but
//! the label shown to a user must stay on each phase for at least the dwell
//! time.  A transition requested too early is parked as a pending token and
//! fired by [`PhaseMachine::tick`] once due.
//!
//! Time is always passed in by the caller, which keeps the machine
//! deterministic under test.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ds_domain::model::Phase;

use crate::packet::ClassifiedPacket;

/// Candidate phase implied by a packet, if any.
pub fn detect(packet: &ClassifiedPacket) -> Option<Phase> {
    match packet {
        ClassifiedPacket::SubQuestionPiece { .. } | ClassifiedPacket::SubQueryPiece { .. } => {
            Some(Phase::SubQueries)
        }
        ClassifiedPacket::DocumentInfo(_) | ClassifiedPacket::DocumentBatch { .. } => {
            Some(Phase::ContextDocs)
        }
        ClassifiedPacket::AnswerPiece { text: None } => Some(Phase::Complete),
        ClassifiedPacket::AnswerPiece { .. } | ClassifiedPacket::SubAnswerPiece { .. } => {
            Some(Phase::Answer)
        }
        ClassifiedPacket::MessageDetail(_) => Some(Phase::Evaluate),
        ClassifiedPacket::Completion => Some(Phase::Complete),
        _ => None,
    }
}

/// Result of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Candidate equal to or behind the current phase.
    Unchanged,
    Entered(Phase),
    Scheduled { phase: Phase, token: u64, due: Instant },
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    token: u64,
    due: Instant,
}

#[derive(Debug, Clone)]
pub struct PhaseMachine {
    current: Phase,
    entered_at: Instant,
    dwell: Duration,
    /// At most one pending token per candidate phase.
    pending: HashMap<Phase, Pending>,
    next_token: u64,
}

impl PhaseMachine {
    pub fn new(dwell: Duration, now: Instant) -> Self {
        Self {
            current: Phase::Waiting,
            entered_at: now,
            dwell,
            pending: HashMap::new(),
            next_token: 0,
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    /// Earliest instant at which [`tick`](Self::tick) has work to do.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.due).min()
    }

    /// Request a move to `candidate`.
    pub fn transition_to(&mut self, candidate: Phase, now: Instant) -> Transition {
        if candidate <= self.current {
            return Transition::Unchanged;
        }

        if now.saturating_duration_since(self.entered_at) >= self.dwell {
            self.enter(candidate, now);
            return Transition::Entered(candidate);
        }

        // Replace, never stack, a pending transition to the same candidate.
        self.pending.remove(&candidate);
        let token = self.next_token;
        self.next_token += 1;
        let due = self.entered_at + self.dwell;
        self.pending.insert(candidate, Pending { token, due });
        tracing::trace!(phase = %candidate, token, "phase transition scheduled");
        Transition::Scheduled {
            phase: candidate,
            token,
            due,
        }
    }

    /// Switch immediately, dropping every pending transition.
    pub fn force_transition(&mut self, phase: Phase, now: Instant) {
        self.pending.clear();
        if phase != self.current {
            self.current = phase;
            self.entered_at = now;
            tracing::debug!(phase = %phase, "phase forced");
        }
    }

    /// Fire the lowest-ranked due transition.  Returns the new phase when
    /// the phase changed.
    pub fn tick(&mut self, now: Instant) -> Option<Phase> {
        let current = self.current;
        self.pending.retain(|phase, _| *phase > current);

        let (phase, pending) = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .min_by_key(|(phase, _)| **phase)
            .map(|(phase, p)| (*phase, *p))?;

        tracing::trace!(phase = %phase, token = pending.token, "pending phase transition fired");
        self.enter(phase, now);
        Some(phase)
    }

    /// Back to `waiting` with nothing pending.
    pub fn reset(&mut self, now: Instant) {
        self.current = Phase::Waiting;
        self.entered_at = now;
        self.pending.clear();
    }

    fn enter(&mut self, phase: Phase, now: Instant) {
        self.current = phase;
        self.entered_at = now;
        // Tokens at or behind the new phase are stale; the rest must now
        // wait out the new phase's dwell.
        let earliest = now + self.dwell;
        self.pending.retain(|p, _| *p > phase);
        for pending in self.pending.values_mut() {
            pending.due = pending.due.max(earliest);
        }
        tracing::debug!(phase = %phase, "phase entered");
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
