//! Per-kind packet counters.

use std::collections::BTreeMap;

use crate::packet::PacketKind;

/// Label used for payloads that failed to parse.
pub const INVALID_LABEL: &str = "invalid";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketStats {
    counts: BTreeMap<&'static str, u64>,
    total: u64,
}

impl PacketStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: PacketKind) {
        self.bump(kind.label());
    }

    pub fn record_invalid(&mut self) {
        self.bump(INVALID_LABEL);
    }

    fn bump(&mut self, label: &'static str) {
        *self.counts.entry(label).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Owned copy for snapshots.
    pub fn to_map(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|(label, n)| (label.to_string(), *n))
            .collect()
    }
}
