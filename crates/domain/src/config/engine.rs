use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tuning knobs for the answer reconstruction engine.
///
/// None of these affect the reconstructed data; they only shape how
/// progress is presented while a stream is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum time a progress phase stays visible before the next one
    /// may take effect.
    #[serde(default = "d_800")]
    pub min_phase_dwell_ms: u64,
    /// Minimum interval between two externally observed progress snapshots.
    #[serde(default = "d_150")]
    pub snapshot_interval_ms: u64,
    /// Move `<think>...</think>` blocks found in the answer into the
    /// thinking text when reading the answer out.
    #[serde(default = "d_true")]
    pub extract_think_blocks: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_phase_dwell_ms: 800,
            snapshot_interval_ms: 150,
            extract_think_blocks: true,
        }
    }
}

impl EngineConfig {
    pub fn min_phase_dwell(&self) -> Duration {
        Duration::from_millis(self.min_phase_dwell_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }
}

fn d_800() -> u64 {
    800
}

fn d_150() -> u64 {
    150
}

fn d_true() -> bool {
    true
}
