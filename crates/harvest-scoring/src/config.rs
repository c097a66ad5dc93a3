//! Scoring tunables.
//!
//! The observed values differ between instrument revisions, so every
//! threshold is configuration rather than a hidden constant.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Minimum spacing between recorded samples.
pub const DEFAULT_DEBOUNCE_MS: u64 = 250;
/// Jaw openings smaller than this (degrees) count as closed.
pub const DEFAULT_JAW_CLOSED_THRESHOLD_DEG: f64 = 0.5;
/// Tool-tip to branch distance below which a closed jaw cuts the branch.
pub const DEFAULT_BRANCH_CUT_DISTANCE: f64 = 250.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub debounce_ms: u64,
    pub jaw_closed_threshold_deg: f64,
    pub branch_cut_distance: f64,
}

impl ScoringConfig {
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            jaw_closed_threshold_deg: DEFAULT_JAW_CLOSED_THRESHOLD_DEG,
            branch_cut_distance: DEFAULT_BRANCH_CUT_DISTANCE,
        }
    }
}
