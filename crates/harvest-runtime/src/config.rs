//! Tutor configuration bundle.

use harvest_perception::JawSolverConfig;
use harvest_scoring::ScoringConfig;
use serde::{Deserialize, Serialize};

use crate::scene::SceneConfig;

/// Every tunable of the tutor, grouped by the component that consumes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    pub jaw: JawSolverConfig,
    pub scoring: ScoringConfig,
    pub scene: SceneConfig,
}
