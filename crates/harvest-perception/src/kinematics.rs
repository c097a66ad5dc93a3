//! Jaw kinematics.
//!
//! The cutter's trigger is tracked, the jaw is not. The jaw opening is derived
//! from the angle between a trigger-fixed direction and the shaft axis:
//!
//! ```text
//! raw   = ∠(R_trigger · d_trigger, a_shaft)
//! open  = (clamp(raw, low, high) − low) · gain
//! jaw   = T(+p) · R(hinge, open) · T(−p)
//! ```
//!
//! where `p` is the hinge pivot expressed in the cutter-tip frame.
//!
//! # Example
//!
//! ```rust
//! use harvest_perception::kinematics::{JawSolver, JawSolverConfig};
//!
//! let solver = JawSolver::new(JawSolverConfig::default()).unwrap();
//! assert_eq!(solver.open_angle_deg(80.0), 0.0);
//! assert!((solver.open_angle_deg(102.0) - (12.0 * -2.2)).abs() < 1e-9);
//! ```

use harvest_types::{HarvestError, NodeId};
use nalgebra::{Matrix4, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{DEGENERATE_EPSILON, angle_between_deg};
use crate::transform::TransformGraph;

/// Lower clamp bound of the trigger angle, current revision.
pub const DEFAULT_CLAMP_LOW_DEG: f64 = 90.0;
/// Lower clamp bound used by the earlier instrument revision.
pub const EARLY_REVISION_CLAMP_LOW_DEG: f64 = 86.0;
pub const DEFAULT_CLAMP_HIGH_DEG: f64 = 102.0;
/// Degrees of jaw opening per degree of trigger travel. Negative: squeezing
/// the trigger closes the jaw towards the shaft.
pub const DEFAULT_GAIN: f64 = -2.2;
/// Distance of the hinge pivot from the cutter-tip origin along −Z.
pub const DEFAULT_PIVOT_OFFSET: f64 = 20.0;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Tunables of the clamp-and-map jaw model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JawSolverConfig {
    /// Trigger-fixed direction, in trigger coordinates.
    pub trigger_direction: [f64; 3],
    /// Shaft reference direction, in cutter coordinates.
    pub shaft_axis: [f64; 3],
    pub clamp_low_deg: f64,
    pub clamp_high_deg: f64,
    pub gain: f64,
    /// Axis the jaw rotates about, in cutter-tip coordinates.
    pub hinge_axis: [f64; 3],
    /// Centre of rotation of the jaw, in cutter-tip coordinates.
    pub pivot: [f64; 3],
}

impl Default for JawSolverConfig {
    fn default() -> Self {
        Self {
            trigger_direction: [1.0, 0.0, 0.0],
            shaft_axis: [0.0, 1.0, 0.0],
            clamp_low_deg: DEFAULT_CLAMP_LOW_DEG,
            clamp_high_deg: DEFAULT_CLAMP_HIGH_DEG,
            gain: DEFAULT_GAIN,
            hinge_axis: [0.0, 1.0, 0.0],
            pivot: [0.0, 0.0, -DEFAULT_PIVOT_OFFSET],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JawState
// ────────────────────────────────────────────────────────────────────────────

/// Result of one solver pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JawState {
    /// Trigger angle before clamping (degrees).
    pub raw_angle_deg: f64,
    /// Jaw opening applied to the derived node (degrees).
    pub open_angle_deg: f64,
}

impl JawState {
    /// A jaw counts as closed when its opening is below `threshold_deg`.
    pub fn is_closed(&self, threshold_deg: f64) -> bool {
        self.open_angle_deg.abs() < threshold_deg
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JawSolver
// ────────────────────────────────────────────────────────────────────────────

/// Maps the tracked trigger pose to the jaw's local transform.
///
/// Apart from the single write in [`JawSolver::solve`] every method is pure.
#[derive(Debug, Clone)]
pub struct JawSolver {
    config: JawSolverConfig,
    trigger: Vector3<f64>,
    shaft: Vector3<f64>,
    hinge: Unit<Vector3<f64>>,
    pivot: Vector3<f64>,
}

impl JawSolver {
    /// Validate `config` and build a solver.
    ///
    /// # Errors
    ///
    /// * [`HarvestError::DegenerateVector`] if the hinge axis has no direction.
    /// * [`HarvestError::Config`] if the clamp interval is empty or not finite.
    pub fn new(config: JawSolverConfig) -> Result<Self, HarvestError> {
        if !(config.clamp_low_deg.is_finite()
            && config.clamp_high_deg.is_finite()
            && config.clamp_low_deg <= config.clamp_high_deg)
        {
            return Err(HarvestError::Config(format!(
                "invalid trigger clamp interval [{}, {}]",
                config.clamp_low_deg, config.clamp_high_deg
            )));
        }
        let hinge = Unit::try_new(Vector3::from(config.hinge_axis), DEGENERATE_EPSILON)
            .ok_or(HarvestError::DegenerateVector)?;
        Ok(Self {
            trigger: Vector3::from(config.trigger_direction),
            shaft: Vector3::from(config.shaft_axis),
            pivot: Vector3::from(config.pivot),
            hinge,
            config,
        })
    }

    pub fn config(&self) -> &JawSolverConfig {
        &self.config
    }

    /// Trigger angle (degrees) for a sensor transform-to-parent.
    ///
    /// The sensor's parent is the cutter frame, so rotating the trigger
    /// direction by the sensor transform expresses it in the shaft frame.
    pub fn raw_angle_deg(&self, sensor_local: &Matrix4<f64>) -> Result<f64, HarvestError> {
        let trigger_in_shaft = sensor_local.transform_vector(&self.trigger);
        angle_between_deg(&trigger_in_shaft, &self.shaft)
    }

    /// Clamp-and-map from trigger angle to jaw opening (degrees).
    pub fn open_angle_deg(&self, raw_angle_deg: f64) -> f64 {
        let low = self.config.clamp_low_deg;
        (raw_angle_deg.clamp(low, self.config.clamp_high_deg) - low) * self.config.gain
    }

    /// Rotation by `open_angle_deg` about the hinge axis through the pivot.
    pub fn jaw_transform(&self, open_angle_deg: f64) -> Matrix4<f64> {
        let rotation =
            Rotation3::from_axis_angle(&self.hinge, open_angle_deg.to_radians()).to_homogeneous();
        Matrix4::new_translation(&self.pivot) * rotation * Matrix4::new_translation(&-self.pivot)
    }

    /// Read `sensor`, recompute the jaw, and write it as the local transform
    /// of `jaw`. This write triggers the graph's change notification.
    pub fn solve(
        &self,
        graph: &mut TransformGraph,
        sensor: NodeId,
        jaw: NodeId,
    ) -> Result<JawState, HarvestError> {
        let local = graph.local_transform(sensor)?;
        let raw_angle_deg = self.raw_angle_deg(&local)?;
        let open_angle_deg = self.open_angle_deg(raw_angle_deg);
        debug!(raw_angle_deg, open_angle_deg, "jaw solved");
        graph.set_local_transform(jaw, self.jaw_transform(open_angle_deg))?;
        Ok(JawState {
            raw_angle_deg,
            open_angle_deg,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
