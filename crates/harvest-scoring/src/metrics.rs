//! [`MetricsAccumulator`] – running performance statistics for one session.
//!
//! Min/max values are folded in one sample at a time and never recomputed
//! from history, so the final extrema do not depend on sample order. The
//! accumulator can be frozen when a session stops; a frozen accumulator
//! ignores further samples until [`MetricsAccumulator::reset`].

use harvest_types::{HarvestError, MetricsSnapshot};
use nalgebra::Point3;
use tracing::{debug, trace};

use crate::trajectory::{LineFit, fit_line};

pub const INITIAL_MIN_ANGLE_DEG: f64 = 180.0;
pub const INITIAL_MAX_ANGLE_DEG: f64 = 0.0;
pub const INITIAL_MIN_DISTANCE: f64 = f64::INFINITY;
pub const INITIAL_MAX_DISTANCE: f64 = 0.0;

#[derive(Debug, Clone)]
pub struct MetricsAccumulator {
    min_angle_deg: f64,
    max_angle_deg: f64,
    min_distance: f64,
    max_distance: f64,
    trajectory: LineFit,
    sampled_points: Vec<Point3<f64>>,
    frozen: bool,
}

impl Default for MetricsAccumulator {
    fn default() -> Self {
        Self {
            min_angle_deg: INITIAL_MIN_ANGLE_DEG,
            max_angle_deg: INITIAL_MAX_ANGLE_DEG,
            min_distance: INITIAL_MIN_DISTANCE,
            max_distance: INITIAL_MAX_DISTANCE,
            trajectory: LineFit {
                slope: 0.0,
                intercept: 0.0,
            },
            sampled_points: Vec::new(),
            frozen: false,
        }
    }
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a vessel/retractor angle sample (degrees) into the running range.
    pub fn record_angle(&mut self, angle_deg: f64) {
        if self.frozen || !angle_deg.is_finite() {
            trace!(angle_deg, frozen = self.frozen, "angle sample ignored");
            return;
        }
        self.min_angle_deg = self.min_angle_deg.min(angle_deg);
        self.max_angle_deg = self.max_angle_deg.max(angle_deg);
    }

    /// Fold a tool-to-vessel distance sample into the running range.
    pub fn record_distance(&mut self, distance: f64) {
        if self.frozen || !distance.is_finite() {
            trace!(distance, frozen = self.frozen, "distance sample ignored");
            return;
        }
        self.min_distance = self.min_distance.min(distance);
        self.max_distance = self.max_distance.max(distance);
    }

    /// Append a tool-tip position to the recorded trajectory.
    pub fn record_point(&mut self, point: Point3<f64>) {
        if self.frozen {
            return;
        }
        self.sampled_points.push(point);
    }

    /// Refit the trajectory line over every recorded point.
    ///
    /// On [`HarvestError::InsufficientData`] the last known fit is kept (the
    /// slope starts at 0) and the error is returned for the caller to log.
    pub fn finalize(&mut self) -> Result<LineFit, HarvestError> {
        let fit = fit_line(&self.sampled_points)?;
        if !self.frozen {
            self.trajectory = fit;
        }
        debug!(slope = fit.slope, intercept = fit.intercept, "trajectory fitted");
        Ok(fit)
    }

    /// Stop accepting samples until the next reset.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Restore every statistic to its initial sentinel and clear the
    /// trajectory.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn sampled_points(&self) -> &[Point3<f64>] {
        &self.sampled_points
    }

    pub fn trajectory(&self) -> LineFit {
        self.trajectory
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            min_angle_deg: self.min_angle_deg,
            max_angle_deg: self.max_angle_deg,
            min_distance: self.min_distance,
            max_distance: self.max_distance,
            trajectory_slope: self.trajectory.slope,
            trajectory_intercept: self.trajectory.intercept,
            sample_count: self.sampled_points.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn fresh_accumulator_holds_sentinels() {
        let snap = MetricsAccumulator::new().snapshot();
        assert_eq!(snap.min_angle_deg, 180.0);
        assert_eq!(snap.max_angle_deg, 0.0);
        assert_eq!(snap.min_distance, f64::INFINITY);
        assert_eq!(snap.max_distance, 0.0);
        assert_eq!(snap.trajectory_slope, 0.0);
        assert_eq!(snap.sample_count, 0);
    }

    #[test]
    fn running_extrema() {
        let mut acc = MetricsAccumulator::new();
        for a in [40.0, 12.5, 77.0, 30.0] {
            acc.record_angle(a);
        }
        for d in [9.0, 3.0, 120.0] {
            acc.record_distance(d);
        }
        let snap = acc.snapshot();
        assert_eq!(snap.min_angle_deg, 12.5);
        assert_eq!(snap.max_angle_deg, 77.0);
        assert_eq!(snap.min_distance, 3.0);
        assert_eq!(snap.max_distance, 120.0);
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let mut acc = MetricsAccumulator::new();
        acc.record_angle(f64::NAN);
        acc.record_distance(f64::INFINITY);
        let snap = acc.snapshot();
        assert_eq!(snap.min_angle_deg, INITIAL_MIN_ANGLE_DEG);
        assert_eq!(snap.max_distance, INITIAL_MAX_DISTANCE);
    }

    #[test]
    fn finalize_fits_recorded_points() {
        let mut acc = MetricsAccumulator::new();
        for i in 0..3 {
            acc.record_point(Point3::new(i as f64, i as f64, 0.0));
        }
        acc.finalize().unwrap();
        assert_relative_eq!(acc.snapshot().trajectory_slope, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn finalize_keeps_last_slope_on_insufficient_data() {
        let mut acc = MetricsAccumulator::new();
        acc.record_point(Point3::new(1.0, 1.0, 0.0));
        assert_eq!(
            acc.finalize(),
            Err(HarvestError::InsufficientData { samples: 1 })
        );
        assert_eq!(acc.snapshot().trajectory_slope, 0.0);
    }

    #[test]
    fn frozen_accumulator_ignores_samples() {
        let mut acc = MetricsAccumulator::new();
        acc.record_angle(45.0);
        acc.freeze();
        acc.record_angle(10.0);
        acc.record_distance(1.0);
        acc.record_point(Point3::origin());
        let snap = acc.snapshot();
        assert_eq!(snap.min_angle_deg, 45.0);
        assert_eq!(snap.min_distance, INITIAL_MIN_DISTANCE);
        assert_eq!(snap.sample_count, 0);
    }

    #[test]
    fn reset_restores_sentinels_and_unfreezes() {
        let mut acc = MetricsAccumulator::new();
        acc.record_angle(45.0);
        acc.record_distance(2.0);
        acc.record_point(Point3::new(0.0, 0.0, 0.0));
        acc.record_point(Point3::new(1.0, 3.0, 0.0));
        acc.finalize().unwrap();
        acc.freeze();

        acc.reset();
        let snap = acc.snapshot();
        assert_eq!(snap.min_angle_deg, INITIAL_MIN_ANGLE_DEG);
        assert_eq!(snap.max_angle_deg, INITIAL_MAX_ANGLE_DEG);
        assert_eq!(snap.min_distance, INITIAL_MIN_DISTANCE);
        assert_eq!(snap.max_distance, INITIAL_MAX_DISTANCE);
        assert_eq!(snap.trajectory_slope, 0.0);
        assert!(acc.sampled_points().is_empty());
        assert!(!acc.is_frozen());
    }

    proptest! {
        #[test]
        fn extrema_are_order_independent(
            samples in proptest::collection::vec(0.0f64..180.0, 1..64),
            seed in any::<u64>(),
        ) {
            let mut forward = MetricsAccumulator::new();
            for s in &samples {
                forward.record_angle(*s);
                forward.record_distance(*s);
            }

            // Deterministic shuffle driven by the generated seed.
            let mut shuffled = samples.clone();
            let mut state = seed | 1;
            for i in (1..shuffled.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                shuffled.swap(i, (state % (i as u64 + 1)) as usize);
            }
            let mut permuted = MetricsAccumulator::new();
            for s in &shuffled {
                permuted.record_angle(*s);
                permuted.record_distance(*s);
            }

            prop_assert_eq!(forward.snapshot(), permuted.snapshot());
        }
    }
}
