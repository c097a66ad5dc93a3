//! Branch-occlusion state machine.
//!
//! The target vessel carries labelled side branches that the trainee must
//! cut. Each branch moves `Open → Cut` at most once per session:
//!
//! 1. Pick the branch whose start point is nearest to the tool tip. Exact
//!    ties go to the lowest branch index.
//! 2. Take the smallest distance from the tip to any point on that branch's
//!    centreline polyline.
//! 3. If that distance is below the cut threshold and the jaw is closed,
//!    the branch becomes [`BranchState::Cut`].
//!
//! Only [`BranchSet::reset`] moves a branch back to `Open`.

use harvest_perception::geometry::{nearest_point, polyline_distance};
use harvest_types::BranchFlag;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchState {
    Open,
    Cut,
}

/// One labelled branch of the target vessel.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchSegment {
    pub id: String,
    pub start_point: Point3<f64>,
    /// Ordered centreline vertices.
    pub polyline: Vec<Point3<f64>>,
    state: BranchState,
}

impl BranchSegment {
    pub fn new(id: impl Into<String>, start_point: Point3<f64>, polyline: Vec<Point3<f64>>) -> Self {
        Self {
            id: id.into(),
            start_point,
            polyline,
            state: BranchState::Open,
        }
    }

    pub fn state(&self) -> BranchState {
        self.state
    }

    pub fn is_cut(&self) -> bool {
        self.state == BranchState::Cut
    }
}

/// Emitted once when a branch transitions to [`BranchState::Cut`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchCut {
    pub index: usize,
    pub id: String,
    /// Tip-to-centreline distance that triggered the cut.
    pub distance: f64,
}

/// The fixed set of branches of one anatomical model.
#[derive(Debug, Clone, Default)]
pub struct BranchSet {
    branches: Vec<BranchSegment>,
}

impl BranchSet {
    pub fn new(branches: Vec<BranchSegment>) -> Self {
        Self { branches }
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn branches(&self) -> &[BranchSegment] {
        &self.branches
    }

    /// Index of the branch whose start point is nearest to `tip`.
    pub fn nearest_branch(&self, tip: &Point3<f64>) -> Option<usize> {
        let starts: Vec<Point3<f64>> = self.branches.iter().map(|b| b.start_point).collect();
        nearest_point(tip, &starts).map(|(i, _)| i)
    }

    /// Run one state-machine step for the current tool-tip position.
    ///
    /// Returns the transition if a branch was cut by this step. Branches that
    /// are already cut never produce a second event.
    pub fn evaluate(
        &mut self,
        tip: &Point3<f64>,
        jaw_closed: bool,
        threshold: f64,
    ) -> Option<BranchCut> {
        if !jaw_closed {
            return None;
        }
        let index = self.nearest_branch(tip)?;
        let branch = &mut self.branches[index];
        if branch.is_cut() {
            return None;
        }
        let distance = polyline_distance(tip, &branch.polyline)?;
        if distance >= threshold {
            return None;
        }
        branch.state = BranchState::Cut;
        info!(branch = %branch.id, index, distance, "branch cut");
        Some(BranchCut {
            index,
            id: branch.id.clone(),
            distance,
        })
    }

    /// Reopen every branch.
    pub fn reset(&mut self) {
        for branch in &mut self.branches {
            branch.state = BranchState::Open;
        }
    }

    /// Per-branch cut flags in index order.
    pub fn cut_flags(&self) -> Vec<BranchFlag> {
        self.branches
            .iter()
            .map(|b| BranchFlag {
                id: b.id.clone(),
                cut: b.is_cut(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 250.0;

    fn set() -> BranchSet {
        BranchSet::new(vec![
            BranchSegment::new(
                "upper",
                Point3::new(0.0, 1000.0, 0.0),
                vec![Point3::new(0.0, 1000.0, 0.0), Point3::new(500.0, 1000.0, 0.0)],
            ),
            BranchSegment::new(
                "lower",
                Point3::new(0.0, -1000.0, 0.0),
                vec![Point3::new(0.0, -1000.0, 0.0), Point3::new(500.0, -1000.0, 0.0)],
            ),
        ])
    }

    #[test]
    fn open_jaw_never_cuts() {
        let mut branches = set();
        let tip = Point3::new(250.0, 1000.0, 0.0);
        assert!(branches.evaluate(&tip, false, THRESHOLD).is_none());
        assert!(!branches.branches()[0].is_cut());
    }

    #[test]
    fn closed_jaw_near_centreline_cuts_nearest_branch() {
        let mut branches = set();
        let tip = Point3::new(480.0, 1010.0, 0.0);
        let cut = branches.evaluate(&tip, true, THRESHOLD).unwrap();
        assert_eq!(cut.index, 0);
        assert_eq!(cut.id, "upper");
        assert!(cut.distance < THRESHOLD);
        assert_eq!(branches.branches()[0].state(), BranchState::Cut);
        assert_eq!(branches.branches()[1].state(), BranchState::Open);
    }

    #[test]
    fn far_from_centreline_does_not_cut() {
        let mut branches = set();
        let tip = Point3::new(250.0, 600.0, 0.0);
        assert!(branches.evaluate(&tip, true, THRESHOLD).is_none());
    }

    #[test]
    fn distance_is_measured_to_centreline_not_vertices() {
        // Both vertices are just over 250 away; the segment is 10 away.
        let mut branches = set();
        let tip = Point3::new(250.0, 990.0, 0.0);
        let cut = branches.evaluate(&tip, true, THRESHOLD).unwrap();
        assert!((cut.distance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn cut_is_reported_exactly_once() {
        let mut branches = set();
        let tip = Point3::new(0.0, 990.0, 0.0);
        let events = (0..10)
            .filter_map(|_| branches.evaluate(&tip, true, THRESHOLD))
            .count();
        assert_eq!(events, 1);
        assert!(branches.branches()[0].is_cut());
    }

    #[test]
    fn exact_tie_picks_lowest_index() {
        let branches = set();
        assert_eq!(branches.nearest_branch(&Point3::origin()), Some(0));
    }

    #[test]
    fn reset_reopens_all_branches() {
        let mut branches = set();
        branches.evaluate(&Point3::new(0.0, 1000.0, 0.0), true, THRESHOLD);
        branches.evaluate(&Point3::new(0.0, -1000.0, 0.0), true, THRESHOLD);
        assert!(branches.cut_flags().iter().all(|f| f.cut));

        branches.reset();
        assert!(branches.cut_flags().iter().all(|f| !f.cut));
        // And the machine runs again after a reset.
        assert!(branches.evaluate(&Point3::new(0.0, 1000.0, 0.0), true, THRESHOLD).is_some());
    }

    #[test]
    fn empty_set_is_inert() {
        let mut branches = BranchSet::default();
        assert!(branches.evaluate(&Point3::origin(), true, THRESHOLD).is_none());
        assert!(branches.cut_flags().is_empty());
    }
}
