//! [`SessionController`] – the tutor's event loop.
//!
//! Every externally triggered change goes through the controller, which runs
//! the whole pipeline synchronously before returning:
//!
//! 1. **Propagate** – the new local transform is written into the
//!    [`TransformGraph`], which queues a change event for every subscribed
//!    descendant.
//! 2. **Solve** – a sensor event re-runs the [`JawSolver`], whose write to
//!    the jaw node queues a further event.
//! 3. **Sample** – a jaw event (or [`SessionController::tick`]) asks the
//!    [`DebounceSampler`] whether a sample is due. If so the tool-tip
//!    position, the vessel angle and (jaw closed) the vessel distance are
//!    folded into the [`MetricsAccumulator`].
//! 4. **Occlude** – with the jaw closed the [`BranchSet`] state machine
//!    checks whether the nearest branch has just been cut.
//!
//! Each metric is computed in isolation: a failure is logged, recorded in the
//! [`CycleReport`] and the remaining metrics of the cycle still run. No error
//! escapes an update call.
//!
//! # Lifecycle
//!
//! `start` resets everything and fails fast when the scene is incomplete.
//! `stop` fits the trajectory and freezes the metrics. `reset` clears them.
//! Calling `stop` or `reset` while idle is a no-op.
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//! use harvest_runtime::{InMemoryAssets, Mesh, SessionController, TutorConfig};
//! use nalgebra::{Matrix4, Point3};
//!
//! let mut assets = InMemoryAssets::new()
//!     .with_transform("CutterTipToCutter", Matrix4::identity())
//!     .with_transform("VesselModelToVessel", Matrix4::identity())
//!     .with_mesh(Mesh::new("VesselModel", vec![Point3::new(0.0, 0.0, 10.0)]));
//!
//! let mut tutor = SessionController::new(TutorConfig::default()).unwrap();
//! tutor.install(&mut assets).unwrap();
//! tutor.start(Instant::now()).unwrap();
//! let cycle = tutor.update_sensor(Matrix4::identity(), Instant::now());
//! assert!(cycle.sampled);
//! ```

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use harvest_perception::geometry::{angle_between_deg, nearest_vertex_distance, position, z_basis};
use harvest_perception::{JawSolver, JawState, SubscriptionId, TransformGraph};
use harvest_scoring::{
    BranchCut, BranchSet, DebounceSampler, LineFit, MetricsAccumulator, ScoringConfig,
    export_metrics,
};
use harvest_types::{BranchFlag, GraphEvent, HarvestError, MetricsReport, MetricsSnapshot};
use nalgebra::{Matrix4, Point3};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assets::AssetProvider;
use crate::config::TutorConfig;
use crate::scene::{SceneConfig, SceneHandles, install_scene};

// ─────────────────────────────────────────────────────────────────────────────
// Observer & cycle report
// ─────────────────────────────────────────────────────────────────────────────

/// UI-side collaborator notified of session milestones.
pub trait SessionObserver {
    /// A branch has just transitioned to cut; hide or recolour it.
    fn on_branch_cut(&mut self, cut: &BranchCut) {
        let _ = cut;
    }

    /// The session stopped; `report` is the frozen result.
    fn on_session_stopped(&mut self, report: &MetricsReport) {
        let _ = report;
    }
}

/// Individually failing computations within one update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Kinematics,
    TipPosition,
    Angle,
    Distance,
    Branches,
}

/// What happened while processing one external update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Latest jaw state if the solver ran during this cycle.
    pub jaw: Option<JawState>,
    /// `true` when a debounced sample was recorded.
    pub sampled: bool,
    /// Branches cut during this cycle.
    pub cuts: Vec<BranchCut>,
    /// Computations skipped this cycle and why.
    pub skipped: Vec<(Metric, HarvestError)>,
}

impl CycleReport {
    fn skip(&mut self, metric: Metric, error: HarvestError) {
        warn!(metric = ?metric, error = %error, "metric skipped this cycle");
        self.skipped.push((metric, error));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct Session {
    id: Uuid,
    running: bool,
    started_at: Option<Instant>,
    started_wall: Option<DateTime<Utc>>,
    stopped_at: Option<Instant>,
}

impl Session {
    fn elapsed(&self, now: Instant) -> Duration {
        match (self.started_at, self.stopped_at) {
            (Some(start), Some(stop)) => stop.saturating_duration_since(start),
            (Some(start), None) => now.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionController
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the kinematic pipeline and the scoring state of one trainee run.
pub struct SessionController {
    graph: TransformGraph,
    solver: JawSolver,
    scoring: ScoringConfig,
    scene_config: SceneConfig,
    scene: Option<SceneHandles>,
    subscriptions: Vec<SubscriptionId>,
    events_tx: Sender<GraphEvent>,
    events_rx: Receiver<GraphEvent>,
    metrics: MetricsAccumulator,
    sampler: DebounceSampler,
    branches: BranchSet,
    jaw: Option<JawState>,
    session: Session,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl SessionController {
    /// Build a controller with an empty graph.
    ///
    /// # Errors
    ///
    /// Propagates [`JawSolver::new`] validation errors.
    pub fn new(config: TutorConfig) -> Result<Self, HarvestError> {
        let solver = JawSolver::new(config.jaw)?;
        let (events_tx, events_rx) = mpsc::channel();
        Ok(Self {
            graph: TransformGraph::new(),
            solver,
            sampler: DebounceSampler::new(config.scoring.debounce_interval()),
            scoring: config.scoring,
            scene_config: config.scene,
            scene: None,
            subscriptions: Vec::new(),
            events_tx,
            events_rx,
            metrics: MetricsAccumulator::new(),
            branches: BranchSet::default(),
            jaw: None,
            session: Session::default(),
            observers: Vec::new(),
        })
    }

    /// Register a UI collaborator.
    pub fn add_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Install (or re-resolve) the scene from `assets` and subscribe to the
    /// sensor and jaw frames.
    ///
    /// # Errors
    ///
    /// * [`HarvestError::SessionRunning`] while a session is running; the
    ///   graph and branch flags are left untouched.
    /// * Anything [`install_scene`] reports.
    pub fn install(&mut self, assets: &mut dyn AssetProvider) -> Result<(), HarvestError> {
        if self.session.running {
            return Err(HarvestError::SessionRunning("reinstalling the scene".to_string()));
        }
        let handles = install_scene(&mut self.graph, assets, &self.scene_config)?;

        for id in self.subscriptions.drain(..) {
            self.graph.unsubscribe(id);
        }
        self.subscriptions.push(
            self.graph
                .subscribe_channel(handles.sensor, self.events_tx.clone())?,
        );
        self.subscriptions
            .push(self.graph.subscribe_channel(handles.jaw, self.events_tx.clone())?);

        self.branches = BranchSet::new(handles.branches.clone());
        self.scene = Some(handles);
        // Bring the jaw in line with whatever the sensor currently reads.
        let mut report = CycleReport::default();
        self.solve(&mut report);
        self.drain_events(Instant::now(), &mut report);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a new session, implicitly resetting all metrics and branches.
    ///
    /// # Errors
    ///
    /// [`HarvestError::MissingNode`] / [`HarvestError::MissingMesh`] if the
    /// scene has not been installed or is incomplete. Re-running
    /// [`install`][Self::install] recovers.
    pub fn start(&mut self, now: Instant) -> Result<Uuid, HarvestError> {
        self.check_scene()?;
        if self.session.running {
            warn!(session = %self.session.id, "session restarted while running");
        }
        self.reset_scoring();
        // Events queued while idle belong to no session.
        while self.events_rx.try_recv().is_ok() {}

        self.session = Session {
            id: Uuid::new_v4(),
            running: true,
            started_at: Some(now),
            started_wall: Some(Utc::now()),
            stopped_at: None,
        };
        info!(session = %self.session.id, "session started");
        Ok(self.session.id)
    }

    /// Stop the running session, fit the trajectory and freeze the metrics.
    ///
    /// Returns `None` (and does nothing) when no session is running.
    pub fn stop(&mut self, now: Instant) -> Option<MetricsReport> {
        if !self.session.running {
            debug!("stop requested with no running session");
            return None;
        }
        if let Err(e) = self.metrics.finalize() {
            info!(error = %e, "keeping last trajectory slope");
        }
        self.metrics.freeze();
        self.session.running = false;
        self.session.stopped_at = Some(now);

        let report = self.report(now);
        info!(
            session = %report.session_id,
            elapsed_s = report.elapsed.as_secs_f64(),
            samples = report.metrics.sample_count,
            "session stopped"
        );
        for observer in &mut self.observers {
            observer.on_session_stopped(&report);
        }
        Some(report)
    }

    /// Stop without reporting and clear every metric and branch flag.
    pub fn reset(&mut self) {
        self.reset_scoring();
        self.session = Session::default();
        debug!("session reset");
    }

    pub fn is_running(&self) -> bool {
        self.session.running
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.started_at.map(|_| self.session.id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Updates
    // ─────────────────────────────────────────────────────────────────────────

    /// Push a new trigger reading and run the full pipeline.
    pub fn update_sensor(&mut self, local: Matrix4<f64>, now: Instant) -> CycleReport {
        let name = self.scene_config.sensor_node.clone();
        self.update_node(&name, local, now)
    }

    /// Push a new transform for any named frame (cutter or vessel tracker)
    /// and run the full pipeline.
    pub fn update_node(&mut self, name: &str, local: Matrix4<f64>, now: Instant) -> CycleReport {
        let mut report = CycleReport::default();
        let id = match self.graph.require(name) {
            Ok(id) => id,
            Err(e) => {
                report.skip(Metric::Kinematics, e);
                return report;
            }
        };
        if let Err(e) = self.graph.set_local_transform(id, local) {
            report.skip(Metric::Kinematics, e);
            return report;
        }
        self.drain_events(now, &mut report);
        report
    }

    /// Periodic sampling step, independent of sensor traffic.
    pub fn tick(&mut self, now: Instant) -> CycleReport {
        let mut report = CycleReport::default();
        self.sample(now, &mut report);
        report
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn graph(&self) -> &TransformGraph {
        &self.graph
    }

    pub fn jaw_state(&self) -> Option<JawState> {
        self.jaw
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Fit the trajectory line now, without stopping the session.
    ///
    /// Once the session is stopped the frozen fit is left untouched.
    pub fn fit_trajectory(&mut self) -> Result<LineFit, HarvestError> {
        self.metrics.finalize()
    }

    pub fn sampled_points(&self) -> &[Point3<f64>] {
        self.metrics.sampled_points()
    }

    pub fn branch_flags(&self) -> Vec<BranchFlag> {
        self.branches.cut_flags()
    }

    /// Current aggregate metrics; frozen values once the session stopped.
    pub fn report(&self, now: Instant) -> MetricsReport {
        MetricsReport {
            session_id: self.session.id,
            started_at: self.session.started_wall.unwrap_or_else(Utc::now),
            elapsed: self.session.elapsed(now),
            metrics: self.metrics.snapshot(),
            branches: self.branches.cut_flags(),
        }
    }

    /// Write the current report as flat `key,value` rows.
    pub fn export(&self, path: &Path, now: Instant) -> Result<PathBuf, HarvestError> {
        export_metrics(&self.report(now), path)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline
    // ─────────────────────────────────────────────────────────────────────────

    fn check_scene(&self) -> Result<(), HarvestError> {
        let scene = self
            .scene
            .as_ref()
            .ok_or_else(|| HarvestError::MissingNode(self.scene_config.sensor_node.clone()))?;
        let names = &self.scene_config;
        for name in [
            &names.sensor_node,
            &names.cutter_node,
            &names.tip_node,
            &names.jaw_node,
            &names.vessel_node,
            &names.retractor_node,
            &names.vessel_model_node,
        ] {
            self.graph.require(name)?;
        }
        if scene.vessel_mesh.vertices.is_empty() {
            return Err(HarvestError::MissingMesh(names.vessel_mesh.clone()));
        }
        Ok(())
    }

    fn reset_scoring(&mut self) {
        self.metrics.reset();
        self.sampler.reset();
        self.branches.reset();
    }

    /// Process queued graph events until the queue is empty. Events raised
    /// while handling an event (the jaw write) are handled in the same call.
    fn drain_events(&mut self, now: Instant, report: &mut CycleReport) {
        let Some((sensor, jaw)) = self.scene.as_ref().map(|s| (s.sensor, s.jaw)) else {
            while self.events_rx.try_recv().is_ok() {}
            return;
        };
        while let Ok(event) = self.events_rx.try_recv() {
            let observed = event.observed();
            if observed == sensor {
                self.solve(report);
            } else if observed == jaw {
                self.sample(now, report);
            }
        }
    }

    fn solve(&mut self, report: &mut CycleReport) {
        let Some(scene) = self.scene.as_ref() else {
            return;
        };
        let (sensor, jaw) = (scene.sensor, scene.jaw);
        match self.solver.solve(&mut self.graph, sensor, jaw) {
            Ok(state) => {
                self.jaw = Some(state);
                report.jaw = Some(state);
            }
            Err(e) => report.skip(Metric::Kinematics, e),
        }
    }

    fn sample(&mut self, now: Instant, report: &mut CycleReport) {
        if !self.session.running || !self.sampler.should_sample(now) {
            return;
        }
        let Some(scene) = self.scene.as_ref() else {
            report.skip(
                Metric::TipPosition,
                HarvestError::MissingNode(self.scene_config.tip_node.clone()),
            );
            return;
        };
        let tip = match self.graph.world_transform(scene.tip) {
            Ok(world) => position(&world),
            Err(e) => {
                // Nothing below can run without the tip.
                report.skip(Metric::TipPosition, e);
                return;
            }
        };
        self.metrics.record_point(tip);
        report.sampled = true;

        match self.vessel_angle(scene) {
            Ok(angle) => self.metrics.record_angle(angle),
            Err(e) => report.skip(Metric::Angle, e),
        }

        let closed = self
            .jaw
            .is_some_and(|j| j.is_closed(self.scoring.jaw_closed_threshold_deg));
        if !closed {
            return;
        }

        let tip_in_model = match self.to_model_frame(scene, &tip) {
            Ok(p) => p,
            Err(e) => {
                report.skip(Metric::Distance, e.clone());
                report.skip(Metric::Branches, e);
                return;
            }
        };
        match nearest_vertex_distance(&tip_in_model, &scene.vessel_mesh.vertices) {
            Some(d) => self.metrics.record_distance(d),
            None => report.skip(
                Metric::Distance,
                HarvestError::MissingMesh(scene.vessel_mesh.name.clone()),
            ),
        }

        if let Some(cut) =
            self.branches
                .evaluate(&tip_in_model, closed, self.scoring.branch_cut_distance)
        {
            for observer in &mut self.observers {
                observer.on_branch_cut(&cut);
            }
            report.cuts.push(cut);
        }
    }

    fn vessel_angle(&self, scene: &SceneHandles) -> Result<f64, HarvestError> {
        let vessel = self.graph.world_transform(scene.vessel)?;
        let retractor = self.graph.world_transform(scene.retractor)?;
        angle_between_deg(&z_basis(&vessel), &z_basis(&retractor))
    }

    /// Express a world point in the vessel model frame, so mesh vertices and
    /// branch centrelines never need re-transforming.
    fn to_model_frame(
        &self,
        scene: &SceneHandles,
        point: &Point3<f64>,
    ) -> Result<Point3<f64>, HarvestError> {
        let model = self.graph.world_transform(scene.vessel_model)?;
        let inverse = model.try_inverse().ok_or(HarvestError::DegenerateVector)?;
        Ok(inverse.transform_point(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{InMemoryAssets, Mesh};
    use harvest_types::NodeId;
    use nalgebra::Vector3;

    fn controller() -> SessionController {
        let mut assets = InMemoryAssets::new()
            .with_transform("CutterTipToCutter", Matrix4::identity())
            .with_transform("VesselModelToVessel", Matrix4::identity())
            .with_mesh(Mesh::new("VesselModel", vec![Point3::new(0.0, 0.0, 10.0)]));
        let mut tutor = SessionController::new(TutorConfig::default()).unwrap();
        tutor.install(&mut assets).unwrap();
        tutor
    }

    #[test]
    fn start_without_scene_fails_fast() {
        let mut tutor = SessionController::new(TutorConfig::default()).unwrap();
        assert_eq!(
            tutor.start(Instant::now()),
            Err(HarvestError::MissingNode("TriggerToCutter".to_string()))
        );
        assert!(!tutor.is_running());
    }

    #[test]
    fn install_solves_initial_jaw() {
        let tutor = controller();
        let jaw = tutor.jaw_state().unwrap();
        assert!((jaw.raw_angle_deg - 90.0).abs() < 1e-9);
        assert!(jaw.is_closed(0.5));
    }

    #[test]
    fn idle_updates_solve_but_do_not_sample() {
        let mut tutor = controller();
        let cycle = tutor.update_sensor(Matrix4::identity(), Instant::now());
        assert!(cycle.jaw.is_some());
        assert!(!cycle.sampled);
        assert_eq!(tutor.snapshot().sample_count, 0);
    }

    #[test]
    fn unknown_node_update_is_reported_not_raised() {
        let mut tutor = controller();
        let cycle = tutor.update_node("Ghost", Matrix4::identity(), Instant::now());
        assert_eq!(
            cycle.skipped,
            vec![(Metric::Kinematics, HarvestError::MissingNode("Ghost".to_string()))]
        );
    }

    #[test]
    fn degenerate_sensor_skips_kinematics_only() {
        let mut tutor = controller();
        let t0 = Instant::now();
        tutor.start(t0).unwrap();
        let cycle = tutor.update_sensor(Matrix4::zeros(), t0);
        assert!(cycle
            .skipped
            .iter()
            .any(|(m, e)| *m == Metric::Kinematics && *e == HarvestError::DegenerateVector));
        // A tracker move still samples using the last good jaw state.
        let cycle = tutor.update_node(
            "CutterToRetractor",
            Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0)),
            t0,
        );
        assert!(cycle.sampled);
    }

    #[test]
    fn trajectory_can_be_fitted_mid_session() {
        let mut tutor = controller();
        let t0 = Instant::now();
        tutor.start(t0).unwrap();
        assert!(matches!(
            tutor.fit_trajectory(),
            Err(HarvestError::InsufficientData { samples: 0 })
        ));
        for (i, x) in [0.0, 2.0].into_iter().enumerate() {
            tutor.update_node(
                "CutterToRetractor",
                Matrix4::new_translation(&Vector3::new(x, 3.0 * x, 0.0)),
                t0 + Duration::from_millis(300 * i as u64),
            );
        }
        let fit = tutor.fit_trajectory().unwrap();
        assert!((fit.slope - 3.0).abs() < 1e-9);
        assert!(tutor.is_running());
        assert!((tutor.snapshot().trajectory_slope - 3.0).abs() < 1e-9);
    }

    #[test]
    fn unresolvable_tip_does_not_count_as_a_sample() {
        let mut tutor = controller();
        let t0 = Instant::now();
        tutor.start(t0).unwrap();
        if let Some(scene) = tutor.scene.as_mut() {
            scene.tip = NodeId(999);
        }
        let cycle = tutor.tick(t0);
        assert!(!cycle.sampled);
        assert_eq!(
            cycle.skipped,
            vec![(Metric::TipPosition, HarvestError::UnknownNode(NodeId(999)))]
        );
        assert_eq!(tutor.snapshot().sample_count, 0);
    }

    #[test]
    fn install_is_refused_while_running() {
        let mut tutor = controller();
        tutor.start(Instant::now()).unwrap();
        let mut assets = InMemoryAssets::new();
        assert_eq!(
            tutor.install(&mut assets),
            Err(HarvestError::SessionRunning("reinstalling the scene".to_string()))
        );
        assert!(tutor.is_running());
    }

    #[test]
    fn stop_and_reset_are_idempotent() {
        let mut tutor = controller();
        let t0 = Instant::now();
        assert!(tutor.stop(t0).is_none());
        tutor.reset();
        tutor.reset();
        tutor.start(t0).unwrap();
        assert!(tutor.stop(t0 + Duration::from_secs(1)).is_some());
        assert!(tutor.stop(t0 + Duration::from_secs(2)).is_none());
    }
}
