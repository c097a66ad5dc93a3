//! Scene installation.
//!
//! Builds the instrument and anatomy frame chains inside a
//! [`TransformGraph`]:
//!
//! ```text
//! RetractorToReference ─┬ VesselToRetractor ── VesselModelToVessel   (vessel mesh frame)
//!                       └ CutterToRetractor ─┬ TriggerToCutter       (tracked sensor)
//!                                            └ CutterTipToCutter ── CutterMovingToCutterTip (jaw)
//! ```
//!
//! Every tracked frame hangs off the retractor, so world transforms of the
//! vessel, the tool tip and the retractor share the reference frame.
//!
//! Every frame is looked up by name first. Tracked and derived frames are
//! created as identity when absent; calibration frames are loaded from the
//! [`AssetProvider`]. Installing twice is harmless and loads nothing new.

use harvest_perception::TransformGraph;
use harvest_scoring::BranchSegment;
use harvest_types::{HarvestError, NodeId};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assets::{AssetProvider, Mesh};

/// Names of the frames and models the tutor works with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Tracked trigger, relative to the cutter body.
    pub sensor_node: String,
    /// Tracked cutter body, relative to the retractor.
    pub cutter_node: String,
    /// Calibrated cutter tip, relative to the cutter body.
    pub tip_node: String,
    /// Derived jaw, relative to the cutter tip.
    pub jaw_node: String,
    /// Tracked vessel, relative to the retractor.
    pub vessel_node: String,
    /// Retractor reference frame.
    pub retractor_node: String,
    /// Calibrated vessel model frame, relative to the vessel.
    pub vessel_model_node: String,
    /// Vessel mesh, expressed in `vessel_model_node`.
    pub vessel_mesh: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            sensor_node: "TriggerToCutter".to_string(),
            cutter_node: "CutterToRetractor".to_string(),
            tip_node: "CutterTipToCutter".to_string(),
            jaw_node: "CutterMovingToCutterTip".to_string(),
            vessel_node: "VesselToRetractor".to_string(),
            retractor_node: "RetractorToReference".to_string(),
            vessel_model_node: "VesselModelToVessel".to_string(),
            vessel_mesh: "VesselModel".to_string(),
        }
    }
}

/// Resolved node ids and the loaded target model.
#[derive(Debug, Clone)]
pub struct SceneHandles {
    pub sensor: NodeId,
    pub cutter: NodeId,
    pub tip: NodeId,
    pub jaw: NodeId,
    pub vessel: NodeId,
    pub retractor: NodeId,
    pub vessel_model: NodeId,
    pub vessel_mesh: Mesh,
    pub branches: Vec<BranchSegment>,
}

/// Create (or find) every scene frame, chain them and load the vessel model.
///
/// # Errors
///
/// [`HarvestError::MissingNode`] / [`HarvestError::MissingMesh`] when the
/// provider cannot supply a calibration frame or the vessel mesh.
pub fn install_scene(
    graph: &mut TransformGraph,
    assets: &mut dyn AssetProvider,
    scene: &SceneConfig,
) -> Result<SceneHandles, HarvestError> {
    // Transforms first: the models are attached to them.
    let cutter = get_or_create(graph, &scene.cutter_node);
    let sensor = get_or_create(graph, &scene.sensor_node);
    let tip = get_or_load(graph, assets, &scene.tip_node)?;
    let jaw = get_or_create(graph, &scene.jaw_node);
    let retractor = get_or_create(graph, &scene.retractor_node);
    let vessel = get_or_create(graph, &scene.vessel_node);
    let vessel_model = get_or_load(graph, assets, &scene.vessel_model_node)?;

    graph.set_parent(cutter, Some(retractor))?;
    graph.set_parent(vessel, Some(retractor))?;
    graph.set_parent(sensor, Some(cutter))?;
    graph.set_parent(tip, Some(cutter))?;
    graph.set_parent(jaw, Some(tip))?;
    graph.set_parent(vessel_model, Some(vessel))?;

    let vessel_mesh = assets.load_named_mesh(&scene.vessel_mesh)?;
    let branches = assets.load_branches(&scene.vessel_mesh)?;
    info!(
        mesh = %vessel_mesh.name,
        vertices = vessel_mesh.vertices.len(),
        branches = branches.len(),
        "scene installed"
    );

    Ok(SceneHandles {
        sensor,
        cutter,
        tip,
        jaw,
        vessel,
        retractor,
        vessel_model,
        vessel_mesh,
        branches,
    })
}

fn get_or_create(graph: &mut TransformGraph, name: &str) -> NodeId {
    graph
        .node_by_name(name)
        .unwrap_or_else(|| graph.add_node(name, Matrix4::identity()))
}

fn get_or_load(
    graph: &mut TransformGraph,
    assets: &mut dyn AssetProvider,
    name: &str,
) -> Result<NodeId, HarvestError> {
    if let Some(id) = graph.node_by_name(name) {
        debug!(name, "transform already loaded");
        return Ok(id);
    }
    let local = assets.load_named_transform(name)?;
    Ok(graph.add_node(name, local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::InMemoryAssets;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn assets() -> InMemoryAssets {
        InMemoryAssets::new()
            .with_transform(
                "CutterTipToCutter",
                Matrix4::new_translation(&Vector3::new(0.0, 0.0, 100.0)),
            )
            .with_transform("VesselModelToVessel", Matrix4::identity())
            .with_mesh(Mesh::new("VesselModel", vec![Point3::origin()]))
    }

    #[test]
    fn install_chains_instrument_frames() {
        let mut graph = TransformGraph::new();
        let mut assets = assets();
        let h = install_scene(&mut graph, &mut assets, &SceneConfig::default()).unwrap();

        assert_eq!(graph.parent(h.tip).unwrap(), Some(h.cutter));
        assert_eq!(graph.parent(h.jaw).unwrap(), Some(h.tip));
        assert_eq!(graph.parent(h.sensor).unwrap(), Some(h.cutter));
        assert_eq!(graph.parent(h.vessel_model).unwrap(), Some(h.vessel));
        assert_eq!(graph.parent(h.vessel).unwrap(), Some(h.retractor));
        assert_eq!(graph.parent(h.cutter).unwrap(), Some(h.retractor));
        assert_eq!(graph.parent(h.retractor).unwrap(), None);

        graph
            .set_local_transform(h.cutter, Matrix4::new_translation(&Vector3::new(5.0, 0.0, 0.0)))
            .unwrap();
        let jaw_world = graph.world_transform(h.jaw).unwrap();
        assert_relative_eq!(jaw_world[(0, 3)], 5.0);
        assert_relative_eq!(jaw_world[(2, 3)], 100.0);
    }

    #[test]
    fn retractor_pose_carries_every_tracked_frame() {
        let mut graph = TransformGraph::new();
        let mut assets = assets();
        let h = install_scene(&mut graph, &mut assets, &SceneConfig::default()).unwrap();

        graph
            .set_local_transform(
                h.retractor,
                Matrix4::new_translation(&Vector3::new(0.0, 7.0, 0.0)),
            )
            .unwrap();
        assert_relative_eq!(graph.world_transform(h.vessel).unwrap()[(1, 3)], 7.0);
        assert_relative_eq!(graph.world_transform(h.jaw).unwrap()[(1, 3)], 7.0);
    }

    #[test]
    fn install_twice_loads_nothing_new() {
        let mut graph = TransformGraph::new();
        let mut assets = assets();
        let first = install_scene(&mut graph, &mut assets, &SceneConfig::default()).unwrap();
        let nodes = graph.len();
        let loads = assets.loads();

        let second = install_scene(&mut graph, &mut assets, &SceneConfig::default()).unwrap();
        assert_eq!(graph.len(), nodes);
        assert_eq!(first.tip, second.tip);
        // Only the mesh is fetched again; transforms come from the graph.
        assert_eq!(assets.loads(), loads + 1);
    }

    #[test]
    fn missing_calibration_is_reported() {
        let mut graph = TransformGraph::new();
        let mut assets = InMemoryAssets::new();
        let err = install_scene(&mut graph, &mut assets, &SceneConfig::default()).unwrap_err();
        assert_eq!(err, HarvestError::MissingNode("CutterTipToCutter".to_string()));
    }

    #[test]
    fn missing_mesh_is_reported() {
        let mut graph = TransformGraph::new();
        let mut assets = InMemoryAssets::new()
            .with_transform("CutterTipToCutter", Matrix4::identity())
            .with_transform("VesselModelToVessel", Matrix4::identity());
        let err = install_scene(&mut graph, &mut assets, &SceneConfig::default()).unwrap_err();
        assert_eq!(err, HarvestError::MissingMesh("VesselModel".to_string()));
    }
}
