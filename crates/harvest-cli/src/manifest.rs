//! Scene manifest – a TOML description of transforms, meshes and branches.
//!
//! ```toml
//! [[transform]]
//! name = "CutterTipToCutter"
//! translation = [0.0, 0.0, 100.0]
//! rotation_deg = [0.0, 0.0, 0.0]        # optional, roll/pitch/yaw
//!
//! [[transform]]
//! name = "VesselModelToVessel"
//! matrix = [1.0, 0.0, 0.0, 0.0,          # row-major 4×4, overrides the above
//!           0.0, 1.0, 0.0, 0.0,
//!           0.0, 0.0, 1.0, 0.0,
//!           0.0, 0.0, 0.0, 1.0]
//!
//! [[mesh]]
//! name = "VesselModel"
//! vertices = [[0.0, 0.0, 10.0], [0.0, 0.0, 40.0]]
//!
//! [[branch]]
//! mesh = "VesselModel"
//! id = "b1"
//! start = [10.0, 0.0, 20.0]
//! polyline = [[10.0, 0.0, 20.0], [25.0, 0.0, 20.0]]
//! ```

use std::fs;
use std::path::Path;

use harvest_runtime::{InMemoryAssets, Mesh};
use harvest_scoring::BranchSegment;
use harvest_types::HarvestError;
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub transform: Vec<TransformEntry>,
    #[serde(default)]
    pub mesh: Vec<MeshEntry>,
    #[serde(default)]
    pub branch: Vec<BranchEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformEntry {
    pub name: String,
    #[serde(default)]
    pub matrix: Option<Vec<f64>>,
    #[serde(default)]
    pub translation: Option<[f64; 3]>,
    #[serde(default)]
    pub rotation_deg: Option<[f64; 3]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeshEntry {
    pub name: String,
    pub vertices: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchEntry {
    pub mesh: String,
    pub id: String,
    pub start: [f64; 3],
    pub polyline: Vec<[f64; 3]>,
}

impl TransformEntry {
    /// Local transform described by this entry.
    pub fn to_matrix(&self) -> Result<Matrix4<f64>, HarvestError> {
        if let Some(values) = &self.matrix {
            if values.len() != 16 || values.iter().any(|v| !v.is_finite()) {
                return Err(HarvestError::Config(format!(
                    "transform '{}': matrix needs 16 finite values, got {}",
                    self.name,
                    values.len()
                )));
            }
            return Ok(Matrix4::from_row_slice(values));
        }
        let rotation = self
            .rotation_deg
            .map(|[r, p, y]| {
                Rotation3::from_euler_angles(r.to_radians(), p.to_radians(), y.to_radians())
                    .to_homogeneous()
            })
            .unwrap_or_else(Matrix4::identity);
        let translation = self
            .translation
            .map(|t| Matrix4::new_translation(&Vector3::from(t)))
            .unwrap_or_else(Matrix4::identity);
        Ok(translation * rotation)
    }
}

impl Manifest {
    pub fn parse(raw: &str) -> Result<Self, HarvestError> {
        toml::from_str(raw)
            .map_err(|e| HarvestError::Config(format!("failed to parse scene manifest: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            HarvestError::Config(format!("failed to read scene at {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    /// Build an asset store holding every entry of the manifest.
    pub fn into_assets(self) -> Result<InMemoryAssets, HarvestError> {
        let mut assets = InMemoryAssets::new();
        for entry in &self.transform {
            assets.insert_transform(&entry.name, entry.to_matrix()?);
        }
        for entry in self.mesh {
            assets.insert_mesh(Mesh::new(
                entry.name,
                entry.vertices.into_iter().map(Point3::from).collect(),
            ));
        }

        let mut by_mesh: Vec<(String, Vec<BranchSegment>)> = Vec::new();
        for entry in self.branch {
            let segment = BranchSegment::new(
                entry.id,
                Point3::from(entry.start),
                entry.polyline.into_iter().map(Point3::from).collect(),
            );
            match by_mesh.iter_mut().find(|(mesh, _)| *mesh == entry.mesh) {
                Some((_, list)) => list.push(segment),
                None => by_mesh.push((entry.mesh, vec![segment])),
            }
        }
        for (mesh, branches) in by_mesh {
            assets.insert_branches(&mesh, branches);
        }
        Ok(assets)
    }
}
