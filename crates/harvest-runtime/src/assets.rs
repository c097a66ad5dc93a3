//! Asset collaborator.
//!
//! File formats are not this crate's concern. An [`AssetProvider`] hands out
//! named transforms, mesh vertex sets and branch sets; callers look names up
//! in the transform graph first so nothing is loaded twice.

use std::collections::HashMap;

use harvest_scoring::BranchSegment;
use harvest_types::HarvestError;
use nalgebra::{Matrix4, Point3};

/// Vertex set of a target model, in the model's own frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Point3<f64>>,
}

impl Mesh {
    pub fn new(name: impl Into<String>, vertices: Vec<Point3<f64>>) -> Self {
        Self {
            name: name.into(),
            vertices,
        }
    }
}

/// Source of named scene assets.
pub trait AssetProvider {
    /// Load the transform-to-parent stored under `name`.
    ///
    /// Returns [`HarvestError::MissingNode`] when no such transform exists.
    fn load_named_transform(&mut self, name: &str) -> Result<Matrix4<f64>, HarvestError>;

    /// Load the mesh stored under `name`.
    ///
    /// Returns [`HarvestError::MissingMesh`] when no such mesh exists.
    fn load_named_mesh(&mut self, name: &str) -> Result<Mesh, HarvestError>;

    /// Branch segments of the model `mesh_name`, in the mesh frame.
    ///
    /// Models without labelled branches return an empty list.
    fn load_branches(&mut self, mesh_name: &str) -> Result<Vec<BranchSegment>, HarvestError> {
        let _ = mesh_name;
        Ok(Vec::new())
    }
}

/// Asset store backed by maps, filled by the caller.
///
/// Counts every load so callers can check that lookups stay idempotent.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssets {
    transforms: HashMap<String, Matrix4<f64>>,
    meshes: HashMap<String, Mesh>,
    branches: HashMap<String, Vec<BranchSegment>>,
    loads: usize,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_transform(&mut self, name: &str, local: Matrix4<f64>) {
        self.transforms.insert(name.to_string(), local);
    }

    pub fn insert_mesh(&mut self, mesh: Mesh) {
        self.meshes.insert(mesh.name.clone(), mesh);
    }

    pub fn insert_branches(&mut self, mesh_name: &str, branches: Vec<BranchSegment>) {
        self.branches.insert(mesh_name.to_string(), branches);
    }

    pub fn with_transform(mut self, name: &str, local: Matrix4<f64>) -> Self {
        self.insert_transform(name, local);
        self
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.insert_mesh(mesh);
        self
    }

    pub fn with_branches(mut self, mesh_name: &str, branches: Vec<BranchSegment>) -> Self {
        self.insert_branches(mesh_name, branches);
        self
    }

    /// Number of successful transform and mesh loads so far.
    pub fn loads(&self) -> usize {
        self.loads
    }
}

impl AssetProvider for InMemoryAssets {
    fn load_named_transform(&mut self, name: &str) -> Result<Matrix4<f64>, HarvestError> {
        let local = *self
            .transforms
            .get(name)
            .ok_or_else(|| HarvestError::MissingNode(name.to_string()))?;
        self.loads += 1;
        Ok(local)
    }

    fn load_named_mesh(&mut self, name: &str) -> Result<Mesh, HarvestError> {
        let mesh = self
            .meshes
            .get(name)
            .cloned()
            .ok_or_else(|| HarvestError::MissingMesh(name.to_string()))?;
        self.loads += 1;
        Ok(mesh)
    }

    fn load_branches(&mut self, mesh_name: &str) -> Result<Vec<BranchSegment>, HarvestError> {
        Ok(self.branches.get(mesh_name).cloned().unwrap_or_default())
    }
}
