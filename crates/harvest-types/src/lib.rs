use std::time::Duration;

use chrono::{DateTime, Utc};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Arena index of a node inside a `TransformGraph`.
///
/// Ids are only meaningful for the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Change notification emitted by the transform graph.
///
/// Listeners registered on a node receive one event per mutation of that node
/// or of any of its ancestors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphEvent {
    /// The local transform of `source` was replaced (or `source` was
    /// reparented). `observed` is the listener's node, which is `source`
    /// itself or one of its descendants.
    TransformModified {
        source: NodeId,
        observed: NodeId,
        /// Transform-to-parent of `observed` after the mutation.
        local: Matrix4<f64>,
        /// World pose of `observed` after the mutation.
        world: Matrix4<f64>,
    },
}

impl GraphEvent {
    /// The node whose listener this event was delivered to.
    pub fn observed(&self) -> NodeId {
        match self {
            GraphEvent::TransformModified { observed, .. } => *observed,
        }
    }

    /// The node that was mutated.
    pub fn source(&self) -> NodeId {
        match self {
            GraphEvent::TransformModified { source, .. } => *source,
        }
    }
}

/// Point-in-time view of the running metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub min_angle_deg: f64,
    pub max_angle_deg: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub trajectory_slope: f64,
    pub trajectory_intercept: f64,
    pub sample_count: usize,
}

/// Cut state of one labelled branch, as reported to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFlag {
    pub id: String,
    pub cut: bool,
}

/// Everything the UI collaborator receives when a session stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub metrics: MetricsSnapshot,
    pub branches: Vec<BranchFlag>,
}

/// Error taxonomy shared by every harvest crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HarvestError {
    #[error("Graph cycle: parenting {child} under {parent} would create a loop")]
    GraphCycle { child: NodeId, parent: NodeId },

    #[error("Unknown transform node {0}")]
    UnknownNode(NodeId),

    #[error("Degenerate vector: angle is undefined for near-zero magnitude")]
    DegenerateVector,

    #[error("Insufficient data for trajectory fit ({samples} sample(s))")]
    InsufficientData { samples: usize },

    #[error("Missing transform node '{0}'")]
    MissingNode(String),

    #[error("Missing mesh '{0}'")]
    MissingMesh(String),

    #[error("Export Error: {0}")]
    Export(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Session is running: stop it before {0}")]
    SessionRunning(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harvest_error_display() {
        let err = HarvestError::GraphCycle {
            child: NodeId(2),
            parent: NodeId(5),
        };
        let msg = err.to_string();
        assert!(msg.contains("#2"));
        assert!(msg.contains("#5"));

        let err2 = HarvestError::MissingNode("TriggerToCutter".to_string());
        assert!(err2.to_string().contains("TriggerToCutter"));
    }

    #[test]
    fn graph_event_accessors() {
        let event = GraphEvent::TransformModified {
            source: NodeId(0),
            observed: NodeId(3),
            local: Matrix4::identity(),
            world: Matrix4::identity(),
        };
        assert_eq!(event.source(), NodeId(0));
        assert_eq!(event.observed(), NodeId(3));
    }

    #[test]
    fn metrics_report_roundtrip() {
        let report = MetricsReport {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            elapsed: Duration::from_millis(1500),
            metrics: MetricsSnapshot {
                min_angle_deg: 12.0,
                max_angle_deg: 40.0,
                min_distance: 3.5,
                max_distance: 80.0,
                trajectory_slope: 0.5,
                trajectory_intercept: 1.0,
                sample_count: 7,
            },
            branches: vec![BranchFlag {
                id: "branch-1".to_string(),
                cut: true,
            }],
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: MetricsReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
    }
}
