//! Transform Graph.
//!
//! Maintains an arena of named reference frames. Each frame holds a local
//! homogeneous transform (its transform-to-parent) and observes at most one
//! parent frame. The world pose of a frame is the composition of the local
//! transforms along the chain up to the root.
//!
//! Components subscribe to a node and are notified synchronously whenever the
//! node or any of its ancestors changes, so a derived joint can be added
//! anywhere in the chain without extra wiring.
//!
//! # Example
//!
//! ```rust
//! use harvest_perception::transform::TransformGraph;
//! use nalgebra::{Matrix4, Vector3};
//!
//! let mut graph = TransformGraph::new();
//!
//! // cutter is 1 unit along +X of the retractor.
//! let retractor = graph.add_node("CutterToRetractor",
//!     Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0)));
//! // the tip is 0.5 units further along the cutter.
//! let tip = graph.add_node("CutterTipToCutter",
//!     Matrix4::new_translation(&Vector3::new(0.5, 0.0, 0.0)));
//! graph.set_parent(tip, Some(retractor)).unwrap();
//!
//! let world = graph.world_transform(tip).unwrap();
//! assert!((world[(0, 3)] - 1.5).abs() < 1e-9);
//! ```

use std::collections::HashMap;
use std::sync::mpsc::Sender;

use harvest_types::{GraphEvent, HarvestError, NodeId};
use nalgebra::Matrix4;
use tracing::{debug, trace};

/// Callback invoked synchronously after a watched transform changes.
pub type Listener = Box<dyn FnMut(&GraphEvent)>;

/// Handle returned by [`TransformGraph::subscribe`]; pass it to
/// [`TransformGraph::unsubscribe`] to stop receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone)]
struct TransformNode {
    name: String,
    local: Matrix4<f64>,
    parent: Option<NodeId>,
}

struct Subscription {
    id: SubscriptionId,
    node: NodeId,
    listener: Listener,
}

// ────────────────────────────────────────────────────────────────────────────
// TransformGraph
// ────────────────────────────────────────────────────────────────────────────

/// Directed acyclic graph of named transform nodes.
///
/// Frames are identified by unique names (e.g. `"TriggerToCutter"`,
/// `"CutterTipToCutter"`) and addressed by the [`NodeId`] handed out when
/// they are added. World transforms are always computed from the current
/// chain, never cached.
#[derive(Default)]
pub struct TransformGraph {
    nodes: Vec<TransformNode>,
    by_name: HashMap<String, NodeId>,
    subscriptions: Vec<Subscription>,
    next_subscription: u64,
}

impl std::fmt::Debug for TransformGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformGraph")
            .field("nodes", &self.nodes)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl TransformGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a root node named `name` with the given local transform.
    ///
    /// If a node with that name already exists its id is returned and the
    /// node is left untouched, so repeated scene loads never duplicate frames.
    pub fn add_node(&mut self, name: &str, local: Matrix4<f64>) -> NodeId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(TransformNode {
            name: name.to_string(),
            local,
            parent: None,
        });
        self.by_name.insert(name.to_string(), id);
        debug!(node = %id, name, "transform node added");
        id
    }

    /// Look up a node by name.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Like [`node_by_name`][Self::node_by_name] but fails with
    /// [`HarvestError::MissingNode`] when the node is absent.
    pub fn require(&self, name: &str) -> Result<NodeId, HarvestError> {
        self.node_by_name(name)
            .ok_or_else(|| HarvestError::MissingNode(name.to_string()))
    }

    pub fn name(&self, id: NodeId) -> Result<&str, HarvestError> {
        Ok(&self.node(id)?.name)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, HarvestError> {
        Ok(self.node(id)?.parent)
    }

    pub fn local_transform(&self, id: NodeId) -> Result<Matrix4<f64>, HarvestError> {
        Ok(self.node(id)?.local)
    }

    /// Replace the local transform of `id` and notify every listener on `id`
    /// or on one of its descendants.
    pub fn set_local_transform(
        &mut self,
        id: NodeId,
        local: Matrix4<f64>,
    ) -> Result<(), HarvestError> {
        self.node_mut(id)?.local = local;
        self.notify(id);
        Ok(())
    }

    /// Make `child` observe `parent` (`None` detaches it to the world root).
    ///
    /// Returns [`HarvestError::GraphCycle`] and leaves the graph unchanged
    /// when `parent` is `child` itself or one of its descendants.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), HarvestError> {
        self.node(child)?;
        if let Some(p) = parent {
            self.node(p)?;
            if p == child || self.is_ancestor(child, p) {
                return Err(HarvestError::GraphCycle { child, parent: p });
            }
        }
        if self.nodes[child.0].parent == parent {
            return Ok(());
        }
        self.nodes[child.0].parent = parent;
        debug!(child = %child, parent = ?parent, "transform node reparented");
        self.notify(child);
        Ok(())
    }

    /// Compose local transforms from `id` up to the root.
    ///
    /// A node without a parent returns its own local transform.
    pub fn world_transform(&self, id: NodeId) -> Result<Matrix4<f64>, HarvestError> {
        let node = self.node(id)?;
        let mut world = node.local;
        let mut current = node.parent;
        while let Some(p) = current {
            let parent = &self.nodes[p.0];
            world = parent.local * world;
            current = parent.parent;
        }
        Ok(world)
    }

    /// `true` when `ancestor` lies strictly above `id` in its chain.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.nodes.get(id.0).and_then(|n| n.parent);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.nodes[p.0].parent;
        }
        false
    }

    /// All nodes that have `id` somewhere in their parent chain.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, HarvestError> {
        self.node(id)?;
        Ok((0..self.nodes.len())
            .map(NodeId)
            .filter(|n| self.is_ancestor(id, *n))
            .collect())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ────────────────────────────────────────────────────────────────────────

    /// Register `listener` to be called after `node` or any ancestor of
    /// `node` changes.
    pub fn subscribe(
        &mut self,
        node: NodeId,
        listener: impl FnMut(&GraphEvent) + 'static,
    ) -> Result<SubscriptionId, HarvestError> {
        self.node(node)?;
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.push(Subscription {
            id,
            node,
            listener: Box::new(listener),
        });
        Ok(id)
    }

    /// Forward every event for `node` into `sender`.
    ///
    /// The owner drains the matching receiver once the mutating call has
    /// returned, which lets it react to events with full access to the graph.
    pub fn subscribe_channel(
        &mut self,
        node: NodeId,
        sender: Sender<GraphEvent>,
    ) -> Result<SubscriptionId, HarvestError> {
        self.subscribe(node, move |event| {
            if sender.send(event.clone()).is_err() {
                trace!(node = %event.observed(), "graph event receiver dropped");
            }
        })
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ────────────────────────────────────────────────────────────────────────

    fn node(&self, id: NodeId) -> Result<&TransformNode, HarvestError> {
        self.nodes.get(id.0).ok_or(HarvestError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut TransformNode, HarvestError> {
        self.nodes.get_mut(id.0).ok_or(HarvestError::UnknownNode(id))
    }

    fn notify(&mut self, source: NodeId) {
        // Build every event against the post-mutation graph before any
        // listener runs.
        let mut pending = Vec::new();
        for (index, sub) in self.subscriptions.iter().enumerate() {
            if sub.node != source && !self.is_ancestor(source, sub.node) {
                continue;
            }
            let node = &self.nodes[sub.node.0];
            let world = match self.world_transform(sub.node) {
                Ok(w) => w,
                Err(_) => continue,
            };
            pending.push((
                index,
                GraphEvent::TransformModified {
                    source,
                    observed: sub.node,
                    local: node.local,
                    world,
                },
            ));
        }
        for (index, event) in pending {
            (self.subscriptions[index].listener)(&event);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
