// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph arena owning every node.
//!
//! Nodes refer to each other only through [`NodeId`]s: port slots, owner
//! back-references, children sets and container listeners all store
//! identifiers, so cyclic wiring is plain data.

use crate::event::EventKind;
use crate::node::{Node, NodeId, NodeKind};
use crate::port::PortDirection;
use indexmap::IndexMap;

/// A connection graph
#[derive(Debug)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Every live node, keyed by ID
    pub(crate) nodes: IndexMap<NodeId, Node>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
        }
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Construct a node of `kind` and add it
    pub fn add(&mut self, kind: impl NodeKind) -> NodeId {
        self.add_node(Node::new(kind))
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Whether the node exists
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes that no container owns
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .values()
            .filter(|node| node.owner.is_none())
            .map(Node::id)
    }

    pub(crate) fn require(&self, node_id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))
    }

    pub(crate) fn require_container(&self, node_id: NodeId) -> Result<&Node, GraphError> {
        let node = self.require(node_id)?;
        if node.is_container() {
            Ok(node)
        } else {
            Err(GraphError::NotAContainer(node_id))
        }
    }

    /// Change a node's description and fire a property event
    pub fn set_description(
        &mut self,
        node_id: NodeId,
        description: impl Into<String>,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        node.description = description.into();
        self.notify_property_changed(node_id, "description");
        Ok(())
    }

    /// Fire a property event on `node_id`
    pub fn notify_property_changed(&mut self, node_id: NodeId, property: &str) {
        if self.contains(node_id) {
            self.emit(
                node_id,
                EventKind::PropertyChanged {
                    property: property.to_string(),
                },
            );
        }
    }

    /// Mutate a node's concrete kind and fire a property event for
    /// `property`. Returns `None` if the node is missing or of another kind.
    pub fn modify_kind<T: NodeKind, R>(
        &mut self,
        node_id: NodeId,
        property: &str,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let kind = self.nodes.get_mut(&node_id)?.downcast_mut::<T>()?;
        let result = f(kind);
        self.notify_property_changed(node_id, property);
        Some(result)
    }

    /// Destroy a node.
    ///
    /// Listeners hear [`EventKind::Destroying`] first (an owning container
    /// releases the node at that point). A container then destroys every
    /// child it still owns. Finally the node is disconnected from all
    /// neighbours and removed from the arena.
    pub fn destroy(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        self.require(node_id)?;
        self.emit(node_id, EventKind::Destroying);
        if !self.contains(node_id) {
            return Ok(());
        }

        let children = self
            .nodes
            .get(&node_id)
            .and_then(|node| node.children.clone())
            .unwrap_or_default();
        for child in children {
            if self.claims_child(node_id, child) {
                self.destroy(child)?;
            } else {
                self.release(node_id, child);
            }
        }

        self.disconnect_all_inputs(node_id)?;
        self.disconnect_all_outputs(node_id)?;

        if let Some(owner) = self.nodes.get(&node_id).and_then(|node| node.owner) {
            self.release(owner, node_id);
        }
        self.nodes.swap_remove(&node_id);
        tracing::debug!("Destroyed node {}", node_id);
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error from a structural graph operation.
///
/// Every operation returning this error leaves the graph unchanged.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Operation needs a container
    #[error("Node {0} is not a container")]
    NotAContainer(NodeId),

    /// Index beyond a fixed port list
    #[error("{direction} index {index} out of range for node {node} ({len} slots)")]
    PortIndexOutOfRange {
        /// Node owning the list
        node: NodeId,
        /// Port list
        direction: PortDirection,
        /// Requested index
        index: usize,
        /// Current length
        len: usize,
    },

    /// Resize requested on a fixed port list
    #[error("{direction} list of node {node} has a fixed length")]
    FixedPortList {
        /// Node owning the list
        node: NodeId,
        /// Port list
        direction: PortDirection,
    },

    /// No slot is available for an automatic connection
    #[error("No free {direction} slot on node {node}")]
    NoFreeSlot {
        /// Node owning the list
        node: NodeId,
        /// Port list
        direction: PortDirection,
    },

    /// Capability check rejected the candidate
    #[error("Node {node} rejected {candidate} at {direction} {index}")]
    Rejected {
        /// Node performing the check
        node: NodeId,
        /// Port list
        direction: PortDirection,
        /// Slot index
        index: usize,
        /// Rejected neighbour
        candidate: NodeId,
    },

    /// Self-loop not allowed
    #[error("Self-loop not allowed on node {0}")]
    SelfLoop(NodeId),

    /// Neighbour already present at another index
    #[error("Node {neighbour} already connected to {direction} {index} of node {node}")]
    DuplicateConnection {
        /// Node owning the list
        node: NodeId,
        /// Port list
        direction: PortDirection,
        /// Index already holding the neighbour
        index: usize,
        /// Repeated neighbour
        neighbour: NodeId,
    },

    /// Accepting the node would make a container own its own ancestor
    #[error("Container {container} cannot own its ancestor {node}")]
    OwnershipCycle {
        /// Accepting container
        container: NodeId,
        /// Ancestor that was offered
        node: NodeId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectOptions;
    use crate::event::{EventRecorder, Listener};
    use crate::kinds::container::ConnectableContainer;
    use crate::kinds::raster::{ImageFileWriter, ImageHandler, ImageResampler};

    #[test]
    fn test_graph_creation() {
        let graph = Graph::new("Test Graph");
        assert_eq!(graph.name, "Test Graph");
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_destroy_disconnects_neighbours() {
        let mut graph = Graph::default();
        let source = graph.add(ImageHandler::default());
        let filter = graph.add(ImageResampler::default());
        let writer = graph.add(ImageFileWriter::default());
        graph.connect_input_to(filter, source, ConnectOptions::default()).unwrap();
        graph.connect_input_to(writer, filter, ConnectOptions::default()).unwrap();

        graph.destroy(filter).unwrap();

        assert!(!graph.contains(filter));
        assert!(!graph.node(source).unwrap().is_connected(PortDirection::Output));
        // Fixed input slot is cleared, not removed
        let writer_node = graph.node(writer).unwrap();
        assert_eq!(writer_node.inputs().len(), 1);
        assert_eq!(writer_node.input(0), None);
    }

    #[test]
    fn test_destroy_removes_from_owner() {
        let mut graph = Graph::default();
        let container = graph.add(ConnectableContainer::default());
        let child = graph.add(ImageHandler::default());
        graph.accept(container, child).unwrap();

        graph.destroy(child).unwrap();

        let children = graph.node(container).unwrap().children().unwrap();
        assert!(children.is_empty());
    }

    #[test]
    fn test_destroy_container_destroys_owned_children() {
        let mut graph = Graph::default();
        let outer = graph.add(ConnectableContainer::default());
        let inner = graph.add(ConnectableContainer::default());
        let leaf = graph.add(ImageHandler::default());
        graph.accept(outer, inner).unwrap();
        graph.accept(inner, leaf).unwrap();

        graph.destroy(outer).unwrap();
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_destroying_event_precedes_removal() {
        let mut graph = Graph::default();
        let node = graph.add(ImageHandler::default());
        let log = EventRecorder::new();
        graph.add_listener(node, Listener::observer(log.clone()));

        graph.destroy(node).unwrap();
        let events = log.events();
        assert_eq!(events.last().unwrap().1.kind, EventKind::Destroying);
        assert!(matches!(graph.destroy(node), Err(GraphError::NodeNotFound(_))));
    }

    #[test]
    fn test_modify_kind_fires_property_event() {
        let mut graph = Graph::default();
        let filter = graph.add(ImageResampler::default());
        let log = EventRecorder::new();
        graph.add_listener(filter, Listener::observer(log.clone()));

        let applied = graph.modify_kind::<ImageResampler, _>(filter, "scale", |k| k.scale = 0.5);
        assert!(applied.is_some());
        assert!(graph
            .modify_kind::<ImageHandler, _>(filter, "filename", |_| ())
            .is_none());
        assert_eq!(
            graph.node(filter).unwrap().downcast_ref::<ImageResampler>().unwrap().scale,
            0.5
        );
        assert_eq!(log.len(), 1);
    }
}
