// SPDX-License-Identifier: MIT OR Apache-2.0
//! Composite management for container nodes.
//!
//! A container owns a keyed set of children. Ownership is exclusive: a node
//! accepted by a second container is released from the first. Lookups are
//! visitor traversals rather than hand-written recursion.

use crate::event::{EventKind, Listener};
use crate::graph::{Graph, GraphError};
use crate::node::{NodeClass, NodeId, NodeKind};
use crate::visitor::{Accumulate, Directions, MatchRule, Visitor};

impl Graph {
    /// Make `container` the owner of `node`.
    ///
    /// Succeeds without changes when `node` is already reachable from the
    /// container through its children or inputs (the container itself
    /// included). Otherwise the node is released from its previous owner,
    /// inserted into `children`, and the container's child listener is
    /// registered on it.
    pub fn accept(&mut self, container: NodeId, node: NodeId) -> Result<(), GraphError> {
        self.require_container(container)?;
        self.require(node)?;

        let mut visitor = Visitor::new(
            MatchRule::Id(node),
            Directions::CHILDREN | Directions::INPUTS,
            Accumulate::First,
        );
        visitor.visit(self, container);
        if visitor.first().is_some() {
            return Ok(());
        }
        if self.is_ancestor(node, container) {
            return Err(GraphError::OwnershipCycle { container, node });
        }

        if let Some(previous) = self.nodes.get(&node).and_then(|child| child.owner) {
            self.release(previous, node);
        }
        if let Some(child) = self.nodes.get_mut(&node) {
            child.owner = Some(container);
        }
        if let Some(children) = self.nodes.get_mut(&container).and_then(|c| c.children.as_mut()) {
            children.insert(node);
        }
        self.add_listener(node, Listener::Container(container));
        tracing::debug!("Container {} accepted {}", container, node);
        self.emit(container, EventKind::ChildAdded { child: node });
        Ok(())
    }

    /// Remove `node` from `container`'s children.
    ///
    /// Clears the node's owner if it is this container and unregisters the
    /// child listener. Returns whether anything was removed.
    pub fn release(&mut self, container: NodeId, node: NodeId) -> bool {
        let removed = self
            .nodes
            .get_mut(&container)
            .and_then(|parent| parent.children.as_mut())
            .is_some_and(|children| children.shift_remove(&node));
        if !removed {
            return false;
        }
        if let Some(child) = self.nodes.get_mut(&node) {
            if child.owner == Some(container) {
                child.owner = None;
            }
        }
        self.remove_listener(node, &Listener::Container(container));
        tracing::debug!("Container {} released {}", container, node);
        self.emit(container, EventKind::ChildRemoved { child: node });
        true
    }

    /// Whether `candidate` owns `node` directly or through nesting
    pub fn is_ancestor(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(&node).and_then(|n| n.owner);
        while let Some(owner) = current {
            if owner == candidate {
                return true;
            }
            current = self.nodes.get(&owner).and_then(|n| n.owner);
        }
        false
    }

    /// Direct children of `container`, empty for other nodes
    pub fn children(&self, container: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&container)
            .and_then(|node| node.children.as_ref())
            .map(|children| children.iter().copied().collect())
            .unwrap_or_default()
    }

    fn child_visitor<'a>(rule: MatchRule<'a>, accumulate: Accumulate, recurse: bool) -> Visitor<'a> {
        Visitor::new(rule, Directions::CHILDREN, accumulate)
            .excluding_start()
            .with_max_depth((!recurse).then_some(1))
    }

    /// First descendant of `container` matching `rule`. Without `recurse`
    /// only direct children are considered.
    pub fn find(&self, container: NodeId, rule: MatchRule<'_>, recurse: bool) -> Option<NodeId> {
        let mut visitor = Self::child_visitor(rule, Accumulate::First, recurse);
        visitor.visit(self, container);
        visitor.first()
    }

    /// Every descendant of `container` matching `rule`
    pub fn find_all(&self, container: NodeId, rule: MatchRule<'_>, recurse: bool) -> Vec<NodeId> {
        let mut visitor = Self::child_visitor(rule, Accumulate::All, recurse);
        visitor.visit(self, container);
        visitor.into_matches()
    }

    /// Descendant with the given ID
    pub fn find_by_id(&self, container: NodeId, id: NodeId, recurse: bool) -> Option<NodeId> {
        self.find(container, MatchRule::Id(id), recurse)
    }

    /// First descendant whose class derives from `class`
    pub fn find_of_class(&self, container: NodeId, class: NodeClass, recurse: bool) -> Option<NodeId> {
        self.find(container, MatchRule::DerivedFrom(class), recurse)
    }

    /// Every descendant whose kind is `T`
    pub fn find_all_of_kind<T: NodeKind>(&self, container: NodeId, recurse: bool) -> Vec<NodeId> {
        self.find_all(container, MatchRule::kind::<T>(), recurse)
    }

    /// Number of children, counting nested descendants when `recurse`
    pub fn child_count(&self, container: NodeId, recurse: bool) -> usize {
        self.find_all(container, MatchRule::Any, recurse).len()
    }

    /// Give `container` and its children fresh identifiers.
    ///
    /// With `recursive`, nested containers regenerate their own subtrees.
    /// Every port, owner, children and listener reference is rewritten.
    /// Returns the container's new identifier.
    pub fn regenerate_identifiers(&mut self, container: NodeId, recursive: bool) -> Result<NodeId, GraphError> {
        self.require_container(container)?;
        let renamed = self.reassign_id(container)?;
        for child in self.children(renamed) {
            let nested = self.nodes.get(&child).is_some_and(|node| node.is_container());
            if recursive && nested {
                self.regenerate_identifiers(child, true)?;
            } else {
                self.reassign_id(child)?;
            }
        }
        Ok(renamed)
    }

    fn reassign_id(&mut self, old: NodeId) -> Result<NodeId, GraphError> {
        let mut node = self.nodes.swap_remove(&old).ok_or(GraphError::NodeNotFound(old))?;
        let new = NodeId::new();
        node.id = new;

        for neighbour in node.inputs.neighbours() {
            if let Some(other) = self.nodes.get_mut(&neighbour) {
                other.outputs.replace_id(old, new);
            }
        }
        for neighbour in node.outputs.neighbours() {
            if let Some(other) = self.nodes.get_mut(&neighbour) {
                other.inputs.replace_id(old, new);
            }
        }
        if let Some(owner) = node.owner {
            if let Some(children) = self.nodes.get_mut(&owner).and_then(|p| p.children.as_mut()) {
                if let Some(position) = children.get_index_of(&old) {
                    children.shift_remove_index(position);
                    children.shift_insert(position, new);
                }
            }
        }
        if let Some(children) = &node.children {
            for child in children {
                if let Some(child) = self.nodes.get_mut(child) {
                    if child.owner == Some(old) {
                        child.owner = Some(new);
                    }
                    for listener in child.listeners.iter_mut() {
                        if *listener == Listener::Container(old) {
                            *listener = Listener::Container(new);
                        }
                    }
                }
            }
        }

        self.nodes.insert(new, node);
        tracing::debug!("Node {} renamed to {}", old, new);
        Ok(new)
    }

    /// Disconnect every input and output of `node`, and of every descendant
    /// when `node` is a container
    pub fn disconnect_all(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.require(node)?;
        let mut targets = vec![node];
        targets.extend(self.find_all(node, MatchRule::Any, true));
        for target in targets {
            self.disconnect_all_inputs(target)?;
            self.disconnect_all_outputs(target)?;
        }
        Ok(())
    }

    /// Move every child of `source` into `target`.
    ///
    /// Only references move; no node is copied or destroyed. Returns the
    /// number of children transferred. Fails without moving anything when
    /// `target` sits inside one of the children.
    pub fn fill_into(&mut self, source: NodeId, target: NodeId) -> Result<usize, GraphError> {
        self.require_container(source)?;
        self.require_container(target)?;
        if source == target {
            return Ok(0);
        }
        let children = self.children(source);
        if let Some(&child) = children
            .iter()
            .find(|&&child| child != target && self.is_ancestor(child, target))
        {
            return Err(GraphError::OwnershipCycle {
                container: target,
                node: child,
            });
        }
        let mut moved = 0;
        for child in children {
            if child == target {
                continue;
            }
            self.accept(target, child)?;
            if self.claims_child(target, child) {
                moved += 1;
            }
        }
        Ok(moved)
    }

    /// Destroy every child of `container`
    pub fn destroy_children(&mut self, container: NodeId) -> Result<(), GraphError> {
        self.require_container(container)?;
        for child in self.children(container) {
            if self.contains(child) {
                self.destroy(child)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectOptions;
    use crate::event::{EventRecorder, GraphEvent};
    use crate::kinds::container::{ConnectableContainer, ImageChain};
    use crate::kinds::raster::{ImageFileWriter, ImageHandler, ImageResampler};

    #[test]
    fn test_accept_is_idempotent() {
        let mut graph = Graph::default();
        let container = graph.add(ConnectableContainer::default());
        let node = graph.add(ImageHandler::default());

        graph.accept(container, node).unwrap();
        graph.accept(container, node).unwrap();

        assert_eq!(graph.children(container), vec![node]);
        assert_eq!(graph.node(node).unwrap().owner(), Some(container));
        assert_eq!(graph.node(node).unwrap().listeners().len(), 1);
    }

    #[test]
    fn test_owner_exclusivity() {
        let mut graph = Graph::default();
        let first = graph.add(ConnectableContainer::default());
        let second = graph.add(ConnectableContainer::default());
        let node = graph.add(ImageHandler::default());

        graph.accept(first, node).unwrap();
        graph.accept(second, node).unwrap();

        assert_eq!(graph.node(node).unwrap().owner(), Some(second));
        assert!(graph.children(first).is_empty());
        assert_eq!(graph.children(second), vec![node]);
        assert_eq!(
            graph.node(node).unwrap().listeners(),
            &[Listener::Container(second)]
        );
    }

    #[test]
    fn test_accept_rejects_ancestor() {
        let mut graph = Graph::default();
        let outer = graph.add(ConnectableContainer::default());
        let inner = graph.add(ConnectableContainer::default());
        graph.accept(outer, inner).unwrap();

        assert!(matches!(
            graph.accept(inner, outer),
            Err(GraphError::OwnershipCycle { .. })
        ));
        // Accepting itself is a no-op
        graph.accept(inner, inner).unwrap();
        assert!(graph.children(inner).is_empty());
    }

    #[test]
    fn test_accept_requires_container() {
        let mut graph = Graph::default();
        let handler = graph.add(ImageHandler::default());
        let other = graph.add(ImageHandler::default());
        assert!(matches!(
            graph.accept(handler, other),
            Err(GraphError::NotAContainer(_))
        ));
    }

    #[test]
    fn test_release() {
        let mut graph = Graph::default();
        let container = graph.add(ConnectableContainer::default());
        let node = graph.add(ImageHandler::default());
        graph.accept(container, node).unwrap();

        assert!(graph.release(container, node));
        assert!(!graph.release(container, node));
        assert_eq!(graph.node(node).unwrap().owner(), None);
        assert!(graph.node(node).unwrap().listeners().is_empty());
    }

    #[test]
    fn test_find_respects_recursion() {
        let mut graph = Graph::default();
        let root = graph.add(ConnectableContainer::default());
        let nested = graph.add(ImageChain::default());
        let deep = graph.add(ImageHandler::default());
        let shallow = graph.add(ImageFileWriter::default());
        graph.accept(root, nested).unwrap();
        graph.accept(root, shallow).unwrap();
        graph.accept(nested, deep).unwrap();

        assert_eq!(graph.find_by_id(root, deep, false), None);
        assert_eq!(graph.find_by_id(root, deep, true), Some(deep));
        assert_eq!(graph.find_by_id(root, root, true), None);
        assert_eq!(graph.find_of_class(root, NodeClass::ImageSource, false), Some(nested));
        assert_eq!(graph.find_all_of_kind::<ImageHandler>(root, true), vec![deep]);
        assert_eq!(graph.child_count(root, false), 2);
        assert_eq!(graph.child_count(root, true), 3);
    }

    #[test]
    fn test_child_destruction_is_observed() {
        let mut graph = Graph::default();
        let container = graph.add(ConnectableContainer::default());
        let node = graph.add(ImageHandler::default());
        graph.accept(container, node).unwrap();
        let log = EventRecorder::new();
        graph.add_listener(container, Listener::observer(log.clone()));

        graph.destroy(node).unwrap();
        assert!(graph.children(container).is_empty());
        assert!(log
            .events()
            .iter()
            .any(|(_, event)| event.kind == EventKind::ChildRemoved { child: node }));
    }

    #[test]
    fn test_child_property_changes_reach_outputs() {
        let mut graph = Graph::default();
        let container = graph.add(ConnectableContainer::default());
        let source = graph.add(ImageHandler::default());
        let filter = graph.add(ImageResampler::default());
        graph.accept(container, source).unwrap();
        graph.connect_input_to(filter, source, ConnectOptions::default()).unwrap();
        let log = EventRecorder::new();
        graph.add_listener(filter, Listener::observer(log.clone()));

        graph.set_description(source, "Landsat scene").unwrap();
        let events = log.events();
        assert_eq!(events.len(), 1);
        let (receiver, event): &(NodeId, GraphEvent) = &events[0];
        assert_eq!(*receiver, filter);
        assert_eq!(event.origin, source);
        assert!(event.propagated);
    }

    #[test]
    fn test_regenerate_identifiers() {
        let mut graph = Graph::default();
        let root = graph.add(ConnectableContainer::default());
        let nested = graph.add(ConnectableContainer::default());
        let source = graph.add(ImageHandler::default());
        let filter = graph.add(ImageResampler::default());
        graph.accept(root, nested).unwrap();
        graph.accept(nested, source).unwrap();
        graph.accept(root, filter).unwrap();
        graph.connect_input_to(filter, source, ConnectOptions::default()).unwrap();

        let new_root = graph.regenerate_identifiers(root, true).unwrap();
        assert_ne!(new_root, root);
        for old in [root, nested, source, filter] {
            assert!(!graph.contains(old));
        }
        assert_eq!(graph.node_count(), 4);

        let children = graph.children(new_root);
        assert_eq!(children.len(), 2);
        let new_nested = children[0];
        let new_filter = children[1];
        let new_source = graph.children(new_nested)[0];
        assert_eq!(graph.node(new_nested).unwrap().owner(), Some(new_root));
        assert_eq!(graph.node(new_source).unwrap().owner(), Some(new_nested));
        assert_eq!(graph.node(new_filter).unwrap().input(0), Some(new_source));
        assert_eq!(graph.find_output_index(new_source, new_filter), Some(0));
        assert_eq!(
            graph.node(new_source).unwrap().listeners(),
            &[Listener::Container(new_nested)]
        );
    }

    #[test]
    fn test_regenerate_without_recursion_keeps_grandchildren() {
        let mut graph = Graph::default();
        let root = graph.add(ConnectableContainer::default());
        let nested = graph.add(ConnectableContainer::default());
        let leaf = graph.add(ImageHandler::default());
        graph.accept(root, nested).unwrap();
        graph.accept(nested, leaf).unwrap();

        let new_root = graph.regenerate_identifiers(root, false).unwrap();
        let new_nested = graph.children(new_root)[0];
        assert_ne!(new_nested, nested);
        assert_eq!(graph.children(new_nested), vec![leaf]);
        assert_eq!(graph.node(leaf).unwrap().owner(), Some(new_nested));
    }

    #[test]
    fn test_fill_into_moves_references() {
        let mut graph = Graph::default();
        let source = graph.add(ConnectableContainer::default());
        let target = graph.add(ConnectableContainer::default());
        let a = graph.add(ImageHandler::default());
        let b = graph.add(ImageResampler::default());
        graph.accept(source, a).unwrap();
        graph.accept(source, b).unwrap();
        graph.connect_input_to(b, a, ConnectOptions::default()).unwrap();

        assert_eq!(graph.fill_into(source, target).unwrap(), 2);
        assert!(graph.children(source).is_empty());
        assert_eq!(graph.children(target), vec![a, b]);
        // Wiring survives the move
        assert_eq!(graph.node(b).unwrap().input(0), Some(a));

        graph.destroy(source).unwrap();
        assert!(graph.contains(a) && graph.contains(b));
    }

    #[test]
    fn test_fill_into_nested_target_moves_nothing() {
        let mut graph = Graph::default();
        let source = graph.add(ConnectableContainer::default());
        let a = graph.add(ImageHandler::default());
        let x = graph.add(ConnectableContainer::default());
        let target = graph.add(ConnectableContainer::default());
        graph.accept(source, a).unwrap();
        graph.accept(source, x).unwrap();
        graph.accept(x, target).unwrap();

        assert!(matches!(
            graph.fill_into(source, target),
            Err(GraphError::OwnershipCycle { node, .. }) if node == x
        ));
        assert_eq!(graph.children(source), vec![a, x]);
        assert_eq!(graph.node(a).unwrap().owner(), Some(source));
        assert!(graph.children(target).is_empty());
    }

    #[test]
    fn test_disconnect_all_descends() {
        let mut graph = Graph::default();
        let root = graph.add(ConnectableContainer::default());
        let a = graph.add(ImageHandler::default());
        let b = graph.add(ImageResampler::default());
        graph.accept(root, a).unwrap();
        graph.accept(root, b).unwrap();
        graph.connect_input_to(b, a, ConnectOptions::default()).unwrap();

        graph.disconnect_all(root).unwrap();
        assert_eq!(graph.node(b).unwrap().input(0), None);
        assert_eq!(graph.node(a).unwrap().outputs().connected_count(), 0);
        assert_eq!(graph.child_count(root, false), 2);
    }

    #[test]
    fn test_destroy_children() {
        let mut graph = Graph::default();
        let root = graph.add(ConnectableContainer::default());
        for _ in 0..3 {
            let child = graph.add(ImageHandler::default());
            graph.accept(root, child).unwrap();
        }
        graph.destroy_children(root).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert!(graph.children(root).is_empty());
    }
}
