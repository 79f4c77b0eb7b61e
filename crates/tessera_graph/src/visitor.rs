// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visitor traversal over containers and wiring.
//!
//! A [`Visitor`] is a single-use traversal carrying direction flags, a
//! visited set, a stop flag, a match rule and an accumulation strategy. It
//! is either active or stopped; once stopped it never resumes.
//!
//! Visiting a container handles its children first with the input/output
//! flags switched off, then its own wiring with the flags restored. Without
//! the switch a subtree search would chase every child's neighbours and end
//! up walking the whole graph.

use crate::event::{EventKind, GraphEvent};
use crate::graph::Graph;
use crate::node::{Node, NodeClass, NodeId, NodeKind};
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of traversal directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Directions(u8);

impl Directions {
    /// Visit nothing beyond the start node
    pub const NONE: Self = Self(0);
    /// Descend into container children
    pub const CHILDREN: Self = Self(1);
    /// Follow input connections
    pub const INPUTS: Self = Self(1 << 1);
    /// Follow output connections
    pub const OUTPUTS: Self = Self(1 << 2);
    /// Every direction
    pub const ALL: Self = Self(0b111);

    /// Whether every flag in `other` is set
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Copy with the flags in `other` cleared
    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for Directions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Directions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Which nodes count as a match
pub enum MatchRule<'a> {
    /// Every node
    Any,
    /// The node with this ID
    Id(NodeId),
    /// Nodes whose class is exactly this one
    Class(NodeClass),
    /// Nodes whose class is this one or derives from it
    DerivedFrom(NodeClass),
    /// Nodes whose kind is this concrete Rust type
    Kind(TypeId),
    /// Nodes satisfying a caller supplied condition
    Predicate(Box<dyn Fn(&Node) -> bool + 'a>),
}

impl<'a> MatchRule<'a> {
    /// Match nodes whose kind is `T`
    pub fn kind<T: NodeKind>() -> Self {
        Self::Kind(TypeId::of::<T>())
    }

    /// Match nodes satisfying `condition`
    pub fn predicate(condition: impl Fn(&Node) -> bool + 'a) -> Self {
        Self::Predicate(Box::new(condition))
    }

    /// Whether `node` matches
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Self::Any => true,
            Self::Id(id) => node.id() == *id,
            Self::Class(class) => node.class() == *class,
            Self::DerivedFrom(class) => node.class().is_a(*class),
            Self::Kind(type_id) => Any::type_id(node.kind().as_any()) == *type_id,
            Self::Predicate(condition) => condition(node),
        }
    }
}

impl fmt::Debug for MatchRule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Self::Class(class) => f.debug_tuple("Class").field(class).finish(),
            Self::DerivedFrom(class) => f.debug_tuple("DerivedFrom").field(class).finish(),
            Self::Kind(type_id) => f.debug_tuple("Kind").field(type_id).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// How matches accumulate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulate {
    /// Stop at the first match
    First,
    /// Collect every match in visiting order
    All,
}

/// Single-use graph traversal
#[derive(Debug)]
pub struct Visitor<'a> {
    rule: MatchRule<'a>,
    directions: Directions,
    accumulate: Accumulate,
    visited: HashSet<NodeId>,
    matches: Vec<NodeId>,
    stopped: bool,
    max_depth: Option<usize>,
    match_start: bool,
    start: NodeId,
}

impl<'a> Visitor<'a> {
    /// Create a new visitor
    pub fn new(rule: MatchRule<'a>, directions: Directions, accumulate: Accumulate) -> Self {
        Self {
            rule,
            directions,
            accumulate,
            visited: HashSet::new(),
            matches: Vec::new(),
            stopped: false,
            max_depth: None,
            match_start: true,
            start: NodeId::INVALID,
        }
    }

    /// Limit how many container levels below the start are entered.
    /// `Some(1)` visits direct children only.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Never report the start node itself as a match
    pub fn excluding_start(mut self) -> Self {
        self.match_start = false;
        self
    }

    /// Current direction flags
    pub fn directions(&self) -> Directions {
        self.directions
    }

    /// Replace the direction flags
    pub fn set_directions(&mut self, directions: Directions) {
        self.directions = directions;
    }

    /// Enter the terminal stopped state
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Whether the traversal has stopped
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether `id` was already processed
    pub fn has_visited(&self, id: NodeId) -> bool {
        self.visited.contains(&id)
    }

    /// Number of processed nodes
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// First match, if any
    pub fn first(&self) -> Option<NodeId> {
        self.matches.first().copied()
    }

    /// Every match in visiting order
    pub fn matches(&self) -> &[NodeId] {
        &self.matches
    }

    /// Consume the visitor and return its matches
    pub fn into_matches(self) -> Vec<NodeId> {
        self.matches
    }

    /// Run the traversal from `start`
    pub fn visit(&mut self, graph: &Graph, start: NodeId) {
        self.start = start;
        self.accept(graph, start, 0);
    }

    fn accept(&mut self, graph: &Graph, id: NodeId, depth: usize) {
        if self.stopped || self.has_visited(id) {
            return;
        }
        let Some(node) = graph.node(id) else {
            return;
        };
        self.visited.insert(id);
        self.match_step(node);

        let within_depth = self.max_depth.map_or(true, |max| depth < max);
        if let Some(children) = node.children() {
            if self.directions.contains(Directions::CHILDREN) && within_depth && !self.stopped {
                let saved = self.directions;
                self.directions = saved.without(Directions::INPUTS | Directions::OUTPUTS);
                for child in children {
                    if self.stopped {
                        break;
                    }
                    self.accept(graph, *child, depth + 1);
                }
                self.directions = saved;
            }
        }

        self.descend_wiring(graph, node, depth);
    }

    fn descend_wiring(&mut self, graph: &Graph, node: &Node, depth: usize) {
        if self.directions.contains(Directions::INPUTS) {
            for input in node.inputs().neighbours() {
                if self.stopped {
                    return;
                }
                self.accept(graph, input, depth);
            }
        }
        if self.directions.contains(Directions::OUTPUTS) {
            for output in node.outputs().neighbours() {
                if self.stopped {
                    return;
                }
                self.accept(graph, output, depth);
            }
        }
    }

    fn match_step(&mut self, node: &Node) {
        if !self.match_start && node.id() == self.start {
            return;
        }
        if self.rule.matches(node) {
            self.matches.push(node.id());
            if self.accumulate == Accumulate::First {
                self.stop();
            }
        }
    }
}

impl Graph {
    /// Run `visitor` from `start`
    pub fn visit(&self, start: NodeId, visitor: &mut Visitor<'_>) {
        visitor.visit(self, start);
    }

    /// Every node reachable from `start` along `directions`, in visiting
    /// order, excluding `start`
    pub fn reachable(&self, start: NodeId, directions: Directions) -> Vec<NodeId> {
        let mut visitor = Visitor::new(MatchRule::Any, directions, Accumulate::All).excluding_start();
        visitor.visit(self, start);
        visitor.into_matches()
    }

    /// Deliver a property event to `start` and every node reachable from it
    /// along `directions`. Returns the number of nodes notified.
    pub fn broadcast(&mut self, start: NodeId, directions: Directions, property: &str) -> usize {
        let mut visitor = Visitor::new(MatchRule::Any, directions, Accumulate::All);
        visitor.visit(self, start);
        let targets = visitor.into_matches();
        for target in &targets {
            let event = GraphEvent::new(
                *target,
                EventKind::PropertyChanged {
                    property: property.to_string(),
                },
            );
            self.notify(*target, &event);
        }
        targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectOptions;
    use crate::event::{EventRecorder, Listener};
    use crate::kinds::container::ConnectableContainer;
    use crate::kinds::raster::{ImageHandler, ImageMosaic, ImageResampler};

    #[test]
    fn test_directions() {
        let both = Directions::CHILDREN | Directions::INPUTS;
        assert!(both.contains(Directions::INPUTS));
        assert!(!both.contains(Directions::OUTPUTS));
        assert_eq!(both.without(Directions::INPUTS), Directions::CHILDREN);
    }

    #[test]
    fn test_cycle_terminates_and_visits_once() {
        let mut graph = Graph::default();
        let root = graph.add(ConnectableContainer::default());
        let source = graph.add(ImageHandler::default());
        let first = graph.add(ImageMosaic::default());
        let second = graph.add(ImageMosaic::default());
        for id in [source, first, second] {
            graph.accept(root, id).unwrap();
        }
        graph.connect_input_to(first, source, ConnectOptions::default()).unwrap();
        graph.connect_input_to(second, first, ConnectOptions::default()).unwrap();
        // Feedback: the downstream mosaic feeds its own upstream
        graph.connect_input_to(first, second, ConnectOptions::default()).unwrap();

        let mut visitor = Visitor::new(
            MatchRule::Any,
            Directions::CHILDREN | Directions::INPUTS | Directions::OUTPUTS,
            Accumulate::All,
        );
        visitor.visit(&graph, root);
        let matches = visitor.into_matches();
        assert_eq!(matches.len(), 4);
        let unique: HashSet<_> = matches.iter().collect();
        assert_eq!(unique.len(), 4);

        let upstream = graph.reachable(second, Directions::INPUTS);
        assert_eq!(upstream.len(), 2);
        assert!(upstream.contains(&first) && upstream.contains(&source));
    }

    #[test]
    fn test_children_traversal_ignores_child_wiring() {
        let mut graph = Graph::default();
        let root = graph.add(ConnectableContainer::default());
        let inside = graph.add(ImageResampler::default());
        let outside = graph.add(ImageHandler::default());
        graph.accept(root, inside).unwrap();
        graph.connect_input_to(inside, outside, ConnectOptions::default()).unwrap();

        let subtree = graph.reachable(root, Directions::CHILDREN | Directions::INPUTS);
        assert_eq!(subtree, vec![inside]);
    }

    #[test]
    fn test_first_match_stops() {
        let mut graph = Graph::default();
        let root = graph.add(ConnectableContainer::default());
        for _ in 0..3 {
            let child = graph.add(ImageHandler::default());
            graph.accept(root, child).unwrap();
        }
        let mut visitor = Visitor::new(
            MatchRule::kind::<ImageHandler>(),
            Directions::CHILDREN,
            Accumulate::First,
        );
        visitor.visit(&graph, root);
        assert!(visitor.is_stopped());
        assert_eq!(visitor.matches().len(), 1);
        // Root plus the one child reached before stopping
        assert_eq!(visitor.visited_count(), 2);
    }

    #[test]
    fn test_match_rules() {
        let mut graph = Graph::default();
        let handler = graph.add(ImageHandler::default());
        let mosaic = graph.add(ImageMosaic::default());
        let node = |id| graph.node(id).unwrap();

        assert!(MatchRule::Class(NodeClass::ImageCombiner).matches(node(mosaic)));
        assert!(!MatchRule::Class(NodeClass::ImageSource).matches(node(mosaic)));
        assert!(MatchRule::DerivedFrom(NodeClass::ImageSource).matches(node(mosaic)));
        assert!(MatchRule::kind::<ImageHandler>().matches(node(handler)));
        assert!(!MatchRule::kind::<ImageHandler>().matches(node(mosaic)));
        assert!(MatchRule::predicate(|n| n.inputs().is_fixed()).matches(node(handler)));
    }

    #[test]
    fn test_broadcast_reaches_downstream() {
        let mut graph = Graph::default();
        let source = graph.add(ImageHandler::default());
        let filter = graph.add(ImageResampler::default());
        graph.connect_input_to(filter, source, ConnectOptions::default()).unwrap();
        let log = EventRecorder::new();
        graph.add_listener(filter, Listener::observer(log.clone()));

        let notified = graph.broadcast(source, Directions::OUTPUTS, "refresh");
        assert_eq!(notified, 2);
        assert_eq!(log.len(), 1);
    }
}
