// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the connection graph.

use crate::event::Listener;
use crate::keywords::{KeywordError, KeywordList};
use crate::port::{PortDirection, PortList, PortSpec};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a node.
///
/// Identifiers come from a process-wide counter, so they are totally ordered
/// and never handed out twice. [`NodeId::INVALID`] is never generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Sentinel meaning "no node"
    pub const INVALID: NodeId = NodeId(0);

    /// Allocate the next node ID
    pub fn new() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether this is a real identifier
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Typed discriminant for node kinds.
///
/// Classes form a small hierarchy so visitors can ask both "is exactly X" and
/// "is some kind of X".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    /// Root of the hierarchy
    Connectable,
    /// Node owning child nodes
    Container,
    /// Anything producing raster data
    ImageSource,
    /// Source reading a raster from storage
    ImageHandler,
    /// Single-input raster transform
    ImageFilter,
    /// Raster transform merging several inputs
    ImageCombiner,
    /// Container that is itself a raster source
    ImageChain,
    /// Terminal consumer of data
    OutputSink,
    /// Sink writing rasters to storage
    ImageWriter,
}

impl NodeClass {
    /// Direct parents of this class
    pub fn parents(self) -> &'static [NodeClass] {
        match self {
            Self::Connectable => &[],
            Self::Container | Self::ImageSource | Self::OutputSink => &[Self::Connectable],
            Self::ImageHandler | Self::ImageFilter => &[Self::ImageSource],
            Self::ImageCombiner => &[Self::ImageFilter],
            Self::ImageChain => &[Self::ImageSource, Self::Container],
            Self::ImageWriter => &[Self::OutputSink],
        }
    }

    /// Whether this class equals `other` or derives from it
    pub fn is_a(self, other: NodeClass) -> bool {
        self == other || self.parents().iter().any(|parent| parent.is_a(other))
    }
}

/// Behaviour supplied by each concrete node kind.
///
/// The graph engine is domain agnostic; every rule about which neighbour may
/// sit in which port enters through [`NodeKind::can_connect_input`].
pub trait NodeKind: Any + fmt::Debug + Send + Sync {
    /// Registry name, written as the `type` keyword on save
    fn kind_name(&self) -> &'static str;

    /// Class discriminant used by type-matching visitors
    fn class(&self) -> NodeClass;

    /// Whether nodes of this kind own children
    fn is_container(&self) -> bool {
        self.class().is_a(NodeClass::Container)
    }

    /// Shape of the input list at construction
    fn input_spec(&self) -> PortSpec;

    /// Shape of the output list at construction
    fn output_spec(&self) -> PortSpec {
        PortSpec::Dynamic(0)
    }

    /// Whether `candidate` may occupy input slot `index`
    fn can_connect_input(&self, index: usize, candidate: &Node) -> bool;

    /// Whether `candidate` may occupy output slot `index`
    fn can_connect_output(&self, _index: usize, _candidate: &Node) -> bool {
        true
    }

    /// Slot a new input connection goes to when no index is given
    fn input_index_to_connect(&self, inputs: &PortList, _candidate: &Node) -> Option<usize> {
        inputs.next_free_slot()
    }

    /// Whether the same neighbour may appear at several input slots
    fn allows_repeated_inputs(&self) -> bool {
        false
    }

    /// Write kind-specific state under `prefix`
    fn save_state(&self, _record: &mut KeywordList, _prefix: &str) {}

    /// Restore kind-specific state from `prefix`
    fn load_state(&mut self, _record: &KeywordList, _prefix: &str) -> Result<(), KeywordError> {
        Ok(())
    }

    /// Upcast for downcasting to the concrete kind
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete kind
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A node instance in the graph
#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) description: String,
    pub(crate) owner: Option<NodeId>,
    pub(crate) inputs: PortList,
    pub(crate) outputs: PortList,
    pub(crate) listeners: Vec<Listener>,
    pub(crate) children: Option<IndexSet<NodeId>>,
    kind: Box<dyn NodeKind>,
}

impl Node {
    /// Create a new node of the given kind
    pub fn new(kind: impl NodeKind) -> Self {
        Self::from_boxed(Box::new(kind))
    }

    /// Create a new node from an already boxed kind
    pub fn from_boxed(kind: Box<dyn NodeKind>) -> Self {
        Self {
            id: NodeId::new(),
            description: String::new(),
            owner: None,
            inputs: PortList::from_spec(kind.input_spec()),
            outputs: PortList::from_spec(kind.output_spec()),
            listeners: Vec::new(),
            children: kind.is_container().then(IndexSet::new),
            kind,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Unique ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Human readable description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Container that currently owns this node
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    /// Input port list
    pub fn inputs(&self) -> &PortList {
        &self.inputs
    }

    /// Output port list
    pub fn outputs(&self) -> &PortList {
        &self.outputs
    }

    /// Port list for a direction
    pub fn ports(&self, direction: PortDirection) -> &PortList {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }

    pub(crate) fn ports_mut(&mut self, direction: PortDirection) -> &mut PortList {
        match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        }
    }

    /// Neighbour at input `index`
    pub fn input(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index)
    }

    /// Neighbour at output `index`
    pub fn output(&self, index: usize) -> Option<NodeId> {
        self.outputs.get(index)
    }

    /// Index of `neighbour` in the input list
    pub fn find_input_index(&self, neighbour: NodeId) -> Option<usize> {
        self.inputs.position(neighbour)
    }

    /// Index of `neighbour` in the output list
    pub fn find_output_index(&self, neighbour: NodeId) -> Option<usize> {
        self.outputs.position(neighbour)
    }

    /// Whether any slot in `direction` is occupied
    pub fn is_connected(&self, direction: PortDirection) -> bool {
        self.ports(direction).connected_count() > 0
    }

    /// Registered listeners in registration order
    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    /// Children, if this node is a container
    pub fn children(&self) -> Option<&IndexSet<NodeId>> {
        self.children.as_ref()
    }

    /// Whether this node owns children
    pub fn is_container(&self) -> bool {
        self.children.is_some()
    }

    /// The node's kind
    pub fn kind(&self) -> &dyn NodeKind {
        self.kind.as_ref()
    }

    /// Mutable access to the node's kind
    pub fn kind_mut(&mut self) -> &mut dyn NodeKind {
        self.kind.as_mut()
    }

    /// Class discriminant of the kind
    pub fn class(&self) -> NodeClass {
        self.kind.class()
    }

    /// Registry name of the kind
    pub fn kind_name(&self) -> &'static str {
        self.kind.kind_name()
    }

    /// Downcast the kind to a concrete type
    pub fn downcast_ref<T: NodeKind>(&self) -> Option<&T> {
        self.kind.as_any().downcast_ref()
    }

    /// Mutably downcast the kind to a concrete type
    pub fn downcast_mut<T: NodeKind>(&mut self) -> Option<&mut T> {
        self.kind.as_any_mut().downcast_mut()
    }
}
