// SPDX-License-Identifier: MIT OR Apache-2.0
//! Save and restore of wired graphs through a [`KeywordList`].
//!
//! Saving walks a container's children and writes each under
//! `prefix + "object" + k + "."` (1-based, contiguous), recursing into nested
//! containers, then writes the container itself under `prefix`.
//!
//! Loading happens in two phases because a record may reference a node
//! before the node is defined:
//!
//! 1. every `objectN.` entry is instantiated through a [`NodeFactory`] and
//!    its positional `input_connectionI` references are remembered;
//! 2. the references are resolved into live connections.
//!
//! Identifiers are persisted as data. A load never reuses them; every
//! created node gets a fresh [`NodeId`] and [`LoadReport::id_map`] maps saved
//! identifiers to the new ones.

use crate::connection::ConnectOptions;
use crate::factory::NodeFactory;
use crate::graph::{Graph, GraphError};
use crate::keywords::{KeywordError, KeywordList};
use crate::node::{Node, NodeId};
use crate::port::{PortList, MAX_SLOTS};
use crate::visitor::{Accumulate, Directions, MatchRule, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Kind name of the node
pub const TYPE_KEY: &str = "type";
/// Saved identifier of the node
pub const ID_KEY: &str = "id";
/// Description of the node
pub const DESCRIPTION_KEY: &str = "description";
/// Input slot count
pub const NUMBER_INPUTS_KEY: &str = "number_inputs";
/// Output slot count
pub const NUMBER_OUTPUTS_KEY: &str = "number_outputs";
/// Whether the input list is fixed
pub const INPUT_LIST_FIXED_KEY: &str = "input_list_fixed";
/// Whether the output list is fixed
pub const OUTPUT_LIST_FIXED_KEY: &str = "output_list_fixed";
/// Stem of child object prefixes
pub const OBJECT_STEM: &str = "object";
/// Stem of positional input references
pub const INPUT_CONNECTION_STEM: &str = "input_connection";

/// Error while saving or loading a graph
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// A node that owns recorded inputs was no longer inside the container
    /// when wiring started, e.g. a listener moved it away while it was being
    /// accepted. The whole load is abandoned.
    #[error("Node {0} with recorded inputs is missing from the loaded graph")]
    MissingOwner(NodeId),

    /// Two objects in the record claim the same identifier
    #[error("Identifier {0} appears more than once in the record")]
    DuplicateIdentifier(NodeId),

    /// Reference to an unknown node (strict loads only)
    #[error("Input {index} of node {owner} references unknown node {reference}")]
    MissingReference {
        /// Node owning the input
        owner: NodeId,
        /// Input slot
        index: usize,
        /// Saved identifier that could not be resolved
        reference: NodeId,
    },

    /// Factory does not know the root's kind
    #[error("No node kind registered for {0:?}")]
    UnknownKind(String),

    /// Malformed keyword
    #[error(transparent)]
    Keyword(#[from] KeywordError),

    /// Structural failure
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Record file could not be read or written
    #[error("Record I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Record file is not valid RON
    #[error("Failed to parse record: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// Record could not be encoded
    #[error("Failed to serialize record: {0}")]
    Encode(#[from] ron::Error),
}

/// Read a RON keyword record from `path`
pub fn read_record(path: &Path) -> Result<KeywordList, PersistError> {
    let content = std::fs::read_to_string(path)?;
    Ok(KeywordList::from_ron(&content)?)
}

/// Write a keyword record to `path` as RON
pub fn write_record(record: &KeywordList, path: &Path) -> Result<(), PersistError> {
    let content = record.to_ron()?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Options controlling a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Abort instead of dropping edges whose reference cannot be resolved
    pub strict_references: bool,
    /// Fire connection events while wiring
    pub emit_events: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            strict_references: false,
            emit_events: true,
        }
    }
}

/// Input reference that could not be wired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEdge {
    /// Loaded node owning the input
    pub owner: NodeId,
    /// Input slot left empty
    pub index: usize,
    /// Saved identifier of the missing neighbour
    pub reference: NodeId,
}

/// Outcome of a successful load
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Saved identifier to new identifier
    pub id_map: HashMap<NodeId, NodeId>,
    /// Nodes created, in creation order
    pub created: Vec<NodeId>,
    /// Object prefixes the factory could not build
    pub skipped: Vec<String>,
    /// References that were not wired
    pub dropped_edges: Vec<DroppedEdge>,
}

impl LoadReport {
    /// New identifier of the node saved as `saved`
    pub fn loaded_id(&self, saved: NodeId) -> Option<NodeId> {
        self.id_map.get(&saved).copied()
    }
}

struct PendingInputs {
    owner: NodeId,
    references: Vec<(usize, NodeId)>,
}

#[derive(Default)]
struct LoadContext {
    report: LoadReport,
    pending: Vec<PendingInputs>,
    /// Saved identifiers of skipped objects and everything nested in them
    skipped_ids: HashSet<NodeId>,
}

impl LoadContext {
    fn skip(&mut self, record: &KeywordList, prefix: String) {
        let nested_id = format!(".{ID_KEY}");
        for (key, value) in record.iter() {
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if rest != ID_KEY && !rest.ends_with(&nested_id) {
                continue;
            }
            if let Ok(id) = value.parse::<NodeId>() {
                self.skipped_ids.insert(id);
            }
        }
        self.report.skipped.push(prefix);
    }

    fn map_id(&mut self, saved: Option<NodeId>, loaded: NodeId) -> Result<(), PersistError> {
        let Some(saved) = saved.filter(|id| id.is_valid()) else {
            return Ok(());
        };
        if self.report.id_map.insert(saved, loaded).is_some() {
            return Err(PersistError::DuplicateIdentifier(saved));
        }
        Ok(())
    }
}

fn write_node_state(node: &Node, record: &mut KeywordList, prefix: &str) {
    record.add(prefix, TYPE_KEY, node.kind_name());
    record.add(prefix, ID_KEY, node.id());
    if !node.description().is_empty() {
        record.add(prefix, DESCRIPTION_KEY, node.description());
    }
    record.add(prefix, NUMBER_INPUTS_KEY, node.inputs().len());
    record.add(prefix, NUMBER_OUTPUTS_KEY, node.outputs().len());
    record.add(prefix, INPUT_LIST_FIXED_KEY, node.inputs().is_fixed());
    record.add(prefix, OUTPUT_LIST_FIXED_KEY, node.outputs().is_fixed());
    for (index, neighbour) in node.inputs().connected() {
        record.add(prefix, &format!("{INPUT_CONNECTION_STEM}{index}"), neighbour);
    }
    node.kind().save_state(record, prefix);
}

fn parse_port_count(record: &KeywordList, prefix: &str, key: &str) -> Result<Option<usize>, KeywordError> {
    match record.parse::<usize>(prefix, key)? {
        Some(count) if count > MAX_SLOTS => Err(KeywordError::InvalidValue {
            key: format!("{prefix}{key}"),
            value: count.to_string(),
        }),
        count => Ok(count),
    }
}

fn restore_port_count(ports: &mut PortList, count: Option<usize>) {
    if let Some(count) = count {
        if !ports.is_fixed() {
            ports.resize(count);
        }
    }
}

/// Restore a node's own state; returns its saved identifier
fn read_node_state(
    node: &mut Node,
    record: &KeywordList,
    prefix: &str,
    restore_ports: bool,
) -> Result<Option<NodeId>, KeywordError> {
    node.kind_mut().load_state(record, prefix)?;
    let saved = record.parse::<NodeId>(prefix, ID_KEY)?;
    if let Some(description) = record.find(prefix, DESCRIPTION_KEY) {
        node.description = description.to_string();
    }
    if restore_ports {
        let inputs = parse_port_count(record, prefix, NUMBER_INPUTS_KEY)?;
        let outputs = parse_port_count(record, prefix, NUMBER_OUTPUTS_KEY)?;
        restore_port_count(&mut node.inputs, inputs);
        restore_port_count(&mut node.outputs, outputs);
    }
    Ok(saved)
}

fn read_references(record: &KeywordList, prefix: &str) -> Result<Vec<(usize, NodeId)>, KeywordError> {
    record
        .numbered_values(prefix, INPUT_CONNECTION_STEM)
        .into_iter()
        .map(|(index, value)| {
            let invalid = || KeywordError::InvalidValue {
                key: format!("{prefix}{INPUT_CONNECTION_STEM}{index}"),
                value: value.to_string(),
            };
            if index >= MAX_SLOTS {
                return Err(invalid());
            }
            value.parse().map(|id| (index, id)).map_err(|_| invalid())
        })
        .collect()
}

impl Graph {
    /// Write `node` (and, for containers, its whole subtree) under `prefix`
    pub fn save_state(&self, node: NodeId, record: &mut KeywordList, prefix: &str) -> Result<(), GraphError> {
        let target = self.require(node)?;
        if let Some(children) = target.children() {
            for (position, child) in children.iter().enumerate() {
                let child_prefix = format!("{prefix}{OBJECT_STEM}{}.", position + 1);
                self.save_state(*child, record, &child_prefix)?;
            }
        }
        write_node_state(target, record, prefix);
        Ok(())
    }

    /// Save `node` into a fresh record with an empty prefix
    pub fn save(&self, node: NodeId) -> Result<KeywordList, GraphError> {
        let mut record = KeywordList::new();
        self.save_state(node, &mut record, "")?;
        Ok(record)
    }

    /// Populate `container` from the objects saved under `prefix`.
    ///
    /// Objects the factory cannot build, or whose keywords are malformed,
    /// are skipped. A reference that cannot be resolved leaves its slot
    /// empty and is listed in [`LoadReport::dropped_edges`]. The container's
    /// own state is applied last. Any other failure removes every node
    /// created by this call and leaves the container as it was.
    pub fn load_container(
        &mut self,
        container: NodeId,
        record: &KeywordList,
        prefix: &str,
        factory: &dyn NodeFactory,
        options: LoadOptions,
    ) -> Result<LoadReport, PersistError> {
        self.require_container(container)?;
        let mut context = LoadContext::default();

        let outcome = Self::map_container_id(container, record, prefix, &mut context)
            .and_then(|()| self.instantiate_children(container, record, prefix, factory, &mut context))
            .and_then(|()| self.resolve_connections(container, &mut context, options))
            .and_then(|()| self.apply_container_state(container, record, prefix));

        match outcome {
            Ok(()) => {
                tracing::debug!(
                    "Loaded {} nodes into {} ({} skipped, {} edges dropped)",
                    context.report.created.len(),
                    container,
                    context.report.skipped.len(),
                    context.report.dropped_edges.len()
                );
                Ok(context.report)
            }
            Err(err) => {
                tracing::error!("Aborting load into {}: {}", container, err);
                self.rollback(&context.report.created);
                Err(err)
            }
        }
    }

    /// Build a new root node from the record and load its subtree.
    ///
    /// Returns the root's identifier and the load report.
    pub fn load_graph(
        &mut self,
        record: &KeywordList,
        prefix: &str,
        factory: &dyn NodeFactory,
        options: LoadOptions,
    ) -> Result<(NodeId, LoadReport), PersistError> {
        let name = record
            .find(prefix, TYPE_KEY)
            .ok_or_else(|| KeywordError::Missing(format!("{prefix}{TYPE_KEY}")))?;
        let kind = factory
            .create(record, prefix)
            .ok_or_else(|| PersistError::UnknownKind(name.to_string()))?;
        let mut node = Node::from_boxed(kind);

        if !node.is_container() {
            let saved = read_node_state(&mut node, record, prefix, true)?;
            let root = self.add_node(node);
            let mut report = LoadReport::default();
            report.created.push(root);
            if let Some(saved) = saved.filter(|id| id.is_valid()) {
                report.id_map.insert(saved, root);
            }
            return Ok((root, report));
        }

        let root = self.add_node(node);
        match self.load_container(root, record, prefix, factory, options) {
            Ok(mut report) => {
                report.created.insert(0, root);
                Ok((root, report))
            }
            Err(err) => {
                self.rollback(&[root]);
                Err(err)
            }
        }
    }

    fn map_container_id(
        container: NodeId,
        record: &KeywordList,
        prefix: &str,
        context: &mut LoadContext,
    ) -> Result<(), PersistError> {
        if record.find(prefix, TYPE_KEY).is_none() {
            return Ok(());
        }
        let saved = record.parse::<NodeId>(prefix, ID_KEY)?;
        context.map_id(saved, container)
    }

    /// Restore the container's description, kind state and, while it is
    /// unwired, its port counts. Its own `input_connection` keys belong to
    /// whoever loads its parent.
    fn apply_container_state(
        &mut self,
        container: NodeId,
        record: &KeywordList,
        prefix: &str,
    ) -> Result<(), PersistError> {
        if record.find(prefix, TYPE_KEY).is_none() {
            return Ok(());
        }
        let node = self
            .nodes
            .get_mut(&container)
            .ok_or(GraphError::NodeNotFound(container))?;

        let mut snapshot = KeywordList::new();
        node.kind().save_state(&mut snapshot, "");
        let description = node.description.clone();
        let unwired = node.inputs.connected_count() == 0 && node.outputs.connected_count() == 0;

        if let Err(err) = read_node_state(node, record, prefix, unwired) {
            if let Err(restore) = node.kind_mut().load_state(&snapshot, "") {
                tracing::warn!("Failed to restore state of {}: {}", container, restore);
            }
            node.description = description;
            return Err(err.into());
        }
        Ok(())
    }

    fn instantiate_children(
        &mut self,
        container: NodeId,
        record: &KeywordList,
        prefix: &str,
        factory: &dyn NodeFactory,
        context: &mut LoadContext,
    ) -> Result<(), PersistError> {
        for (_, child_prefix) in record.numbered_prefixes(prefix, OBJECT_STEM) {
            let Some(kind) = factory.create(record, &child_prefix) else {
                tracing::warn!("Skipping {}: no node kind could be built", child_prefix);
                context.skip(record, child_prefix);
                continue;
            };
            let mut node = Node::from_boxed(kind);
            let restored = read_node_state(&mut node, record, &child_prefix, true)
                .and_then(|saved| Ok((saved, read_references(record, &child_prefix)?)));
            let (saved, references) = match restored {
                Ok(restored) => restored,
                Err(err) => {
                    tracing::warn!("Skipping {}: {}", child_prefix, err);
                    context.skip(record, child_prefix);
                    continue;
                }
            };
            let nested = node.is_container();

            let id = self.add_node(node);
            context.report.created.push(id);
            context.map_id(saved, id)?;
            if !references.is_empty() {
                context.pending.push(PendingInputs { owner: id, references });
            }
            self.accept(container, id)?;

            if nested {
                self.instantiate_children(id, record, &child_prefix, factory, context)?;
            }
        }
        Ok(())
    }

    fn resolve_connections(
        &mut self,
        container: NodeId,
        context: &mut LoadContext,
        options: LoadOptions,
    ) -> Result<(), PersistError> {
        let created: HashSet<NodeId> = context.report.created.iter().copied().collect();
        let connect = ConnectOptions {
            reciprocal: true,
            emit_event: options.emit_events,
        };

        for pending in std::mem::take(&mut context.pending) {
            let owner = pending.owner;
            if self.find_live(container, owner).is_none() {
                return Err(PersistError::MissingOwner(owner));
            }
            for (index, reference) in pending.references {
                // Unknown saved IDs may name a live node outside the record
                let target = if context.skipped_ids.contains(&reference) {
                    None
                } else {
                    context.report.loaded_id(reference).or_else(|| {
                        self.find_live(container, reference)
                            .filter(|found| !created.contains(found))
                    })
                };
                let dropped = DroppedEdge {
                    owner,
                    index,
                    reference,
                };
                let Some(target) = target else {
                    tracing::warn!("Input {} of {} references unknown node {}; leaving it empty", index, owner, reference);
                    if options.strict_references {
                        return Err(PersistError::MissingReference {
                            owner,
                            index,
                            reference,
                        });
                    }
                    context.report.dropped_edges.push(dropped);
                    continue;
                };
                if let Err(err) = self.connect_input_at(owner, index, target, connect) {
                    tracing::warn!("Input {} of {} could not be wired: {}", index, owner, err);
                    if options.strict_references {
                        return Err(err.into());
                    }
                    context.report.dropped_edges.push(dropped);
                }
            }
        }
        Ok(())
    }

    /// Node `id` if reachable from `container` through children or
    /// inputs; the container itself never matches
    fn find_live(&self, container: NodeId, id: NodeId) -> Option<NodeId> {
        let mut visitor = Visitor::new(
            MatchRule::Id(id),
            Directions::CHILDREN | Directions::INPUTS,
            Accumulate::First,
        )
        .excluding_start();
        visitor.visit(self, container);
        visitor.first()
    }

    fn rollback(&mut self, created: &[NodeId]) {
        for id in created.iter().rev() {
            if !self.contains(*id) {
                continue;
            }
            if let Err(err) = self.destroy(*id) {
                tracing::warn!("Failed to remove {} during rollback: {}", id, err);
            }
        }
    }
}
