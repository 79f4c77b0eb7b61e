// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port lists holding a node's input and output neighbours.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl PortDirection {
    /// The direction a reciprocal connection uses on the neighbour
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }

    /// Lowercase name used in keys and messages
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a port list when a node is constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortSpec {
    /// Fixed number of slots; the list never grows or shrinks
    Fixed(usize),
    /// Dynamic list starting with the given number of empty slots
    Dynamic(usize),
}

/// Upper bound on the length of a dynamic port list
pub const MAX_SLOTS: usize = 1 << 16;

/// Ordered list of neighbour slots on one side of a node.
///
/// A fixed list keeps its length forever and only ever clears slots. A
/// dynamic list grows on demand and removes entries on disconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortList {
    slots: Vec<Option<NodeId>>,
    fixed: bool,
}

impl PortList {
    /// Create a fixed list with `count` empty slots
    pub fn fixed(count: usize) -> Self {
        Self {
            slots: vec![None; count],
            fixed: true,
        }
    }

    /// Create a dynamic list with `count` empty slots
    pub fn dynamic(count: usize) -> Self {
        Self {
            slots: vec![None; count],
            fixed: false,
        }
    }

    /// Create a list from a spec
    pub fn from_spec(spec: PortSpec) -> Self {
        match spec {
            PortSpec::Fixed(count) => Self::fixed(count),
            PortSpec::Dynamic(count) => Self::dynamic(count),
        }
    }

    /// Number of slots, empty ones included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the list has no slots at all
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether the list has a fixed length
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Neighbour at `index`, if the slot exists and is occupied
    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.slots.get(index).copied().flatten()
    }

    /// All slots in order
    pub fn slots(&self) -> &[Option<NodeId>] {
        &self.slots
    }

    /// Occupied slots as `(index, neighbour)` pairs
    pub fn connected(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|id| (index, id)))
    }

    /// Neighbours in slot order, empty slots skipped
    pub fn neighbours(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().flatten().copied()
    }

    /// Number of occupied slots
    pub fn connected_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// First index holding `id`
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == Some(id))
    }

    /// Whether any slot holds `id`
    pub fn contains(&self, id: NodeId) -> bool {
        self.position(id).is_some()
    }

    /// Default placement for a new connection: the first empty slot, or the
    /// append position of a dynamic list. `None` when a fixed list is full.
    pub fn next_free_slot(&self) -> Option<usize> {
        match self.slots.iter().position(Option::is_none) {
            Some(index) => Some(index),
            None if self.fixed || self.slots.len() >= MAX_SLOTS => None,
            None => Some(self.slots.len()),
        }
    }

    /// Whether `index` can be written: inside a fixed list, or below
    /// [`MAX_SLOTS`] for a dynamic one
    pub fn accepts_index(&self, index: usize) -> bool {
        if self.fixed {
            index < self.slots.len()
        } else {
            index < MAX_SLOTS
        }
    }

    /// Store `id` at `index`, growing a dynamic list as needed.
    ///
    /// Returns the previous occupant. Callers check [`Self::accepts_index`]
    /// first; an index they reject leaves the list untouched.
    pub(crate) fn place(&mut self, index: usize, id: NodeId) -> Option<NodeId> {
        if index >= self.slots.len() {
            if self.fixed || index >= MAX_SLOTS {
                return None;
            }
            self.slots.resize(index + 1, None);
        }
        self.slots[index].replace(id)
    }

    /// Clear the slot of a fixed list, or remove the entry of a dynamic one
    pub(crate) fn take(&mut self, index: usize) -> Option<NodeId> {
        if index >= self.slots.len() {
            return None;
        }
        if self.fixed {
            self.slots[index].take()
        } else {
            self.slots.remove(index)
        }
    }

    /// Resize a dynamic list to at most [`MAX_SLOTS`]; dropped slots must
    /// already be empty or disconnected by the caller
    pub(crate) fn resize(&mut self, count: usize) -> bool {
        if self.fixed || count > MAX_SLOTS {
            return false;
        }
        self.slots.resize(count, None);
        true
    }

    /// Rewrite every occurrence of `old` to `new`
    pub(crate) fn replace_id(&mut self, old: NodeId, new: NodeId) {
        for slot in self.slots.iter_mut().filter(|slot| **slot == Some(old)) {
            *slot = Some(new);
        }
    }

    /// Move the entry at `from` to `to`, shifting the entries between
    pub(crate) fn shift(&mut self, from: usize, to: usize) {
        if from == to || from >= self.slots.len() || to >= self.slots.len() {
            return;
        }
        if from < to {
            self.slots[from..=to].rotate_left(1);
        } else {
            self.slots[to..=from].rotate_right(1);
        }
    }
}
