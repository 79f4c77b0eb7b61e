// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node factory used when restoring graphs.

use crate::keywords::KeywordList;
use crate::node::{Node, NodeKind};
use crate::persistence::TYPE_KEY;
use indexmap::IndexMap;

/// Builds node kinds from saved records
pub trait NodeFactory {
    /// Build the kind described under `prefix`, or `None` if this factory
    /// does not know it
    fn create(&self, record: &KeywordList, prefix: &str) -> Option<Box<dyn NodeKind>>;
}

/// Constructor stored in a [`NodeRegistry`]
pub type KindConstructor = fn() -> Box<dyn NodeKind>;

/// Registry of available node kinds, keyed by kind name
pub struct NodeRegistry {
    /// Registered constructors by kind name
    kinds: IndexMap<&'static str, KindConstructor>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            kinds: IndexMap::new(),
        }
    }

    /// Register a constructor under `name`
    pub fn register(&mut self, name: &'static str, constructor: KindConstructor) {
        self.kinds.insert(name, constructor);
    }

    /// Register a default-constructible kind under its own kind name
    pub fn register_kind<T: NodeKind + Default>(&mut self) {
        let name = T::default().kind_name();
        self.register(name, || -> Box<dyn NodeKind> { Box::new(T::default()) });
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// All registered kind names
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.keys().copied()
    }

    /// Build a kind by name
    pub fn create_kind(&self, name: &str) -> Option<Box<dyn NodeKind>> {
        self.kinds.get(name).map(|constructor| constructor())
    }

    /// Build a node by kind name
    pub fn create_node(&self, name: &str) -> Option<Node> {
        self.create_kind(name).map(Node::from_boxed)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory for NodeRegistry {
    fn create(&self, record: &KeywordList, prefix: &str) -> Option<Box<dyn NodeKind>> {
        let name = record.find(prefix, TYPE_KEY)?;
        let kind = self.create_kind(name.trim());
        if kind.is_none() {
            tracing::debug!("No node kind registered for {:?}", name);
        }
        kind
    }
}
