// SPDX-License-Identifier: MIT OR Apache-2.0
//! Object connection graph for `Tessera` raster processing chains.
//!
//! Processing objects are nodes with ordered input and output port lists.
//! Connections are kept symmetric: when `B` lists `A` as an input, `A` lists
//! `B` as an output. Containers own child nodes and may nest.
//!
//! ## Architecture
//!
//! - [`Graph`] is an arena of [`Node`]s addressed by [`NodeId`]
//! - Behaviour per node type enters through the [`NodeKind`] trait
//! - [`Visitor`] walks children and wiring with cycle protection
//! - Changes are broadcast to [`EventListener`]s as [`GraphEvent`]s
//! - Graphs save to and load from a flat [`KeywordList`]

pub mod node;
pub mod port;
pub mod connection;
pub mod graph;
pub mod container;
pub mod visitor;
pub mod event;
pub mod keywords;
pub mod factory;
pub mod persistence;
pub mod settings;
pub mod kinds;

pub use node::{Node, NodeClass, NodeId, NodeKind};
pub use port::{PortDirection, PortList, PortSpec};
pub use connection::{ConnectOptions, DisconnectOptions, InputMove};
pub use graph::{Graph, GraphError};
pub use visitor::{Accumulate, Directions, MatchRule, Visitor};
pub use event::{EventKind, EventListener, EventRecorder, GraphEvent, Listener};
pub use keywords::{KeywordError, KeywordList};
pub use factory::{NodeFactory, NodeRegistry};
pub use persistence::{DroppedEdge, LoadOptions, LoadReport, PersistError};
pub use settings::{GraphSettings, PersistenceSettings, SettingsError};
