// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node kinds.
//!
//! Each submodule provides concrete kinds plus a helper that registers them.

pub mod container;
pub mod raster;

use crate::factory::NodeRegistry;

/// Create a registry holding every built-in kind
pub fn create_raster_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    container::register(&mut registry);
    raster::register(&mut registry);
    registry
}
