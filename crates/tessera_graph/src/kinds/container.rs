// SPDX-License-Identifier: MIT OR Apache-2.0
//! Container kinds.

use crate::factory::NodeRegistry;
use crate::node::{Node, NodeClass, NodeKind};
use crate::port::PortSpec;
use std::any::Any;

/// Register the container kinds
pub fn register(registry: &mut NodeRegistry) {
    registry.register_kind::<ConnectableContainer>();
    registry.register_kind::<ImageChain>();
}

/// General purpose container with open port lists
#[derive(Debug, Clone, Default)]
pub struct ConnectableContainer;

impl NodeKind for ConnectableContainer {
    fn kind_name(&self) -> &'static str {
        "ConnectableContainer"
    }

    fn class(&self) -> NodeClass {
        NodeClass::Container
    }

    fn input_spec(&self) -> PortSpec {
        PortSpec::Dynamic(0)
    }

    fn can_connect_input(&self, _index: usize, _candidate: &Node) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Container holding a processing chain; itself acts as an image source
#[derive(Debug, Clone, Default)]
pub struct ImageChain;

impl NodeKind for ImageChain {
    fn kind_name(&self) -> &'static str {
        "ImageChain"
    }

    fn class(&self) -> NodeClass {
        NodeClass::ImageChain
    }

    fn input_spec(&self) -> PortSpec {
        PortSpec::Dynamic(0)
    }

    fn can_connect_input(&self, _index: usize, candidate: &Node) -> bool {
        candidate.class().is_a(NodeClass::ImageSource)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
