// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection protocol: connecting, disconnecting and reordering port slots.
//!
//! Every connection is stored twice, once in the input list of the consumer
//! and once in the output list of the producer. The reciprocal flags let a
//! caller update only one side, which the protocol itself uses to avoid
//! recursing forever.

use crate::event::EventKind;
use crate::graph::{Graph, GraphError};
use crate::node::NodeId;
use crate::port::{PortDirection, MAX_SLOTS};

/// Flags for connect operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Also store the reciprocal entry on the neighbour
    pub reciprocal: bool,
    /// Fire connection events
    pub emit_event: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            reciprocal: true,
            emit_event: true,
        }
    }
}

/// Flags for disconnect operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectOptions {
    /// Also remove the reciprocal entry from the neighbour
    pub reciprocal: bool,
    /// Fire disconnection events
    pub emit_event: bool,
}

impl Default for DisconnectOptions {
    fn default() -> Self {
        Self {
            reciprocal: true,
            emit_event: true,
        }
    }
}

/// Reordering of a single input slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMove {
    /// One slot towards index 0
    Up,
    /// One slot away from index 0
    Down,
    /// To index 0
    Top,
    /// To the last index
    Bottom,
}

impl Graph {
    /// Index of `neighbour` in `node`'s inputs
    pub fn find_input_index(&self, node: NodeId, neighbour: NodeId) -> Option<usize> {
        self.nodes.get(&node)?.find_input_index(neighbour)
    }

    /// Index of `neighbour` in `node`'s outputs
    pub fn find_output_index(&self, node: NodeId, neighbour: NodeId) -> Option<usize> {
        self.nodes.get(&node)?.find_output_index(neighbour)
    }

    /// Slot `candidate` would get from [`Graph::connect_input_to`]
    pub fn index_to_connect_input(&self, node: NodeId, candidate: NodeId) -> Option<usize> {
        let target = self.nodes.get(&node)?;
        let source = self.nodes.get(&candidate)?;
        target.kind().input_index_to_connect(target.inputs(), source)
    }

    /// Whether `node` would accept `candidate` at input `index`
    pub fn can_connect_input(&self, node: NodeId, index: usize, candidate: NodeId) -> bool {
        self.capability(PortDirection::Input, node, index, candidate)
    }

    /// Whether `node` would accept `candidate` at output `index`
    pub fn can_connect_output(&self, node: NodeId, index: usize, candidate: NodeId) -> bool {
        self.capability(PortDirection::Output, node, index, candidate)
    }

    fn capability(&self, direction: PortDirection, node: NodeId, index: usize, candidate: NodeId) -> bool {
        if node == candidate {
            return false;
        }
        let (Some(target), Some(source)) = (self.nodes.get(&node), self.nodes.get(&candidate)) else {
            return false;
        };
        if !target.ports(direction).accepts_index(index) {
            return false;
        }
        match direction {
            PortDirection::Input => target.kind().can_connect_input(index, source),
            PortDirection::Output => target.kind().can_connect_output(index, source),
        }
    }

    fn repeats_allowed(&self, direction: PortDirection, node: NodeId) -> bool {
        direction == PortDirection::Input
            && self
                .nodes
                .get(&node)
                .is_some_and(|target| target.kind().allows_repeated_inputs())
    }

    fn auto_index(&self, direction: PortDirection, node: NodeId, candidate: NodeId) -> Option<usize> {
        match direction {
            PortDirection::Input => self.index_to_connect_input(node, candidate),
            PortDirection::Output => self.nodes.get(&node)?.outputs().next_free_slot(),
        }
    }

    /// Connect `candidate` to the first suitable input of `node`.
    ///
    /// Returns the slot used. If `candidate` is already an input and the
    /// kind does not allow repeats, its existing index is returned unchanged.
    pub fn connect_input_to(
        &mut self,
        node: NodeId,
        candidate: NodeId,
        options: ConnectOptions,
    ) -> Result<usize, GraphError> {
        self.connect_to(PortDirection::Input, node, candidate, options)
    }

    /// Connect `candidate` to the first suitable output of `node`
    pub fn connect_output_to(
        &mut self,
        node: NodeId,
        candidate: NodeId,
        options: ConnectOptions,
    ) -> Result<usize, GraphError> {
        self.connect_to(PortDirection::Output, node, candidate, options)
    }

    /// Connect `candidate` to input `index` of `node`, replacing any
    /// previous occupant. Dynamic lists grow to reach `index`.
    pub fn connect_input_at(
        &mut self,
        node: NodeId,
        index: usize,
        candidate: NodeId,
        options: ConnectOptions,
    ) -> Result<usize, GraphError> {
        self.connect_at(PortDirection::Input, node, index, candidate, options)
    }

    /// Connect `candidate` to output `index` of `node`
    pub fn connect_output_at(
        &mut self,
        node: NodeId,
        index: usize,
        candidate: NodeId,
        options: ConnectOptions,
    ) -> Result<usize, GraphError> {
        self.connect_at(PortDirection::Output, node, index, candidate, options)
    }

    fn connect_to(
        &mut self,
        direction: PortDirection,
        node: NodeId,
        candidate: NodeId,
        options: ConnectOptions,
    ) -> Result<usize, GraphError> {
        let target = self.require(node)?;
        self.require(candidate)?;
        if node == candidate {
            return Err(GraphError::SelfLoop(node));
        }
        if !self.repeats_allowed(direction, node) {
            if let Some(index) = target.ports(direction).position(candidate) {
                return Ok(index);
            }
        }
        let index = self
            .auto_index(direction, node, candidate)
            .ok_or(GraphError::NoFreeSlot { node, direction })?;
        self.connect_at(direction, node, index, candidate, options)
    }

    fn connect_at(
        &mut self,
        direction: PortDirection,
        node: NodeId,
        index: usize,
        candidate: NodeId,
        options: ConnectOptions,
    ) -> Result<usize, GraphError> {
        let target = self.require(node)?;
        let source = self.require(candidate)?;
        if node == candidate {
            return Err(GraphError::SelfLoop(node));
        }

        let ports = target.ports(direction);
        if !ports.accepts_index(index) {
            return Err(GraphError::PortIndexOutOfRange {
                node,
                direction,
                index,
                len: ports.len(),
            });
        }
        if ports.get(index) == Some(candidate) {
            return Ok(index);
        }
        if let Some(existing) = ports.position(candidate) {
            if !self.repeats_allowed(direction, node) {
                return Err(GraphError::DuplicateConnection {
                    node,
                    direction,
                    index: existing,
                    neighbour: candidate,
                });
            }
        }
        if !self.capability(direction, node, index, candidate) {
            return Err(GraphError::Rejected {
                node,
                direction,
                index,
                candidate,
            });
        }

        // Validate the reciprocal side before touching anything
        let opposite = direction.opposite();
        let reciprocal_index = if options.reciprocal && !source.ports(opposite).contains(node) {
            let slot = self
                .auto_index(opposite, candidate, node)
                .ok_or(GraphError::NoFreeSlot {
                    node: candidate,
                    direction: opposite,
                })?;
            if !self.capability(opposite, candidate, slot, node) {
                return Err(GraphError::Rejected {
                    node: candidate,
                    direction: opposite,
                    index: slot,
                    candidate: node,
                });
            }
            Some(slot)
        } else {
            None
        };

        let previous = self
            .nodes
            .get_mut(&node)
            .and_then(|target| target.ports_mut(direction).place(index, candidate));
        if let Some(previous) = previous {
            if options.emit_event {
                self.emit(
                    node,
                    EventKind::Disconnected {
                        direction,
                        index,
                        neighbour: previous,
                    },
                );
            }
            if options.reciprocal {
                self.unlink_reciprocal(direction, node, previous, options.emit_event)?;
            }
        }

        if let Some(slot) = reciprocal_index {
            let one_sided = ConnectOptions {
                reciprocal: false,
                emit_event: options.emit_event,
            };
            self.connect_at(opposite, candidate, slot, node, one_sided)?;
        }

        tracing::debug!("Connected {} {} {} <- {}", node, direction, index, candidate);
        if options.emit_event {
            self.emit(
                node,
                EventKind::Connected {
                    direction,
                    index,
                    neighbour: candidate,
                },
            );
        }
        Ok(index)
    }

    /// Remove `node` from `neighbour`'s opposite list once `node` no longer
    /// refers to `neighbour` in `direction`
    fn unlink_reciprocal(
        &mut self,
        direction: PortDirection,
        node: NodeId,
        neighbour: NodeId,
        emit_event: bool,
    ) -> Result<(), GraphError> {
        let still_linked = self
            .nodes
            .get(&node)
            .is_some_and(|target| target.ports(direction).contains(neighbour));
        if still_linked {
            return Ok(());
        }
        let opposite = direction.opposite();
        let slot = self
            .nodes
            .get(&neighbour)
            .and_then(|other| other.ports(opposite).position(node));
        if let Some(slot) = slot {
            let one_sided = DisconnectOptions {
                reciprocal: false,
                emit_event,
            };
            self.disconnect_at(opposite, neighbour, slot, one_sided)?;
        }
        Ok(())
    }

    /// Clear input `index` of `node` and return the neighbour that was there
    pub fn disconnect_input(
        &mut self,
        node: NodeId,
        index: usize,
        options: DisconnectOptions,
    ) -> Result<Option<NodeId>, GraphError> {
        self.disconnect_at(PortDirection::Input, node, index, options)
    }

    /// Clear output `index` of `node` and return the neighbour that was there
    pub fn disconnect_output(
        &mut self,
        node: NodeId,
        index: usize,
        options: DisconnectOptions,
    ) -> Result<Option<NodeId>, GraphError> {
        self.disconnect_at(PortDirection::Output, node, index, options)
    }

    /// Disconnect `neighbour` from `node`'s inputs; returns the slot it held
    pub fn disconnect_input_node(
        &mut self,
        node: NodeId,
        neighbour: NodeId,
        options: DisconnectOptions,
    ) -> Result<Option<usize>, GraphError> {
        let Some(index) = self.require(node)?.find_input_index(neighbour) else {
            return Ok(None);
        };
        self.disconnect_at(PortDirection::Input, node, index, options)?;
        Ok(Some(index))
    }

    /// Disconnect `neighbour` from `node`'s outputs; returns the slot it held
    pub fn disconnect_output_node(
        &mut self,
        node: NodeId,
        neighbour: NodeId,
        options: DisconnectOptions,
    ) -> Result<Option<usize>, GraphError> {
        let Some(index) = self.require(node)?.find_output_index(neighbour) else {
            return Ok(None);
        };
        self.disconnect_at(PortDirection::Output, node, index, options)?;
        Ok(Some(index))
    }

    /// Remove every connection between `node` and `neighbour`, in both
    /// directions. Returns whether anything was removed.
    pub fn disconnect(&mut self, node: NodeId, neighbour: NodeId) -> Result<bool, GraphError> {
        let mut removed = false;
        while self
            .disconnect_input_node(node, neighbour, DisconnectOptions::default())?
            .is_some()
        {
            removed = true;
        }
        while self
            .disconnect_output_node(node, neighbour, DisconnectOptions::default())?
            .is_some()
        {
            removed = true;
        }
        Ok(removed)
    }

    /// Disconnect every input of `node`
    pub fn disconnect_all_inputs(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.disconnect_all_in(PortDirection::Input, node)
    }

    /// Disconnect every output of `node`
    pub fn disconnect_all_outputs(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.disconnect_all_in(PortDirection::Output, node)
    }

    fn disconnect_all_in(&mut self, direction: PortDirection, node: NodeId) -> Result<(), GraphError> {
        let len = self.require(node)?.ports(direction).len();
        // Back to front so dynamic removals do not shift pending indices
        for index in (0..len).rev() {
            let occupied = self
                .nodes
                .get(&node)
                .is_some_and(|target| target.ports(direction).get(index).is_some());
            if occupied {
                self.disconnect_at(direction, node, index, DisconnectOptions::default())?;
            }
        }
        Ok(())
    }

    fn disconnect_at(
        &mut self,
        direction: PortDirection,
        node: NodeId,
        index: usize,
        options: DisconnectOptions,
    ) -> Result<Option<NodeId>, GraphError> {
        let len = self.require(node)?.ports(direction).len();
        if index >= len {
            return Err(GraphError::PortIndexOutOfRange {
                node,
                direction,
                index,
                len,
            });
        }
        let removed = self
            .nodes
            .get_mut(&node)
            .and_then(|target| target.ports_mut(direction).take(index));
        let Some(neighbour) = removed else {
            return Ok(None);
        };

        if options.reciprocal {
            self.unlink_reciprocal(direction, node, neighbour, options.emit_event)?;
        }
        tracing::debug!("Disconnected {} {} {} ({})", node, direction, index, neighbour);
        if options.emit_event {
            self.emit(
                node,
                EventKind::Disconnected {
                    direction,
                    index,
                    neighbour,
                },
            );
        }
        Ok(Some(neighbour))
    }

    /// Resize a dynamic port list.
    ///
    /// Fixed lists are never resized; the call reports
    /// [`GraphError::FixedPortList`]. Counts above [`MAX_SLOTS`] are out of
    /// range. Shrinking disconnects the dropped neighbours on both sides.
    pub fn set_port_count(
        &mut self,
        node: NodeId,
        direction: PortDirection,
        count: usize,
    ) -> Result<(), GraphError> {
        let ports = self.require(node)?.ports(direction);
        if ports.is_fixed() {
            return Err(GraphError::FixedPortList { node, direction });
        }
        let current = ports.len();
        if count > MAX_SLOTS {
            return Err(GraphError::PortIndexOutOfRange {
                node,
                direction,
                index: count,
                len: current,
            });
        }
        if count == current {
            return Ok(());
        }
        for index in (count..current).rev() {
            let occupied = self
                .nodes
                .get(&node)
                .is_some_and(|target| target.ports(direction).get(index).is_some());
            if occupied {
                self.disconnect_at(direction, node, index, DisconnectOptions::default())?;
            }
        }
        if let Some(target) = self.nodes.get_mut(&node) {
            target.ports_mut(direction).resize(count);
        }
        self.emit(node, EventKind::PortCountChanged { direction, count });
        Ok(())
    }

    /// Move input `neighbour` of `node` one slot towards index 0
    pub fn move_input_up(&mut self, node: NodeId, neighbour: NodeId) -> bool {
        self.move_input(node, neighbour, InputMove::Up)
    }

    /// Move input `neighbour` of `node` one slot away from index 0
    pub fn move_input_down(&mut self, node: NodeId, neighbour: NodeId) -> bool {
        self.move_input(node, neighbour, InputMove::Down)
    }

    /// Move input `neighbour` of `node` to index 0
    pub fn move_input_to_top(&mut self, node: NodeId, neighbour: NodeId) -> bool {
        self.move_input(node, neighbour, InputMove::Top)
    }

    /// Move input `neighbour` of `node` to the last index
    pub fn move_input_to_bottom(&mut self, node: NodeId, neighbour: NodeId) -> bool {
        self.move_input(node, neighbour, InputMove::Bottom)
    }

    /// Permute the input list without touching reciprocal outputs.
    ///
    /// Returns `false` if `neighbour` is not an input or is already at the
    /// requested end.
    pub fn move_input(&mut self, node: NodeId, neighbour: NodeId, movement: InputMove) -> bool {
        let Some(target) = self.nodes.get_mut(&node) else {
            return false;
        };
        let Some(from) = target.inputs.position(neighbour) else {
            return false;
        };
        let last = target.inputs.len() - 1;
        let to = match movement {
            InputMove::Up | InputMove::Top if from == 0 => return false,
            InputMove::Down | InputMove::Bottom if from == last => return false,
            InputMove::Up => from - 1,
            InputMove::Down => from + 1,
            InputMove::Top => 0,
            InputMove::Bottom => last,
        };
        target.inputs.shift(from, to);
        self.emit(node, EventKind::InputsReordered);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::raster::{ImageFileWriter, ImageHandler, ImageMosaic, ImageResampler};

    fn sources(graph: &mut Graph, count: usize) -> Vec<NodeId> {
        (0..count).map(|_| graph.add(ImageHandler::default())).collect()
    }

    #[test]
    fn test_connect_is_symmetric() {
        let mut graph = Graph::default();
        let source = graph.add(ImageHandler::default());
        let filter = graph.add(ImageResampler::default());

        let index = graph.connect_input_to(filter, source, ConnectOptions::default()).unwrap();
        assert_eq!(index, 0);
        assert_eq!(graph.node(filter).unwrap().input(0), Some(source));
        assert_eq!(graph.find_output_index(source, filter), Some(0));

        let removed = graph.disconnect_input(filter, 0, DisconnectOptions::default()).unwrap();
        assert_eq!(removed, Some(source));
        assert_eq!(graph.find_input_index(filter, source), None);
        assert_eq!(graph.find_output_index(source, filter), None);
    }

    #[test]
    fn test_one_sided_connect() {
        let mut graph = Graph::default();
        let source = graph.add(ImageHandler::default());
        let filter = graph.add(ImageResampler::default());
        let one_sided = ConnectOptions {
            reciprocal: false,
            emit_event: true,
        };
        graph.connect_input_to(filter, source, one_sided).unwrap();
        assert_eq!(graph.find_input_index(filter, source), Some(0));
        assert_eq!(graph.find_output_index(source, filter), None);
    }

    #[test]
    fn test_rejected_connection_leaves_graph_unchanged() {
        let mut graph = Graph::default();
        let writer = graph.add(ImageFileWriter::default());
        let filter = graph.add(ImageResampler::default());

        // A writer is not an image source
        let result = graph.connect_input_to(filter, writer, ConnectOptions::default());
        assert!(matches!(result, Err(GraphError::Rejected { .. })));
        assert!(!graph.can_connect_input(filter, 0, writer));
        assert_eq!(graph.node(filter).unwrap().input(0), None);
        assert!(!graph.node(writer).unwrap().is_connected(PortDirection::Output));
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut graph = Graph::default();
        let mosaic = graph.add(ImageMosaic::default());
        assert!(matches!(
            graph.connect_input_to(mosaic, mosaic, ConnectOptions::default()),
            Err(GraphError::SelfLoop(_))
        ));
    }

    #[test]
    fn test_fixed_list_full() {
        let mut graph = Graph::default();
        let ids = sources(&mut graph, 2);
        let (a, b) = (ids[0], ids[1]);
        let filter = graph.add(ImageResampler::default());
        graph.connect_input_to(filter, a, ConnectOptions::default()).unwrap();
        assert!(matches!(
            graph.connect_input_to(filter, b, ConnectOptions::default()),
            Err(GraphError::NoFreeSlot { .. })
        ));
        assert!(matches!(
            graph.connect_input_at(filter, 3, b, ConnectOptions::default()),
            Err(GraphError::PortIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_reconnecting_returns_existing_index() {
        let mut graph = Graph::default();
        let ids = sources(&mut graph, 2);
        let mosaic = graph.add(ImageMosaic::default());
        graph.connect_input_to(mosaic, ids[0], ConnectOptions::default()).unwrap();
        graph.connect_input_to(mosaic, ids[1], ConnectOptions::default()).unwrap();
        assert_eq!(graph.connect_input_to(mosaic, ids[0], ConnectOptions::default()).unwrap(), 0);
        assert_eq!(graph.node(mosaic).unwrap().inputs().len(), 2);
        assert!(matches!(
            graph.connect_input_at(mosaic, 1, ids[0], ConnectOptions::default()),
            Err(GraphError::DuplicateConnection { index: 0, .. })
        ));
    }

    #[test]
    fn test_connect_at_replaces_previous_occupant() {
        let mut graph = Graph::default();
        let ids = sources(&mut graph, 2);
        let filter = graph.add(ImageResampler::default());
        graph.connect_input_at(filter, 0, ids[0], ConnectOptions::default()).unwrap();
        graph.connect_input_at(filter, 0, ids[1], ConnectOptions::default()).unwrap();
        assert_eq!(graph.node(filter).unwrap().input(0), Some(ids[1]));
        assert_eq!(graph.find_output_index(ids[0], filter), None);
        assert_eq!(graph.find_output_index(ids[1], filter), Some(0));
    }

    #[test]
    fn test_connect_at_grows_dynamic_list() {
        let mut graph = Graph::default();
        let source = graph.add(ImageHandler::default());
        let mosaic = graph.add(ImageMosaic::default());
        graph.connect_input_at(mosaic, 2, source, ConnectOptions::default()).unwrap();
        let inputs = graph.node(mosaic).unwrap().inputs();
        assert_eq!(inputs.slots(), &[None, None, Some(source)]);
    }

    #[test]
    fn test_huge_index_on_dynamic_list_is_rejected() {
        let mut graph = Graph::default();
        let source = graph.add(ImageHandler::default());
        let mosaic = graph.add(ImageMosaic::default());
        for index in [MAX_SLOTS, usize::MAX] {
            assert!(matches!(
                graph.connect_input_at(mosaic, index, source, ConnectOptions::default()),
                Err(GraphError::PortIndexOutOfRange { .. })
            ));
        }
        assert!(graph.node(mosaic).unwrap().inputs().is_empty());
        assert!(!graph.node(source).unwrap().is_connected(PortDirection::Output));
        assert!(matches!(
            graph.set_port_count(mosaic, PortDirection::Input, usize::MAX),
            Err(GraphError::PortIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_disconnect_out_of_range() {
        let mut graph = Graph::default();
        let filter = graph.add(ImageResampler::default());
        assert!(matches!(
            graph.disconnect_input(filter, 1, DisconnectOptions::default()),
            Err(GraphError::PortIndexOutOfRange { .. })
        ));
        assert_eq!(graph.disconnect_input(filter, 0, DisconnectOptions::default()).unwrap(), None);
    }

    #[test]
    fn test_set_port_count_on_fixed_list_fails() {
        let mut graph = Graph::default();
        let filter = graph.add(ImageResampler::default());
        let result = graph.set_port_count(filter, PortDirection::Input, 4);
        assert!(matches!(result, Err(GraphError::FixedPortList { .. })));
        assert_eq!(graph.node(filter).unwrap().inputs().len(), 1);
    }

    #[test]
    fn test_shrinking_dynamic_list_disconnects() {
        let mut graph = Graph::default();
        let ids = sources(&mut graph, 3);
        let mosaic = graph.add(ImageMosaic::default());
        for id in &ids {
            graph.connect_input_to(mosaic, *id, ConnectOptions::default()).unwrap();
        }
        graph.set_port_count(mosaic, PortDirection::Input, 1).unwrap();
        assert_eq!(graph.node(mosaic).unwrap().inputs().slots(), &[Some(ids[0])]);
        assert_eq!(graph.find_output_index(ids[2], mosaic), None);

        graph.set_port_count(mosaic, PortDirection::Input, 3).unwrap();
        assert_eq!(graph.node(mosaic).unwrap().inputs().len(), 3);
        // Holes are filled before appending
        graph.connect_input_to(mosaic, ids[2], ConnectOptions::default()).unwrap();
        assert_eq!(graph.node(mosaic).unwrap().input(1), Some(ids[2]));
    }

    #[test]
    fn test_reordering_inputs() {
        let mut graph = Graph::default();
        let ids = sources(&mut graph, 3);
        let mosaic = graph.add(ImageMosaic::default());
        for id in &ids {
            graph.connect_input_to(mosaic, *id, ConnectOptions::default()).unwrap();
        }

        assert!(graph.move_input_to_top(mosaic, ids[2]));
        assert_eq!(graph.node(mosaic).unwrap().inputs().slots(), &[Some(ids[2]), Some(ids[0]), Some(ids[1])]);
        assert!(graph.move_input_down(mosaic, ids[2]));
        assert_eq!(graph.find_input_index(mosaic, ids[2]), Some(1));
        assert!(graph.move_input_to_bottom(mosaic, ids[2]));
        assert_eq!(graph.find_input_index(mosaic, ids[2]), Some(2));
        assert!(!graph.move_input_down(mosaic, ids[2]));
        assert!(graph.move_input_up(mosaic, ids[2]));
        assert_eq!(graph.find_input_index(mosaic, ids[2]), Some(1));

        // Reciprocal outputs are untouched
        for id in &ids {
            assert_eq!(graph.find_output_index(*id, mosaic), Some(0));
        }
    }

    #[test]
    fn test_disconnect_both_directions() {
        let mut graph = Graph::default();
        let source = graph.add(ImageHandler::default());
        let mosaic = graph.add(ImageMosaic::default());
        graph.connect_input_to(mosaic, source, ConnectOptions::default()).unwrap();
        assert!(graph.disconnect(source, mosaic).unwrap());
        assert!(!graph.disconnect(source, mosaic).unwrap());
        assert!(!graph.node(mosaic).unwrap().is_connected(PortDirection::Input));
    }
}
