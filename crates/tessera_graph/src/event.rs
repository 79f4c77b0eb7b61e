// SPDX-License-Identifier: MIT OR Apache-2.0
//! Listener and event bus.
//!
//! Events are delivered synchronously to a node's listeners in registration
//! order. The listener list is snapshotted before delivery, so a listener may
//! add or remove listeners (itself included) or restructure the graph while
//! an event is in flight; changes take effect for the next event.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::port::PortDirection;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// What changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A named property of the node changed
    PropertyChanged {
        /// Property name
        property: String,
    },
    /// A neighbour was stored in a port slot
    Connected {
        /// Port list that changed
        direction: PortDirection,
        /// Slot index
        index: usize,
        /// Neighbour now in the slot
        neighbour: NodeId,
    },
    /// A neighbour was removed from a port slot
    Disconnected {
        /// Port list that changed
        direction: PortDirection,
        /// Slot index the neighbour occupied
        index: usize,
        /// Neighbour that was removed
        neighbour: NodeId,
    },
    /// The input list was permuted
    InputsReordered,
    /// A dynamic port list was resized
    PortCountChanged {
        /// Port list that changed
        direction: PortDirection,
        /// New slot count
        count: usize,
    },
    /// A container accepted a child
    ChildAdded {
        /// The new child
        child: NodeId,
    },
    /// A container released a child
    ChildRemoved {
        /// The released child
        child: NodeId,
    },
    /// The node is about to be destroyed
    Destroying,
}

impl EventKind {
    /// Whether the event describes a change of wiring.
    ///
    /// Wiring events are forwarded one hop along the origin's outputs.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Connected { .. }
                | Self::Disconnected { .. }
                | Self::InputsReordered
                | Self::PortCountChanged { .. }
        )
    }
}

/// An event together with the node it originated from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEvent {
    /// Node whose state changed
    pub origin: NodeId,
    /// What changed
    pub kind: EventKind,
    /// Set when the event is a forwarded copy delivered to a downstream node
    pub propagated: bool,
}

impl GraphEvent {
    /// Create a new, non-propagated event
    pub fn new(origin: NodeId, kind: EventKind) -> Self {
        Self {
            origin,
            kind,
            propagated: false,
        }
    }

    /// Copy of this event marked as forwarded
    pub fn forwarded(&self) -> Self {
        Self {
            propagated: true,
            ..self.clone()
        }
    }
}

/// Observer of graph events.
///
/// `receiver` is the node whose listener list is being notified; it differs
/// from `event.origin` for forwarded events.
pub trait EventListener: Send + Sync {
    /// Handle one event
    fn on_event(&self, graph: &mut Graph, receiver: NodeId, event: &GraphEvent);
}

/// Entry in a node's listener list
#[derive(Clone)]
pub enum Listener {
    /// Child listener shared by every child of the given container
    Container(NodeId),
    /// Caller supplied observer, compared by pointer identity
    Observer(Arc<dyn EventListener>),
}

impl Listener {
    /// Wrap an observer
    pub fn observer(listener: Arc<dyn EventListener>) -> Self {
        Self::Observer(listener)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Container(a), Self::Container(b)) => a == b,
            (Self::Observer(a), Self::Observer(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container(id) => f.debug_tuple("Container").field(id).finish(),
            Self::Observer(listener) => f
                .debug_tuple("Observer")
                .field(&Arc::as_ptr(listener).cast::<()>())
                .finish(),
        }
    }
}

/// Listener that records every event it receives
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<(NodeId, GraphEvent)>>,
}

impl EventRecorder {
    /// Create a new recorder ready to be registered
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Recorded `(receiver, event)` pairs in delivery order
    pub fn events(&self) -> Vec<(NodeId, GraphEvent)> {
        self.events.lock().clone()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<(NodeId, GraphEvent)> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventListener for EventRecorder {
    fn on_event(&self, _graph: &mut Graph, receiver: NodeId, event: &GraphEvent) {
        self.events.lock().push((receiver, event.clone()));
    }
}

impl Graph {
    /// Register a listener on `node`.
    ///
    /// Returns `false` if the node does not exist or the listener is already
    /// registered.
    pub fn add_listener(&mut self, node: NodeId, listener: Listener) -> bool {
        let Some(target) = self.nodes.get_mut(&node) else {
            return false;
        };
        if target.listeners.contains(&listener) {
            return false;
        }
        target.listeners.push(listener);
        true
    }

    /// Unregister a listener from `node`; returns whether it was registered
    pub fn remove_listener(&mut self, node: NodeId, listener: &Listener) -> bool {
        let Some(target) = self.nodes.get_mut(&node) else {
            return false;
        };
        let before = target.listeners.len();
        target.listeners.retain(|registered| registered != listener);
        target.listeners.len() != before
    }

    /// Deliver `event` to every listener registered on `receiver`
    pub fn notify(&mut self, receiver: NodeId, event: &GraphEvent) {
        let Some(node) = self.nodes.get(&receiver) else {
            return;
        };
        let listeners = node.listeners.clone();
        for listener in listeners {
            match listener {
                Listener::Container(container) => self.handle_child_event(container, receiver, event),
                Listener::Observer(observer) => observer.on_event(self, receiver, event),
            }
        }
    }

    /// Deliver a forwarded copy of `event` to every node in `origin`'s
    /// outputs. One hop only; the receivers do not forward it further.
    pub fn propagate_to_outputs(&mut self, origin: NodeId, event: &GraphEvent) {
        let Some(node) = self.nodes.get(&origin) else {
            return;
        };
        let outputs: Vec<NodeId> = node.outputs.neighbours().collect();
        let forwarded = event.forwarded();
        for output in outputs {
            self.notify(output, &forwarded);
        }
    }

    /// Fire `kind` on `origin`, forwarding wiring changes to its outputs
    pub(crate) fn emit(&mut self, origin: NodeId, kind: EventKind) {
        let event = GraphEvent::new(origin, kind);
        self.notify(origin, &event);
        if event.kind.is_connection() {
            self.propagate_to_outputs(origin, &event);
        }
    }

    /// Reaction of a container's shared child listener
    fn handle_child_event(&mut self, container: NodeId, child: NodeId, event: &GraphEvent) {
        if event.propagated || event.origin != child || !self.claims_child(container, child) {
            return;
        }
        match &event.kind {
            EventKind::Destroying => {
                self.release(container, child);
            }
            EventKind::PropertyChanged { .. } => self.propagate_to_outputs(child, event),
            _ => {}
        }
    }

    /// Whether `container` still lists `child` and is its owner
    pub(crate) fn claims_child(&self, container: NodeId, child: NodeId) -> bool {
        let listed = self
            .nodes
            .get(&container)
            .and_then(|node| node.children.as_ref())
            .is_some_and(|children| children.contains(&child));
        listed && self.nodes.get(&child).and_then(|node| node.owner) == Some(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectOptions;
    use crate::kinds::raster::{ImageHandler, ImageResampler, ImageFileWriter};

    #[test]
    fn test_add_listener_is_idempotent() {
        let mut graph = Graph::default();
        let node = graph.add(ImageHandler::default());
        let recorder = EventRecorder::new();
        let listener = Listener::observer(recorder.clone());

        assert!(graph.add_listener(node, listener.clone()));
        assert!(!graph.add_listener(node, listener.clone()));
        assert_eq!(graph.node(node).unwrap().listeners().len(), 1);

        assert!(graph.remove_listener(node, &listener));
        assert!(!graph.remove_listener(node, &listener));
        assert!(graph.node(node).unwrap().listeners().is_empty());
    }

    #[test]
    fn test_connection_event_reaches_outputs_one_hop() {
        let mut graph = Graph::default();
        let source = graph.add(ImageHandler::default());
        let filter = graph.add(ImageResampler::default());
        let writer = graph.add(ImageFileWriter::default());
        graph.connect_input_to(writer, filter, ConnectOptions::default()).unwrap();

        let filter_log = EventRecorder::new();
        let writer_log = EventRecorder::new();
        graph.add_listener(filter, Listener::observer(filter_log.clone()));
        graph.add_listener(writer, Listener::observer(writer_log.clone()));

        graph.connect_input_to(filter, source, ConnectOptions::default()).unwrap();

        let received = filter_log.events();
        let own: Vec<_> = received.iter().filter(|(_, event)| !event.propagated).collect();
        assert_eq!(own.len(), 1);
        assert_eq!(
            own[0].1.kind,
            EventKind::Connected {
                direction: PortDirection::Input,
                index: 0,
                neighbour: source,
            }
        );
        // The source's reciprocal output change is forwarded to the filter
        assert!(received
            .iter()
            .any(|(_, event)| event.propagated && event.origin == source));

        let downstream = writer_log.events();
        assert_eq!(downstream.len(), 1);
        assert_eq!(downstream[0].0, writer);
        assert_eq!(downstream[0].1.origin, filter);
        assert!(downstream[0].1.propagated);
    }

    #[test]
    fn test_suppressed_events_are_not_delivered() {
        let mut graph = Graph::default();
        let source = graph.add(ImageHandler::default());
        let filter = graph.add(ImageResampler::default());
        let log = EventRecorder::new();
        graph.add_listener(filter, Listener::observer(log.clone()));

        let quiet = ConnectOptions {
            reciprocal: true,
            emit_event: false,
        };
        graph.connect_input_to(filter, source, quiet).unwrap();
        assert!(log.is_empty());
    }

    struct SelfRemoving;

    impl EventListener for SelfRemoving {
        fn on_event(&self, graph: &mut Graph, receiver: NodeId, _event: &GraphEvent) {
            let me = graph.node(receiver).unwrap().listeners()[0].clone();
            graph.remove_listener(receiver, &me);
        }
    }

    #[test]
    fn test_listener_may_remove_itself_during_delivery() {
        let mut graph = Graph::default();
        let node = graph.add(ImageHandler::default());
        let recorder = EventRecorder::new();
        graph.add_listener(node, Listener::observer(Arc::new(SelfRemoving)));
        graph.add_listener(node, Listener::observer(recorder.clone()));

        graph.set_description(node, "first").unwrap();
        // The snapshot still delivered to the second listener
        assert_eq!(recorder.len(), 1);
        assert_eq!(graph.node(node).unwrap().listeners().len(), 1);

        graph.set_description(node, "second").unwrap();
        assert_eq!(recorder.len(), 2);
    }
}
