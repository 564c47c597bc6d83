//! Events emitted by nodes for observers.
//!
//! Events are purely observational: dropping every receiver has no effect
//! on delivery.

use causeway_clock::{NodeIndex, VectorClock};
use causeway_delivery::Readiness;

/// Event emitted by a node while processing a received message.
#[derive(Clone, Debug)]
pub enum NodeEvent<P> {
    /// The message was parked in the hold-back queue.
    HeldBack {
        node: NodeIndex,
        sender: NodeIndex,
        timestamp: VectorClock,
        payload: P,
        reason: Readiness,
    },
    /// The message was handed to the application.
    Delivered {
        node: NodeIndex,
        sender: NodeIndex,
        timestamp: VectorClock,
        payload: P,
        from_queue: bool,
    },
}

impl<P> NodeEvent<P> {
    /// The node that emitted the event.
    pub fn node(&self) -> NodeIndex {
        match self {
            NodeEvent::HeldBack { node, .. } | NodeEvent::Delivered { node, .. } => *node,
        }
    }

    pub fn sender(&self) -> NodeIndex {
        match self {
            NodeEvent::HeldBack { sender, .. } | NodeEvent::Delivered { sender, .. } => *sender,
        }
    }

    pub fn timestamp(&self) -> &VectorClock {
        match self {
            NodeEvent::HeldBack { timestamp, .. } | NodeEvent::Delivered { timestamp, .. } => {
                timestamp
            }
        }
    }

    pub fn payload(&self) -> &P {
        match self {
            NodeEvent::HeldBack { payload, .. } | NodeEvent::Delivered { payload, .. } => payload,
        }
    }

    pub fn is_delivery(&self) -> bool {
        matches!(self, NodeEvent::Delivered { .. })
    }
}
