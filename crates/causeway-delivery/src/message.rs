//! Immutable broadcast message.

use causeway_clock::{NodeIndex, VectorClock};
use serde::{Deserialize, Serialize};

/// A payload stamped with the sender's clock at send time.
///
/// Built once by the sending node and never mutated afterwards. Recipients
/// get their own clone, which lives in the hold-back queue until delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message<P> {
    sender: NodeIndex,
    timestamp: VectorClock,
    payload: P,
}

impl<P> Message<P> {
    pub fn new(sender: NodeIndex, timestamp: VectorClock, payload: P) -> Self {
        Self {
            sender,
            timestamp,
            payload,
        }
    }

    /// The node that sent this message.
    pub fn sender(&self) -> NodeIndex {
        self.sender
    }

    /// Snapshot of the sender's clock right after its send event.
    pub fn timestamp(&self) -> &VectorClock {
        &self.timestamp
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Per-sender sequence number: `timestamp[sender]`.
    pub fn sequence(&self) -> u64 {
        self.timestamp.get(self.sender)
    }
}
