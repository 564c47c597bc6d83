//! Error types for the delivery engine.
//!
//! Every variant is a caller contract violation. An ineligible message is
//! never an error: it is parked in the hold-back queue.

use causeway_clock::NodeIndex;
use thiserror::Error;

/// Contract violations detected before any engine state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Group must contain at least one node")]
    EmptyGroup,

    #[error("Node index {index} out of range for a group of {node_count}")]
    NodeOutOfRange { index: NodeIndex, node_count: usize },

    #[error("Unknown sender {sender} for a group of {node_count}")]
    UnknownSender { sender: NodeIndex, node_count: usize },

    #[error("Timestamp width mismatch: expected {expected}, found {found}")]
    WidthMismatch { expected: usize, found: usize },

    #[error("Timestamp {timestamp} carries no send event from sender {sender}")]
    UnstampedMessage { sender: NodeIndex, timestamp: String },

    #[error("Node {node} was handed its own message")]
    SelfDelivery { node: NodeIndex },
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
