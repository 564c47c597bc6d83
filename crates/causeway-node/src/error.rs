//! Error types for nodes and clusters.

use causeway_clock::NodeIndex;
use causeway_delivery::DeliveryError;
use thiserror::Error;

/// Error type for node and cluster operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("Delivery contract violation: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Node not found: {index} (cluster of {size})")]
    NodeNotFound { index: NodeIndex, size: usize },

    #[error("Recipient listed more than once: {index}")]
    DuplicateRecipient { index: NodeIndex },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Delivery task failed: {0}")]
    TaskFailed(String),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
