//! Causeway Node - concurrent causal broadcast nodes
//!
//! This crate wraps the single-threaded delivery engine into nodes that
//! can be shared between tasks and threads, and adds a small cluster
//! harness for fanning messages out with simulated network delay.
//!
//! # Quick Start
//!
//! ```rust
//! use causeway_node::{Cluster, NetworkConfig, NodeConfig};
//!
//! let cluster: Cluster<String> =
//!     Cluster::new(3, NodeConfig::default(), NetworkConfig::instant()).unwrap();
//!
//! cluster.broadcast(0, "Deposit $10,000".to_string()).unwrap();
//! cluster.broadcast(1, "Withdraw $10,000".to_string()).unwrap();
//!
//! assert!(cluster.is_quiescent());
//! assert!(cluster.is_converged());
//! assert_eq!(cluster.node(2).unwrap().clock().as_slice(), &[1, 1, 0]);
//! ```
//!
//! # Architecture
//!
//! - [`node`] - a node: one mutex around clock and hold-back queue
//! - [`event`] - hold-back and delivery notifications
//! - [`cluster`] - fixed group of nodes with synchronous or delayed fan-out
//! - [`config`] - node and simulated network configuration
//! - [`error`] - error types

pub mod cluster;
pub mod config;
pub mod error;
pub mod event;
pub mod node;

// Re-exports for convenience
pub use cluster::Cluster;
pub use config::{NetworkConfig, NodeConfig, NodeConfigBuilder};
pub use error::{NodeError, Result};
pub use event::NodeEvent;
pub use node::{Node, NodeHandle, ReceiveOutcome};

pub use causeway_clock::{CausalOrder, NodeIndex, VectorClock};
pub use causeway_delivery::{Message, Readiness};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::cluster::Cluster;
    pub use crate::config::{NetworkConfig, NodeConfig};
    pub use crate::error::NodeError;
    pub use crate::event::NodeEvent;
    pub use crate::node::{Node, NodeHandle, ReceiveOutcome};
    pub use causeway_delivery::Message;
}
