//! Causeway Delivery - causal broadcast delivery engine
//!
//! This crate holds the per-node machinery that turns an arbitrary arrival
//! order into a causally consistent delivery order:
//! - [`Message`]: payload stamped with the sender's vector clock
//! - [`HoldBackQueue`]: messages that arrived before their dependencies
//! - [`DeliveryEngine`]: the delivery condition and the fixed-point drain
//!
//! The engine is single-threaded; `causeway-node` puts it behind a lock.
//!
//! # Assumptions
//!
//! Channels are reliable: every message eventually arrives exactly once.
//! Lost messages strand their dependents in the queue forever, and
//! duplicates are parked rather than filtered.
//!
//! # Example
//!
//! ```rust
//! use causeway_delivery::{DeliveryEngine, Receipt};
//!
//! let mut bank0 = DeliveryEngine::new(0, 3).unwrap();
//! let mut bank1 = DeliveryEngine::new(1, 3).unwrap();
//! let mut bank2 = DeliveryEngine::new(2, 3).unwrap();
//!
//! let deposit = bank0.stamp("Deposit $10,000");
//! bank1.receive(deposit.clone()).unwrap();
//!
//! let withdraw = bank1.stamp("Withdraw $10,000");
//!
//! // bank 2 sees the withdrawal first and parks it
//! assert!(bank2.receive(withdraw).unwrap().is_held_back());
//!
//! // the deposit unblocks it
//! let receipt = bank2.receive(deposit).unwrap();
//! assert!(matches!(receipt, Receipt::Delivered(ref d) if d.len() == 2));
//! assert_eq!(bank2.clock().as_slice(), &[1, 1, 0]);
//! ```

pub mod engine;
pub mod error;
pub mod holdback;
pub mod message;

pub use engine::{is_deliverable, readiness, Delivery, DeliveryEngine, Readiness, Receipt};
pub use error::{DeliveryError, Result};
pub use holdback::HoldBackQueue;
pub use message::Message;

pub use causeway_clock::{NodeIndex, VectorClock};
