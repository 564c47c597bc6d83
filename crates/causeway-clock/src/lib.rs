//! Causeway Clock - vector clocks for causal broadcast
//!
//! Every node in a Causeway group owns one [`VectorClock`] whose width equals
//! the group size. The clock is the only piece of causal metadata carried on
//! the wire: a sender stamps each message with a snapshot of its clock taken
//! right after bumping its own component.
//!
//! ```rust
//! use causeway_clock::{CausalOrder, VectorClock};
//!
//! let mut a = VectorClock::new(3);
//! a.increment(0);
//!
//! let b = a.incremented(1);
//! assert_eq!(a.causal_order(&b), CausalOrder::Before);
//! assert_eq!(b.to_string(), "[1, 1, 0]");
//! ```

pub mod vector_clock;

pub use vector_clock::{CausalOrder, NodeIndex, VectorClock};
