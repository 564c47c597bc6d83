//! Causal delivery engine
//!
//! This module implements vector-clock causal broadcast delivery: a node
//! hands a message to the application only after every message it causally
//! depends on has been handed over first.
//!
//! ## Delivery condition
//!
//! Node `i` with local clock `LC` receiving message `m` from sender `j`
//! stamped with `T`:
//!
//! ```text
//! deliverable(m) ⟺ T[j] = LC[j] + 1          // next message from j (FIFO)
//!               ∧ ∀k ≠ j: T[k] ≤ LC[k]       // no causal gap
//! ```
//!
//! ## Protocol
//!
//! 1. **On send**:
//!    ```text
//!    LC[i] := LC[i] + 1
//!    m := ⟨i, LC, payload⟩
//!    ```
//!
//! 2. **On receive m from j**:
//!    ```text
//!    if deliverable(m) then
//!        deliver(m); LC[j] := T[j]
//!        drain()
//!    else
//!        Q := Q ∪ {m}
//!    ```
//!
//! 3. **drain** (fixed point):
//!    ```text
//!    while ∃m ∈ Q: deliverable(m)
//!        Q := Q \ {m}; deliver(m); LC[sender(m)] := T[sender(m)]
//!    ```
//!
//! Delivery only absorbs the sender's component. The delivery condition
//! already guarantees `T[k] ≤ LC[k]` for every other `k`, so a full
//! component-wise max would leave those components unchanged.

use crate::error::{DeliveryError, Result};
use crate::holdback::HoldBackQueue;
use crate::message::Message;
use causeway_clock::{NodeIndex, VectorClock};
use tracing::{debug, trace};

/// Outcome of evaluating the delivery condition for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Both conditions hold.
    Deliverable,
    /// `T[j] ≤ LC[j]`: this sender position was already consumed.
    Duplicate { sequence: u64, delivered: u64 },
    /// `T[j] > LC[j] + 1`: earlier messages from the sender are missing.
    SenderGap { expected: u64, got: u64 },
    /// `T[k] > LC[k]` for some `k ≠ j`.
    CausalGap {
        index: NodeIndex,
        required: u64,
        observed: u64,
    },
}

impl Readiness {
    pub fn is_deliverable(&self) -> bool {
        matches!(self, Readiness::Deliverable)
    }
}

/// Evaluate the delivery condition, reporting the first failing clause.
pub fn readiness(local: &VectorClock, timestamp: &VectorClock, sender: NodeIndex) -> Readiness {
    let delivered = local.get(sender);
    let sequence = timestamp.get(sender);

    if sequence <= delivered {
        return Readiness::Duplicate {
            sequence,
            delivered,
        };
    }
    if sequence != delivered + 1 {
        return Readiness::SenderGap {
            expected: delivered + 1,
            got: sequence,
        };
    }

    for (index, required) in timestamp.iter() {
        if index == sender {
            continue;
        }
        let observed = local.get(index);
        if required > observed {
            return Readiness::CausalGap {
                index,
                required,
                observed,
            };
        }
    }

    Readiness::Deliverable
}

/// Check the delivery condition.
pub fn is_deliverable(local: &VectorClock, timestamp: &VectorClock, sender: NodeIndex) -> bool {
    readiness(local, timestamp, sender).is_deliverable()
}

/// A message handed to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<P> {
    pub message: Message<P>,
    /// True if the message waited in the hold-back queue first.
    pub from_queue: bool,
}

/// Result of a single `receive` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receipt<P> {
    /// The message was parked; carries the failing clause.
    HeldBack(Readiness),
    /// The message was delivered, followed by everything it unblocked.
    Delivered(Vec<Delivery<P>>),
}

impl<P> Receipt<P> {
    /// Deliveries made by this call, in delivery order.
    pub fn deliveries(&self) -> &[Delivery<P>] {
        match self {
            Receipt::HeldBack(_) => &[],
            Receipt::Delivered(deliveries) => deliveries,
        }
    }

    pub fn is_held_back(&self) -> bool {
        matches!(self, Receipt::HeldBack(_))
    }
}

/// Per-node delivery state: the local clock and the hold-back queue.
///
/// Not synchronized; wrap it in a lock to share between tasks.
#[derive(Debug, Clone)]
pub struct DeliveryEngine<P> {
    id: NodeIndex,
    clock: VectorClock,
    queue: HoldBackQueue<P>,
    delivered: u64,
}

impl<P> DeliveryEngine<P> {
    /// Create the engine for node `id` in a group of `node_count` nodes.
    pub fn new(id: NodeIndex, node_count: usize) -> Result<Self> {
        if node_count == 0 {
            return Err(DeliveryError::EmptyGroup);
        }
        if id >= node_count {
            return Err(DeliveryError::NodeOutOfRange {
                index: id,
                node_count,
            });
        }

        Ok(Self {
            id,
            clock: VectorClock::new(node_count),
            queue: HoldBackQueue::new(),
            delivered: 0,
        })
    }

    pub fn id(&self) -> NodeIndex {
        self.id
    }

    /// Group size (clock width).
    pub fn node_count(&self) -> usize {
        self.clock.len()
    }

    /// Current local clock.
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    /// Messages waiting in the hold-back queue.
    pub fn pending(&self) -> &HoldBackQueue<P> {
        &self.queue
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Total messages delivered from other nodes.
    pub fn delivered_count(&self) -> u64 {
        self.delivered
    }

    /// Register a local send event and stamp `payload` with the new clock.
    pub fn stamp(&mut self, payload: P) -> Message<P> {
        let seq = self.clock.increment(self.id);
        trace!(node = self.id, seq, clock = %self.clock, "stamped message");
        Message::new(self.id, self.clock.clone(), payload)
    }

    /// Receive a message from another node.
    ///
    /// Returns `Receipt::HeldBack` if the message is not yet deliverable,
    /// otherwise every delivery made by this call in order: the message
    /// itself first, then whatever it unblocked from the queue.
    pub fn receive(&mut self, message: Message<P>) -> Result<Receipt<P>> {
        self.validate(&message)?;

        let ready = readiness(&self.clock, message.timestamp(), message.sender());
        if !ready.is_deliverable() {
            debug!(
                node = self.id,
                sender = message.sender(),
                timestamp = %message.timestamp(),
                clock = %self.clock,
                reason = ?ready,
                "holding back message"
            );
            self.queue.insert(message);
            return Ok(Receipt::HeldBack(ready));
        }

        let mut deliveries = vec![self.deliver(message, false)];
        deliveries.extend(self.drain());
        Ok(Receipt::Delivered(deliveries))
    }

    /// Deliver queued messages until none is deliverable.
    ///
    /// Each candidate is evaluated against the clock as updated by the
    /// previous delivery, so chains of dependencies resolve in one call.
    /// Calling this again at the fixed point is a no-op.
    pub fn drain(&mut self) -> Vec<Delivery<P>> {
        let mut deliveries = Vec::new();

        loop {
            let clock = &self.clock;
            let next = self
                .queue
                .take_first(|m| is_deliverable(clock, m.timestamp(), m.sender()));

            match next {
                Some(message) => deliveries.push(self.deliver(message, true)),
                None => break,
            }
        }

        if !deliveries.is_empty() {
            trace!(
                node = self.id,
                drained = deliveries.len(),
                remaining = self.queue.len(),
                "drained hold-back queue"
            );
        }

        deliveries
    }

    fn deliver(&mut self, message: Message<P>, from_queue: bool) -> Delivery<P> {
        let sender = message.sender();
        self.clock.merge_component(sender, message.sequence());
        self.delivered += 1;

        debug!(
            node = self.id,
            sender,
            timestamp = %message.timestamp(),
            clock = %self.clock,
            from_queue,
            "delivered message"
        );

        Delivery {
            message,
            from_queue,
        }
    }

    fn validate(&self, message: &Message<P>) -> Result<()> {
        let node_count = self.node_count();
        let sender = message.sender();

        if sender >= node_count {
            return Err(DeliveryError::UnknownSender { sender, node_count });
        }
        if message.timestamp().len() != node_count {
            return Err(DeliveryError::WidthMismatch {
                expected: node_count,
                found: message.timestamp().len(),
            });
        }
        if sender == self.id {
            return Err(DeliveryError::SelfDelivery { node: self.id });
        }
        if message.sequence() == 0 {
            return Err(DeliveryError::UnstampedMessage {
                sender,
                timestamp: message.timestamp().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(entries: &[u64]) -> VectorClock {
        VectorClock::from(entries.to_vec())
    }

    fn msg(sender: NodeIndex, entries: &[u64], payload: &'static str) -> Message<&'static str> {
        Message::new(sender, clock(entries), payload)
    }

    fn payloads(receipt: &Receipt<&'static str>) -> Vec<&'static str> {
        receipt
            .deliveries()
            .iter()
            .map(|d| *d.message.payload())
            .collect()
    }

    #[test]
    fn test_readiness_boundary_is_deliverable() {
        // T[k] == LC[k] for k != j
        let local = clock(&[1, 0, 2]);
        assert_eq!(readiness(&local, &clock(&[1, 1, 2]), 1), Readiness::Deliverable);
    }

    #[test]
    fn test_readiness_causal_gap() {
        let local = clock(&[1, 0, 2]);
        assert_eq!(
            readiness(&local, &clock(&[1, 1, 3]), 1),
            Readiness::CausalGap {
                index: 2,
                required: 3,
                observed: 2
            }
        );
    }

    #[test]
    fn test_readiness_sender_gap_and_duplicate() {
        let local = clock(&[1, 0, 0]);
        assert_eq!(
            readiness(&local, &clock(&[3, 0, 0]), 0),
            Readiness::SenderGap {
                expected: 2,
                got: 3
            }
        );
        assert_eq!(
            readiness(&local, &clock(&[1, 0, 0]), 0),
            Readiness::Duplicate {
                sequence: 1,
                delivered: 1
            }
        );
    }

    #[test]
    fn test_stamp_uses_post_increment_clock() {
        let mut engine: DeliveryEngine<&str> = DeliveryEngine::new(1, 3).unwrap();

        let first = engine.stamp("a");
        let second = engine.stamp("b");

        assert_eq!(first.timestamp().as_slice(), &[0, 1, 0]);
        assert_eq!(second.timestamp().as_slice(), &[0, 2, 0]);
        assert_eq!(engine.clock().as_slice(), &[0, 2, 0]);
    }

    #[test]
    fn test_immediate_delivery() {
        let mut engine = DeliveryEngine::new(1, 3).unwrap();

        let receipt = engine.receive(msg(0, &[1, 0, 0], "Deposit $10,000")).unwrap();

        assert_eq!(payloads(&receipt), vec!["Deposit $10,000"]);
        assert!(!receipt.deliveries()[0].from_queue);
        assert_eq!(engine.clock().as_slice(), &[1, 0, 0]);
        assert_eq!(engine.pending_count(), 0);
    }

    #[test]
    fn test_held_back_leaves_clock_untouched() {
        let mut engine = DeliveryEngine::new(2, 3).unwrap();

        let receipt = engine.receive(msg(1, &[1, 1, 0], "Withdraw $10,000")).unwrap();

        assert!(receipt.is_held_back());
        assert_eq!(engine.clock().as_slice(), &[0, 0, 0]);
        assert_eq!(engine.pending_count(), 1);
        assert_eq!(engine.delivered_count(), 0);
    }

    #[test]
    fn test_delivery_unblocks_queued_chain() {
        let mut engine = DeliveryEngine::new(2, 3).unwrap();

        // node 1 saw two deposits from node 0 before withdrawing
        assert!(engine.receive(msg(1, &[2, 1, 0], "w")).unwrap().is_held_back());
        assert!(engine.receive(msg(0, &[2, 0, 0], "d2")).unwrap().is_held_back());

        let receipt = engine.receive(msg(0, &[1, 0, 0], "d1")).unwrap();

        assert_eq!(payloads(&receipt), vec!["d1", "d2", "w"]);
        assert!(receipt.deliveries()[1].from_queue);
        assert_eq!(engine.clock().as_slice(), &[2, 1, 0]);
        assert_eq!(engine.pending_count(), 0);
    }

    #[test]
    fn test_drain_is_idempotent() {
        let mut engine = DeliveryEngine::new(0, 3).unwrap();
        engine.receive(msg(1, &[0, 2, 0], "b2")).unwrap();
        engine.receive(msg(2, &[0, 2, 1], "c1")).unwrap();
        engine.receive(msg(1, &[0, 1, 0], "b1")).unwrap();

        let clock_before = engine.clock().clone();
        let pending_before = engine.pending_count();

        assert!(engine.drain().is_empty());
        assert_eq!(engine.clock(), &clock_before);
        assert_eq!(engine.pending_count(), pending_before);
    }

    #[test]
    fn test_duplicate_is_held_not_redelivered() {
        let mut engine = DeliveryEngine::new(1, 2).unwrap();
        engine.receive(msg(0, &[1, 0], "once")).unwrap();

        let receipt = engine.receive(msg(0, &[1, 0], "once")).unwrap();

        assert!(receipt.is_held_back());
        assert_eq!(engine.delivered_count(), 1);
        assert_eq!(engine.clock().as_slice(), &[1, 0]);
    }

    #[test]
    fn test_constructor_rejects_bad_ids() {
        assert_eq!(
            DeliveryEngine::<()>::new(0, 0).unwrap_err(),
            DeliveryError::EmptyGroup
        );
        assert_eq!(
            DeliveryEngine::<()>::new(3, 3).unwrap_err(),
            DeliveryError::NodeOutOfRange {
                index: 3,
                node_count: 3
            }
        );
    }

    #[test]
    fn test_contract_violations_do_not_touch_state() {
        let mut engine = DeliveryEngine::new(0, 3).unwrap();

        assert!(matches!(
            engine.receive(msg(5, &[0, 0, 0, 0, 0, 1], "x")),
            Err(DeliveryError::UnknownSender { sender: 5, .. })
        ));
        assert!(matches!(
            engine.receive(msg(1, &[0, 1], "x")),
            Err(DeliveryError::WidthMismatch {
                expected: 3,
                found: 2
            })
        ));
        assert_eq!(
            engine.receive(msg(0, &[1, 0, 0], "x")).unwrap_err(),
            DeliveryError::SelfDelivery { node: 0 }
        );
        assert!(matches!(
            engine.receive(msg(2, &[0, 0, 0], "x")),
            Err(DeliveryError::UnstampedMessage { sender: 2, .. })
        ));

        assert_eq!(engine.clock().as_slice(), &[0, 0, 0]);
        assert_eq!(engine.pending_count(), 0);
    }
}
