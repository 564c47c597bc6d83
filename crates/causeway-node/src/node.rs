//! Thread-safe causal broadcast node.
//!
//! A [`Node`] owns one [`DeliveryEngine`] behind a single mutex. Every
//! `send` and `receive` runs entirely inside that critical section, so the
//! clock read, the delivery check, the queue mutation, the clock update and
//! the drain appear atomic to other callers on the same node. Nodes share
//! nothing with each other.

use crate::config::NodeConfig;
use crate::error::Result;
use crate::event::NodeEvent;
use causeway_clock::{NodeIndex, VectorClock};
use causeway_delivery::{DeliveryEngine, Message, Receipt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Shared handle to a node.
pub type NodeHandle<P> = Arc<Node<P>>;

/// What a `receive` call did with the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Delivered, together with `count - 1` messages it unblocked.
    Delivered { count: usize },
    /// Parked until its dependencies arrive.
    HeldBack,
}

/// A group member with its own clock and hold-back queue.
pub struct Node<P> {
    id: NodeIndex,
    engine: Mutex<DeliveryEngine<P>>,
    event_tx: broadcast::Sender<NodeEvent<P>>,
}

impl<P: Clone> Node<P> {
    /// Create node `id` of a group of `node_count` nodes.
    pub fn new(id: NodeIndex, node_count: usize, config: &NodeConfig) -> Result<NodeHandle<P>> {
        config.validate()?;
        let engine = DeliveryEngine::new(id, node_count)?;
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        info!(node = id, node_count, "created node");

        Ok(Arc::new(Self {
            id,
            engine: Mutex::new(engine),
            event_tx,
        }))
    }

    pub fn id(&self) -> NodeIndex {
        self.id
    }

    /// Group size.
    pub fn node_count(&self) -> usize {
        self.engine.lock().node_count()
    }

    /// Subscribe to hold-back and delivery events.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent<P>> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the local clock.
    pub fn clock(&self) -> VectorClock {
        self.engine.lock().clock().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.engine.lock().pending_count()
    }

    /// Held-back messages from one sender.
    pub fn pending_from(&self, sender: NodeIndex) -> usize {
        self.engine.lock().pending().count_from(sender)
    }

    pub fn delivered_count(&self) -> u64 {
        self.engine.lock().delivered_count()
    }

    /// Record a send event and return the stamped message for fan-out.
    pub fn send(&self, payload: P) -> Message<P> {
        let message = self.engine.lock().stamp(payload);
        debug!(node = self.id, timestamp = %message.timestamp(), "sending message");
        message
    }

    /// Hand a message from another node to this node.
    ///
    /// Fails only on contract violations, in which case nothing changed.
    pub fn receive(&self, message: Message<P>) -> Result<ReceiveOutcome> {
        let mut engine = self.engine.lock();

        // Only keep a copy for the hold-back event if someone listens.
        let observed = (self.event_tx.receiver_count() > 0).then(|| message.clone());

        let outcome = match engine.receive(message)? {
            Receipt::HeldBack(reason) => {
                if let Some(message) = observed {
                    let sender = message.sender();
                    let timestamp = message.timestamp().clone();
                    let _ = self.event_tx.send(NodeEvent::HeldBack {
                        node: self.id,
                        sender,
                        timestamp,
                        payload: message.into_payload(),
                        reason,
                    });
                }
                ReceiveOutcome::HeldBack
            }
            Receipt::Delivered(deliveries) => {
                let count = deliveries.len();
                for delivery in deliveries {
                    let sender = delivery.message.sender();
                    let timestamp = delivery.message.timestamp().clone();
                    let _ = self.event_tx.send(NodeEvent::Delivered {
                        node: self.id,
                        sender,
                        timestamp,
                        payload: delivery.message.into_payload(),
                        from_queue: delivery.from_queue,
                    });
                }
                ReceiveOutcome::Delivered { count }
            }
        };

        drop(engine);
        Ok(outcome)
    }
}

impl<P> std::fmt::Debug for Node<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use causeway_delivery::DeliveryError;

    fn node(id: NodeIndex, n: usize) -> NodeHandle<String> {
        Node::new(id, n, &NodeConfig::default()).unwrap()
    }

    #[test]
    fn test_node_creation() {
        let n = node(2, 3);
        assert_eq!(n.id(), 2);
        assert_eq!(n.node_count(), 3);
        assert_eq!(n.clock().as_slice(), &[0, 0, 0]);
        assert_eq!(n.pending_count(), 0);
    }

    #[test]
    fn test_node_creation_out_of_range() {
        let err = Node::<String>::new(3, 3, &NodeConfig::default()).unwrap_err();
        assert_eq!(
            err,
            NodeError::Delivery(DeliveryError::NodeOutOfRange {
                index: 3,
                node_count: 3
            })
        );
    }

    #[test]
    fn test_send_then_receive() {
        let bank0 = node(0, 3);
        let bank1 = node(1, 3);

        let deposit = bank0.send("Deposit $10,000".to_string());
        assert_eq!(deposit.timestamp().as_slice(), &[1, 0, 0]);
        assert_eq!(bank0.clock().as_slice(), &[1, 0, 0]);

        let outcome = bank1.receive(deposit).unwrap();
        assert_eq!(outcome, ReceiveOutcome::Delivered { count: 1 });
        assert_eq!(bank1.clock().as_slice(), &[1, 0, 0]);
        assert_eq!(bank1.delivered_count(), 1);
    }

    #[tokio::test]
    async fn test_events_in_delivery_order() {
        let bank0 = node(0, 3);
        let bank1 = node(1, 3);
        let bank2 = node(2, 3);
        let mut events = bank2.subscribe();

        let deposit = bank0.send("Deposit $10,000".to_string());
        bank1.receive(deposit.clone()).unwrap();
        let withdraw = bank1.send("Withdraw $10,000".to_string());

        assert_eq!(bank2.receive(withdraw).unwrap(), ReceiveOutcome::HeldBack);
        assert_eq!(
            bank2.receive(deposit).unwrap(),
            ReceiveOutcome::Delivered { count: 2 }
        );

        let held = events.recv().await.unwrap();
        assert!(!held.is_delivery());
        assert_eq!(held.sender(), 1);

        let first = events.recv().await.unwrap();
        assert!(matches!(first, NodeEvent::Delivered { from_queue: false, .. }));
        assert_eq!(first.payload(), "Deposit $10,000");

        let second = events.recv().await.unwrap();
        assert!(matches!(second, NodeEvent::Delivered { from_queue: true, .. }));
        assert_eq!(second.payload(), "Withdraw $10,000");
        assert_eq!(second.timestamp().as_slice(), &[1, 1, 0]);
        assert_eq!(second.node(), 2);
    }

    #[test]
    fn test_pending_from_counts_per_sender() {
        let bank2 = node(2, 3);

        bank2
            .receive(Message::new(0, VectorClock::from(vec![2, 0, 0]), "d2".to_string()))
            .unwrap();
        bank2
            .receive(Message::new(1, VectorClock::from(vec![2, 1, 0]), "w".to_string()))
            .unwrap();
        bank2
            .receive(Message::new(0, VectorClock::from(vec![3, 0, 0]), "d3".to_string()))
            .unwrap();

        assert_eq!(bank2.pending_count(), 3);
        assert_eq!(bank2.pending_from(0), 2);
        assert_eq!(bank2.pending_from(1), 1);
        assert_eq!(bank2.pending_from(2), 0);

        bank2
            .receive(Message::new(0, VectorClock::from(vec![1, 0, 0]), "d1".to_string()))
            .unwrap();
        assert_eq!(bank2.pending_from(0), 0);
        assert_eq!(bank2.pending_from(1), 0);
    }

    #[test]
    fn test_receive_rejects_own_message() {
        let bank0 = node(0, 2);
        let msg = bank0.send("loopback".to_string());

        let err = bank0.receive(msg).unwrap_err();
        assert_eq!(err, NodeError::Delivery(DeliveryError::SelfDelivery { node: 0 }));
        assert_eq!(bank0.pending_count(), 0);
    }

    #[test]
    fn test_zero_event_capacity_rejected() {
        let config = NodeConfig { event_capacity: 0 };
        assert!(matches!(
            Node::<String>::new(0, 1, &config),
            Err(NodeError::InvalidConfig(_))
        ));
    }
}
