//! Fixed-size group of nodes with simulated fan-out.
//!
//! The cluster is the driver side of the protocol: it asks a node to send,
//! then hands the stamped message to each recipient, either synchronously
//! in a fixed order or through delayed tokio tasks that let messages
//! overtake each other.

use crate::config::{NetworkConfig, NodeConfig};
use crate::error::{NodeError, Result};
use crate::node::{Node, NodeHandle, ReceiveOutcome};
use causeway_clock::{NodeIndex, VectorClock};
use causeway_delivery::{DeliveryError, Message};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// A group of nodes created together.
pub struct Cluster<P> {
    nodes: Vec<NodeHandle<P>>,
    network: NetworkConfig,
    rng: Mutex<StdRng>,
    in_flight: Mutex<JoinSet<Result<ReceiveOutcome>>>,
}

impl<P: Clone + Send + 'static> Cluster<P> {
    /// Create `size` nodes with ids `0..size`.
    pub fn new(size: usize, node_config: NodeConfig, network: NetworkConfig) -> Result<Self> {
        network.validate()?;

        let nodes = (0..size)
            .map(|id| Node::new(id, size, &node_config))
            .collect::<Result<Vec<_>>>()?;

        let rng = match network.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            nodes,
            network,
            rng: Mutex::new(rng),
            in_flight: Mutex::new(JoinSet::new()),
        })
    }

    /// Get a node by index.
    pub fn node(&self, index: NodeIndex) -> Result<&NodeHandle<P>> {
        self.nodes.get(index).ok_or(NodeError::NodeNotFound {
            index,
            size: self.nodes.len(),
        })
    }

    pub fn nodes(&self) -> &[NodeHandle<P>] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node except `from`.
    pub fn peers_of(&self, from: NodeIndex) -> Vec<NodeIndex> {
        (0..self.nodes.len()).filter(|&i| i != from).collect()
    }

    /// Send from `from` and hand the message to each recipient in order.
    pub fn multicast(
        &self,
        from: NodeIndex,
        payload: P,
        recipients: &[NodeIndex],
    ) -> Result<Message<P>> {
        let targets = self.resolve(from, recipients)?;
        let message = self.node(from)?.send(payload);

        for target in targets {
            target.receive(message.clone())?;
        }
        Ok(message)
    }

    /// Send from `from` to every other node.
    pub fn broadcast(&self, from: NodeIndex, payload: P) -> Result<Message<P>> {
        let recipients = self.peers_of(from);
        self.multicast(from, payload, &recipients)
    }

    /// Hand an already-stamped message to one node.
    pub fn deliver(&self, to: NodeIndex, message: Message<P>) -> Result<ReceiveOutcome> {
        self.node(to)?.receive(message)
    }

    /// Send from `from` and hand the message to each recipient after an
    /// independent random delay.
    ///
    /// Must be called from within a Tokio runtime. Use [`Cluster::settle`]
    /// to wait for the spawned transmissions.
    pub fn multicast_delayed(
        &self,
        from: NodeIndex,
        payload: P,
        recipients: &[NodeIndex],
    ) -> Result<Message<P>> {
        let targets = self.resolve(from, recipients)?;
        let message = self.node(from)?.send(payload);

        for target in targets {
            self.schedule(target, message.clone());
        }

        Ok(message)
    }

    /// Hand an already-stamped message to one node after a random delay.
    ///
    /// Same runtime requirement as [`Cluster::multicast_delayed`].
    pub fn deliver_delayed(&self, to: NodeIndex, message: Message<P>) -> Result<()> {
        let target = self.node(to)?;
        self.schedule(target, message);
        Ok(())
    }

    /// Delayed send to every other node.
    pub fn broadcast_delayed(&self, from: NodeIndex, payload: P) -> Result<Message<P>> {
        let recipients = self.peers_of(from);
        self.multicast_delayed(from, payload, &recipients)
    }

    /// Wait for every scheduled transmission to be received.
    ///
    /// Returns how many receives completed. Transmissions scheduled while
    /// waiting are awaited too.
    pub async fn settle(&self) -> Result<usize> {
        let mut completed = 0;
        let mut first_error = None;

        loop {
            let mut batch = std::mem::take(&mut *self.in_flight.lock());
            if batch.is_empty() {
                break;
            }

            while let Some(joined) = batch.join_next().await {
                let outcome = joined
                    .map_err(|e| NodeError::TaskFailed(e.to_string()))
                    .and_then(|received| received);
                match outcome {
                    Ok(_) => completed += 1,
                    Err(e) => {
                        warn!(error = %e, "transmission failed");
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(completed),
        }
    }

    /// True if no node holds back any message.
    pub fn is_quiescent(&self) -> bool {
        self.nodes.iter().all(|n| n.pending_count() == 0)
    }

    /// True if every node has the same clock.
    pub fn is_converged(&self) -> bool {
        let clocks = self.clocks();
        clocks.windows(2).all(|w| w[0] == w[1])
    }

    /// Snapshot of every node's clock.
    pub fn clocks(&self) -> Vec<VectorClock> {
        self.nodes.iter().map(|n| n.clock()).collect()
    }

    fn schedule(&self, target: &NodeHandle<P>, message: Message<P>) {
        let delay = self.network.sample_delay(&mut *self.rng.lock());
        let target = Arc::clone(target);

        debug!(from = message.sender(), to = target.id(), ?delay, "scheduling transmission");
        self.in_flight.lock().spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            target.receive(message)
        });
    }

    /// Check a recipient list before anything is sent: unknown, repeated
    /// and self-addressed recipients are rejected.
    fn resolve(&self, from: NodeIndex, recipients: &[NodeIndex]) -> Result<Vec<&NodeHandle<P>>> {
        self.node(from)?;

        let mut seen = vec![false; self.nodes.len()];
        let mut targets = Vec::with_capacity(recipients.len());
        for &index in recipients {
            let target = self.node(index)?;
            if index == from {
                return Err(DeliveryError::SelfDelivery { node: from }.into());
            }
            if std::mem::replace(&mut seen[index], true) {
                return Err(NodeError::DuplicateRecipient { index });
            }
            targets.push(target);
        }
        Ok(targets)
    }
}

impl<P> std::fmt::Debug for Cluster<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("nodes", &self.nodes.len())
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}
