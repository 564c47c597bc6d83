//! Hold-back queue for messages that arrived ahead of their causal history.
//!
//! The queue keeps arrival order so that scans are deterministic, but it
//! carries no ordering semantics of its own: the delivery engine decides
//! what may leave the queue by re-evaluating the causal predicate.

use crate::message::Message;
use causeway_clock::NodeIndex;

/// Buffer of received but not yet deliverable messages.
#[derive(Debug, Clone)]
pub struct HoldBackQueue<P> {
    messages: Vec<Message<P>>,
}

impl<P> HoldBackQueue<P> {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Park a message.
    pub fn insert(&mut self, message: Message<P>) {
        self.messages.push(message);
    }

    /// Remove and return the oldest message matching `eligible`.
    pub fn take_first<F>(&mut self, mut eligible: F) -> Option<Message<P>>
    where
        F: FnMut(&Message<P>) -> bool,
    {
        let pos = self.messages.iter().position(|m| eligible(m))?;
        Some(self.messages.remove(pos))
    }

    /// Number of held messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Held messages in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Message<P>> {
        self.messages.iter()
    }

    /// Number of held messages from one sender.
    pub fn count_from(&self, sender: NodeIndex) -> usize {
        self.messages.iter().filter(|m| m.sender() == sender).count()
    }
}

impl<P> Default for HoldBackQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}
