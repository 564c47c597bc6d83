//! Node and simulated network configuration.

use crate::error::{NodeError, Result};
use rand::Rng;
use std::time::Duration;

/// Configuration for a single node.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Capacity of the event broadcast channel. Slow subscribers lag
    /// once this many events are buffered.
    pub event_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            event_capacity: 100,
        }
    }
}

impl NodeConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(NodeError::InvalidConfig(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for node configuration.
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: NodeConfig::default(),
        }
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> NodeConfig {
        self.config
    }
}

impl Default for NodeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulated transmission delay for delayed fan-out.
///
/// Every recipient of a delayed multicast waits an independent, uniformly
/// drawn delay in `[min_delay_ms, max_delay_ms]` before the message is
/// handed to it, which is what produces out-of-order arrivals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Seed for the delay generator; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl NetworkConfig {
    /// No delay at all.
    pub fn instant() -> Self {
        Self::default()
    }

    /// Uniform delay between `min_ms` and `max_ms`.
    pub fn jittery(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_delay_ms: min_ms,
            max_delay_ms: max_ms,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(NodeError::InvalidConfig(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Draw one transmission delay.
    pub fn sample_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max_delay_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(self.min_delay_ms..=self.max_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_node_config_builder() {
        let config = NodeConfigBuilder::new().event_capacity(512).build();
        assert_eq!(config.event_capacity, 512);
        assert!(config.validate().is_ok());

        let config = NodeConfigBuilder::new().event_capacity(0).build();
        assert!(matches!(config.validate(), Err(NodeError::InvalidConfig(_))));
    }

    #[test]
    fn test_network_config_delay_bounds() {
        let config = NetworkConfig::jittery(5, 20).with_seed(7);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let delay = config.sample_delay(&mut rng);
            assert!(delay >= Duration::from_millis(5));
            assert!(delay <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_network_config_validation() {
        assert!(NetworkConfig::instant().validate().is_ok());
        assert!(NetworkConfig::jittery(30, 10).validate().is_err());
        assert_eq!(
            NetworkConfig::instant().sample_delay(&mut StdRng::seed_from_u64(1)),
            Duration::ZERO
        );
    }
}
