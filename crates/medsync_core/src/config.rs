//! Configuration for the sync coordinator.

use std::time::Duration;

/// How a sync fans out to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagationMode {
    /// Push to all peers at once.
    #[default]
    Concurrent,
    /// Push to one peer at a time, in registry order.
    Sequential,
}

/// Configuration for a [`SyncCoordinator`](crate::SyncCoordinator).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// This node's identity. Peers registered under it are never pushed to.
    pub node_id: String,
    /// Upper bound on a single peer push.
    pub peer_timeout: Duration,
    /// Fan-out strategy.
    pub propagation: PropagationMode,
}

impl CoordinatorConfig {
    /// Creates a configuration for the given node.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            peer_timeout: Duration::from_secs(5),
            propagation: PropagationMode::Concurrent,
        }
    }

    /// Sets the per-peer timeout.
    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    /// Sets the fan-out strategy.
    pub fn with_propagation(mut self, mode: PropagationMode) -> Self {
        self.propagation = mode;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new("node-1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_config_builder() {
        let config = CoordinatorConfig::new("hospital-a")
            .with_peer_timeout(Duration::from_millis(250))
            .with_propagation(PropagationMode::Sequential);

        assert_eq!(config.node_id, "hospital-a");
        assert_eq!(config.peer_timeout, Duration::from_millis(250));
        assert_eq!(config.propagation, PropagationMode::Sequential);
    }

    #[test]
    fn defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.peer_timeout, Duration::from_secs(5));
        assert_eq!(config.propagation, PropagationMode::Concurrent);
    }
}
