//! Peer node registry.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A known peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    /// Unique node identifier.
    pub node_id: String,
    /// Opaque connection string, interpreted by the peer client.
    pub endpoint: String,
    /// When the node was last registered.
    pub registered_at: DateTime<Utc>,
}

/// Concurrency-safe map from node id to descriptor.
///
/// The registry does no liveness checking and entries never expire.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<HashMap<String, NodeDescriptor>>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node, overwriting any previous endpoint.
    pub fn register(&self, node_id: impl Into<String>, endpoint: impl Into<String>) {
        let node_id = node_id.into();
        let descriptor = NodeDescriptor {
            node_id: node_id.clone(),
            endpoint: endpoint.into(),
            registered_at: Utc::now(),
        };
        self.nodes.write().insert(node_id, descriptor);
    }

    /// Removes a node. Unknown ids are ignored.
    pub fn unregister(&self, node_id: &str) {
        self.nodes.write().remove(node_id);
    }

    /// Returns the descriptor for a node, if registered.
    pub fn get(&self, node_id: &str) -> Option<NodeDescriptor> {
        self.nodes.read().get(node_id).cloned()
    }

    /// Point-in-time copy of all descriptors, ordered by node id.
    pub fn list(&self) -> impl Iterator<Item = NodeDescriptor> {
        let mut nodes: Vec<NodeDescriptor> = self.nodes.read().values().cloned().collect();
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        nodes.into_iter()
    }

    /// Number of registered nodes.
    pub fn count(&self) -> usize {
        self.nodes.read().len()
    }
}
