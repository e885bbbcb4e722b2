//! Peer push abstraction and propagation reports.

use crate::error::CoreResult;
use async_trait::async_trait;
use medsync_protocol::Record;
use std::time::Duration;

/// Dials a peer and hands it a record to store as a replica.
///
/// Implementations interpret the endpoint string; an endpoint they cannot
/// handle is a [`CoreError::PeerUnavailable`](crate::CoreError::PeerUnavailable).
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Pushes `record` to the node at `endpoint`.
    async fn push(&self, endpoint: &str, record: &Record) -> CoreResult<()>;
}

/// Result of one propagation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerOutcome {
    /// Target node.
    pub node_id: String,
    /// Endpoint that was dialed.
    pub endpoint: String,
    /// Whether the push succeeded.
    pub success: bool,
    /// Error message if it failed.
    pub error: Option<String>,
    /// Time spent on the attempt.
    pub latency: Duration,
}

/// Per-peer outcomes of one sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Patient whose record was propagated.
    pub patient_id: String,
    /// One entry per attempted peer, in registry order.
    pub outcomes: Vec<PeerOutcome>,
}

impl PropagationReport {
    /// Number of peers attempted.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of successful pushes.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    /// Number of failed pushes.
    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    /// Returns true if every attempted peer accepted the record.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    /// Ids of peers that failed.
    pub fn failed_node_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.node_id.as_str())
            .collect()
    }
}
