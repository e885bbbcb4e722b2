//! Sync coordinator: local writes plus best-effort peer propagation.

use crate::config::{CoordinatorConfig, PropagationMode};
use crate::error::{CoreError, CoreResult};
use crate::peer::{PeerClient, PeerOutcome, PropagationReport};
use crate::registry::{NodeDescriptor, NodeRegistry};
use crate::service::RecordService;
use crate::store::RecordStore;
use async_trait::async_trait;
use futures::future::join_all;
use medsync_protocol::Record;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Owns the record store and node registry of one node.
///
/// A sync is acknowledged as soon as the local write completes. Propagation
/// afterwards is last-write-wins with no ordering between peers, so a late
/// push can overwrite a newer record on the receiving node.
///
/// Records reach peers through [`replicate_record`](Self::replicate_record),
/// which stores without fanning out again: a write travels one hop, to the
/// peers of the node that accepted it.
pub struct SyncCoordinator {
    config: CoordinatorConfig,
    store: RecordStore,
    registry: NodeRegistry,
    peers: Arc<dyn PeerClient>,
}

impl SyncCoordinator {
    /// Creates a coordinator with an empty store and registry.
    pub fn new(config: CoordinatorConfig, peers: Arc<dyn PeerClient>) -> Self {
        Self {
            config,
            store: RecordStore::new(),
            registry: NodeRegistry::new(),
            peers,
        }
    }

    /// This node's identity.
    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    /// The coordinator's configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Read access to the record store.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Read access to the node registry.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Returns the record stored for a patient.
    pub fn get_record(&self, patient_id: &str) -> CoreResult<Record> {
        self.store.get(patient_id)
    }

    /// Stores a record locally and pushes it to every peer except this node.
    pub async fn sync_record(&self, record: Record) -> CoreResult<PropagationReport> {
        let record = self.store_locally(record)?;
        let report = self.propagate(&record).await;

        if report.attempted() > 0 {
            info!(
                patient_id = %report.patient_id,
                attempted = report.attempted(),
                failed = report.failed(),
                "record propagated"
            );
        }
        Ok(report)
    }

    /// Stores a record pushed by a peer. Replicas are never forwarded.
    pub fn replicate_record(&self, record: Record, origin: &str) -> CoreResult<Record> {
        let stored = self.store_locally(record)?;
        debug!(patient_id = %stored.patient_id(), origin = %origin, "replica stored");
        Ok(stored)
    }

    /// Stores a record without propagating it.
    pub fn seed(&self, record: Record) -> CoreResult<Record> {
        self.store_locally(record)
    }

    fn store_locally(&self, record: Record) -> CoreResult<Record> {
        if record.patient_id().trim().is_empty() {
            return Err(CoreError::Validation("patientId must not be empty".into()));
        }
        let (stored, previous) = self.store.put_assigning_identity(record);
        debug!(
            patient_id = %stored.patient_id(),
            record_id = ?stored.record_id,
            replaced = previous.is_some(),
            "record stored"
        );
        Ok(stored)
    }

    async fn propagate(&self, record: &Record) -> PropagationReport {
        let targets: Vec<NodeDescriptor> = self
            .registry
            .list()
            .filter(|node| node.node_id != self.config.node_id)
            .collect();

        let outcomes = match self.config.propagation {
            PropagationMode::Concurrent => {
                join_all(targets.iter().map(|node| self.push_to(node, record))).await
            }
            PropagationMode::Sequential => {
                let mut outcomes = Vec::with_capacity(targets.len());
                for node in &targets {
                    outcomes.push(self.push_to(node, record).await);
                }
                outcomes
            }
        };

        PropagationReport {
            patient_id: record.patient_id().to_string(),
            outcomes,
        }
    }

    async fn push_to(&self, node: &NodeDescriptor, record: &Record) -> PeerOutcome {
        let start = Instant::now();
        let timeout = self.config.peer_timeout;
        let result = match tokio::time::timeout(timeout, self.peers.push(&node.endpoint, record)).await
        {
            Ok(result) => result,
            Err(_) => Err(CoreError::peer_unavailable(
                node.endpoint.as_str(),
                format!("timed out after {}ms", timeout.as_millis()),
            )),
        };
        let latency = start.elapsed();

        match result {
            Ok(()) => {
                debug!(
                    node_id = %node.node_id,
                    endpoint = %node.endpoint,
                    latency_ms = latency.as_millis() as u64,
                    "peer accepted record"
                );
                PeerOutcome {
                    node_id: node.node_id.clone(),
                    endpoint: node.endpoint.clone(),
                    success: true,
                    error: None,
                    latency,
                }
            }
            Err(e) => {
                warn!(
                    node_id = %node.node_id,
                    endpoint = %node.endpoint,
                    error = %e,
                    "peer push failed"
                );
                PeerOutcome {
                    node_id: node.node_id.clone(),
                    endpoint: node.endpoint.clone(),
                    success: false,
                    error: Some(e.to_string()),
                    latency,
                }
            }
        }
    }

    /// Adds or updates a peer.
    pub fn register_node(&self, node_id: &str, endpoint: &str) -> CoreResult<()> {
        if node_id.trim().is_empty() {
            return Err(CoreError::Validation("nodeId must not be empty".into()));
        }
        self.registry.register(node_id, endpoint);
        info!(node_id = %node_id, endpoint = %endpoint, "node registered");
        Ok(())
    }

    /// Removes a peer. Unknown ids are ignored.
    pub fn unregister_node(&self, node_id: &str) {
        self.registry.unregister(node_id);
        info!(node_id = %node_id, "node unregistered");
    }

    /// Always true once constructed.
    pub fn is_available(&self) -> bool {
        true
    }

    /// Status summary with record and peer counts.
    pub fn node_info(&self) -> String {
        format!(
            "Node {} - Registered Records: {}, Connected Nodes: {}",
            self.config.node_id,
            self.store.count(),
            self.registry.count()
        )
    }

    /// Sorted ids of all stored patients.
    pub fn patient_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.store.snapshot().map(|(id, _)| id).collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl RecordService for SyncCoordinator {
    async fn get_record(&self, patient_id: &str) -> CoreResult<Record> {
        SyncCoordinator::get_record(self, patient_id)
    }

    async fn sync_record(&self, record: Record) -> CoreResult<PropagationReport> {
        SyncCoordinator::sync_record(self, record).await
    }

    async fn replicate_record(&self, record: Record, origin: &str) -> CoreResult<()> {
        SyncCoordinator::replicate_record(self, record, origin).map(|_| ())
    }

    async fn register_node(&self, node_id: &str, endpoint: &str) -> CoreResult<()> {
        SyncCoordinator::register_node(self, node_id, endpoint)
    }

    async fn unregister_node(&self, node_id: &str) -> CoreResult<()> {
        SyncCoordinator::unregister_node(self, node_id);
        Ok(())
    }

    async fn is_available(&self) -> bool {
        SyncCoordinator::is_available(self)
    }

    async fn node_info(&self) -> String {
        SyncCoordinator::node_info(self)
    }

    async fn patient_ids(&self) -> Vec<String> {
        SyncCoordinator::patient_ids(self)
    }
}
