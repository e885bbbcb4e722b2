//! The record service capability shared by every transport binding.

use crate::error::CoreResult;
use crate::peer::PropagationReport;
use async_trait::async_trait;
use medsync_protocol::Record;

/// Operations a node exposes, independent of wire format.
///
/// [`SyncCoordinator`](crate::SyncCoordinator) is the implementation; transport
/// bindings hold an `Arc<dyn RecordService>` and only translate framing.
#[async_trait]
pub trait RecordService: Send + Sync {
    /// Returns the record stored for a patient.
    async fn get_record(&self, patient_id: &str) -> CoreResult<Record>;

    /// Stores a record locally, then pushes it to known peers.
    ///
    /// Succeeds once the local write is done; peer failures only show up in
    /// the returned report.
    async fn sync_record(&self, record: Record) -> CoreResult<PropagationReport>;

    /// Stores a record pushed by peer `origin`, without pushing it on.
    async fn replicate_record(&self, record: Record, origin: &str) -> CoreResult<()>;

    /// Adds or updates a peer.
    async fn register_node(&self, node_id: &str, endpoint: &str) -> CoreResult<()>;

    /// Removes a peer. Unknown ids are ignored.
    async fn unregister_node(&self, node_id: &str) -> CoreResult<()>;

    /// Local liveness.
    async fn is_available(&self) -> bool;

    /// Status line with the record and peer counts.
    async fn node_info(&self) -> String;

    /// Sorted ids of all stored patients.
    async fn patient_ids(&self) -> Vec<String>;
}
