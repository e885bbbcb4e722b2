//! Multi-node propagation without a network.

use async_trait::async_trait;
use medsync_core::{
    CoordinatorConfig, CoreError, CoreResult, PeerClient, PropagationMode, RecordService,
    SyncCoordinator,
};
use medsync_protocol::Record;
use medsync_testkit::record_for;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-process nodes addressed as `mem://<id>`.
#[derive(Default)]
struct Mesh {
    nodes: RwLock<HashMap<String, Arc<SyncCoordinator>>>,
    deliveries: AtomicUsize,
}

/// Delivers one node's pushes to the others in its mesh.
struct MeshClient {
    origin: String,
    mesh: Arc<Mesh>,
}

#[async_trait]
impl PeerClient for MeshClient {
    async fn push(&self, endpoint: &str, record: &Record) -> CoreResult<()> {
        let node = self
            .mesh
            .nodes
            .read()
            .get(endpoint)
            .cloned()
            .ok_or_else(|| CoreError::peer_unavailable(endpoint, "no such node"))?;
        self.mesh.deliveries.fetch_add(1, Ordering::SeqCst);
        node.replicate_record(record.clone(), &self.origin).map(|_| ())
    }
}

fn node(id: &str, mesh: &Arc<Mesh>) -> Arc<SyncCoordinator> {
    let config = CoordinatorConfig::new(id).with_peer_timeout(Duration::from_secs(1));
    let client = MeshClient {
        origin: id.to_string(),
        mesh: Arc::clone(mesh),
    };
    let node = Arc::new(SyncCoordinator::new(config, Arc::new(client)));
    mesh.nodes
        .write()
        .insert(format!("mem://{id}"), Arc::clone(&node));
    node
}

#[tokio::test]
async fn record_travels_one_hop() {
    let mesh = Arc::new(Mesh::default());
    let a = node("A", &mesh);
    let b = node("B", &mesh);
    let c = node("C", &mesh);
    a.register_node("B", "mem://B").unwrap();
    b.register_node("C", "mem://C").unwrap();

    let record = record_for("PAT100");
    let report = a.sync_record(record.clone()).await.unwrap();
    assert!(report.all_succeeded());

    assert_eq!(b.get_record("PAT100").unwrap(), record);
    assert!(c.get_record("PAT100").unwrap_err().is_not_found());
    assert_eq!(mesh.deliveries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mutual_peers_exchange_each_write_once() {
    let mesh = Arc::new(Mesh::default());
    let a = node("A", &mesh);
    let b = node("B", &mesh);
    a.register_node("B", "mem://B").unwrap();
    b.register_node("A", "mem://A").unwrap();

    let report = a.sync_record(record_for("PAT1")).await.unwrap();
    assert!(report.all_succeeded());
    assert_eq!(mesh.deliveries.load(Ordering::SeqCst), 1);

    let mut newer = record_for("PAT1");
    newer.patient.first_name = "Marker".into();
    b.sync_record(newer.clone()).await.unwrap();
    assert_eq!(mesh.deliveries.load(Ordering::SeqCst), 2);
    assert_eq!(a.get_record("PAT1").unwrap(), newer);
    assert_eq!(b.get_record("PAT1").unwrap(), newer);
}

#[tokio::test]
async fn fan_out_reaches_every_peer_once() {
    let mesh = Arc::new(Mesh::default());
    let hub = node("HUB", &mesh);
    let leaves: Vec<_> = ["L1", "L2", "L3"].iter().map(|id| node(id, &mesh)).collect();
    for id in ["L1", "L2", "L3"] {
        hub.register_node(id, &format!("mem://{id}")).unwrap();
    }

    let report = hub.sync_record(record_for("PAT7")).await.unwrap();
    assert_eq!(report.attempted(), 3);
    for leaf in &leaves {
        assert_eq!(leaf.patient_ids(), vec!["PAT7"]);
    }
}

#[tokio::test]
async fn missing_peer_does_not_block_others() {
    let mesh = Arc::new(Mesh::default());
    let config = CoordinatorConfig::new("A").with_propagation(PropagationMode::Sequential);
    let client = MeshClient {
        origin: "A".to_string(),
        mesh: Arc::clone(&mesh),
    };
    let a = Arc::new(SyncCoordinator::new(config, Arc::new(client)));
    let b = node("B", &mesh);
    a.register_node("GONE", "mem://GONE").unwrap();
    a.register_node("B", "mem://B").unwrap();

    let report = a.sync_record(record_for("PAT8")).await.unwrap();
    assert_eq!(report.failed_node_ids(), vec!["GONE"]);
    assert!(b.get_record("PAT8").is_ok());
}

#[tokio::test]
async fn service_trait_object_sees_same_state() {
    let mesh = Arc::new(Mesh::default());
    let a = node("A", &mesh);
    let service: Arc<dyn RecordService> = a.clone();

    service.sync_record(record_for("PAT9")).await.unwrap();
    service.register_node("B", "mem://B").await.unwrap();
    assert_eq!(a.patient_ids(), vec!["PAT9"]);
    assert_eq!(
        service.node_info().await,
        "Node A - Registered Records: 1, Connected Nodes: 1"
    );
}
