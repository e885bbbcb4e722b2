//! Object-broker binding and client.
//!
//! One call per frame, one reply per call. Coordinator errors come back as
//! fault envelopes; a frame that does not decode gets a `decode` fault and
//! the connection stays open.

use crate::config::{BrokerConfig, DEFAULT_MAX_FRAME_LEN};
use crate::error::{ServerError, ServerResult};
use crate::framing::{read_frame, write_frame};
use crate::listener::{self, ServeHandle};
use medsync_core::{CoreError, RecordService};
use medsync_protocol::{BrokerFault, BrokerReply, BrokerRequest, FaultKind, Record};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

const BINDING: &str = "broker";

/// Maps a core error onto a broker fault.
pub fn fault_from(err: &CoreError) -> BrokerFault {
    let kind = match err {
        CoreError::NotFound { .. } => FaultKind::NotFound,
        CoreError::Validation(_) => FaultKind::Validation,
        CoreError::Decode(_) => FaultKind::Decode,
        CoreError::PeerUnavailable { .. } => FaultKind::Internal,
    };
    BrokerFault::new(kind, err.to_string())
}

/// Dispatches broker calls to the coordinator.
pub struct ObjectBrokerBinding {
    service: Arc<dyn RecordService>,
    max_frame_len: usize,
}

impl ObjectBrokerBinding {
    /// Creates a binding.
    pub fn new(service: Arc<dyn RecordService>) -> Self {
        Self {
            service,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Binds and starts serving.
    pub async fn start(
        service: Arc<dyn RecordService>,
        config: &BrokerConfig,
    ) -> ServerResult<ServeHandle> {
        let listener = listener::bind(BINDING, config.bind_addr).await?;
        let binding = Arc::new(Self {
            service,
            max_frame_len: config.max_frame_len,
        });
        listener::serve(BINDING, listener, config.max_connections, move |stream, peer| {
            let binding = Arc::clone(&binding);
            async move { binding.serve_connection(stream, peer).await }
        })
    }

    async fn serve_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        loop {
            let frame = match read_frame(&mut stream, self.max_frame_len).await {
                Ok(Some(frame)) => frame,
                Ok(None) => return,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "closing broker connection");
                    return;
                }
            };
            let reply = self.handle_frame(&frame).await;
            if let Err(e) = write_frame(&mut stream, reply.encode().as_bytes()).await {
                debug!(peer = %peer, error = %e, "reply not delivered");
                return;
            }
        }
    }

    /// Decodes and answers one request frame.
    pub async fn handle_frame(&self, frame: &[u8]) -> BrokerReply {
        let request = std::str::from_utf8(frame)
            .map_err(|e| e.to_string())
            .and_then(|xml| BrokerRequest::decode(xml).map_err(|e| e.to_string()));
        match request {
            Ok(request) => self.dispatch(request).await,
            Err(message) => BrokerReply::Fault(BrokerFault::new(FaultKind::Decode, message)),
        }
    }

    /// Answers one decoded request.
    pub async fn dispatch(&self, request: BrokerRequest) -> BrokerReply {
        let service = &self.service;
        let result = match request {
            BrokerRequest::GetRecord { patient_id } => {
                service.get_record(&patient_id).await.map(BrokerReply::Record)
            }
            BrokerRequest::SyncRecord(record) => {
                service.sync_record(record).await.map(|_| BrokerReply::Done)
            }
            BrokerRequest::ReplicateRecord { origin, record } => service
                .replicate_record(record, &origin)
                .await
                .map(|_| BrokerReply::Done),
            BrokerRequest::RegisterNode { node_id, endpoint } => service
                .register_node(&node_id, &endpoint)
                .await
                .map(|_| BrokerReply::Done),
            BrokerRequest::UnregisterNode { node_id } => service
                .unregister_node(&node_id)
                .await
                .map(|_| BrokerReply::Done),
            BrokerRequest::IsAvailable => Ok(BrokerReply::Available(service.is_available().await)),
            BrokerRequest::NodeInfo => Ok(BrokerReply::Info(service.node_info().await)),
            BrokerRequest::ListPatients => Ok(BrokerReply::Patients(service.patient_ids().await)),
        };
        result.unwrap_or_else(|e| BrokerReply::Fault(fault_from(&e)))
    }
}

/// A client connection to a broker binding.
pub struct BrokerClient {
    stream: TcpStream,
    max_frame_len: usize,
}

impl BrokerClient {
    /// Connects, giving up after `timeout`.
    pub async fn connect(addr: &str, timeout: Duration) -> ServerResult<Self> {
        let stream = listener::connect(addr, timeout).await?;
        Ok(Self {
            stream,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        })
    }

    /// Performs one call. Faults are returned as [`ServerError::Fault`].
    pub async fn call(&mut self, request: &BrokerRequest) -> ServerResult<BrokerReply> {
        write_frame(&mut self.stream, request.encode().as_bytes()).await?;
        let frame = read_frame(&mut self.stream, self.max_frame_len)
            .await?
            .ok_or_else(|| ServerError::Frame("connection closed before reply".into()))?;
        let xml = std::str::from_utf8(&frame)
            .map_err(|_| ServerError::Frame("reply is not valid UTF-8".into()))?;
        match BrokerReply::decode(xml)? {
            BrokerReply::Fault(fault) => Err(ServerError::Fault(fault)),
            reply => Ok(reply),
        }
    }

    /// `getRecord`.
    pub async fn get_record(&mut self, patient_id: &str) -> ServerResult<Record> {
        let request = BrokerRequest::GetRecord {
            patient_id: patient_id.to_string(),
        };
        match self.call(&request).await? {
            BrokerReply::Record(record) => Ok(record),
            other => Err(unexpected(&other)),
        }
    }

    /// `syncRecord`.
    pub async fn sync_record(&mut self, record: &Record) -> ServerResult<()> {
        self.expect_done(&BrokerRequest::SyncRecord(record.clone())).await
    }

    /// `replicateRecord`: a push from peer `origin`, not forwarded further.
    pub async fn replicate_record(&mut self, origin: &str, record: &Record) -> ServerResult<()> {
        self.expect_done(&BrokerRequest::ReplicateRecord {
            origin: origin.to_string(),
            record: record.clone(),
        })
        .await
    }

    /// `registerNode`.
    pub async fn register_node(&mut self, node_id: &str, endpoint: &str) -> ServerResult<()> {
        self.expect_done(&BrokerRequest::RegisterNode {
            node_id: node_id.to_string(),
            endpoint: endpoint.to_string(),
        })
        .await
    }

    /// `unregisterNode`.
    pub async fn unregister_node(&mut self, node_id: &str) -> ServerResult<()> {
        self.expect_done(&BrokerRequest::UnregisterNode {
            node_id: node_id.to_string(),
        })
        .await
    }

    /// `isAvailable`.
    pub async fn is_available(&mut self) -> ServerResult<bool> {
        match self.call(&BrokerRequest::IsAvailable).await? {
            BrokerReply::Available(available) => Ok(available),
            other => Err(unexpected(&other)),
        }
    }

    /// `nodeInfo`.
    pub async fn node_info(&mut self) -> ServerResult<String> {
        match self.call(&BrokerRequest::NodeInfo).await? {
            BrokerReply::Info(info) => Ok(info),
            other => Err(unexpected(&other)),
        }
    }

    /// `listPatients`.
    pub async fn list_patients(&mut self) -> ServerResult<Vec<String>> {
        match self.call(&BrokerRequest::ListPatients).await? {
            BrokerReply::Patients(ids) => Ok(ids),
            other => Err(unexpected(&other)),
        }
    }

    async fn expect_done(&mut self, request: &BrokerRequest) -> ServerResult<()> {
        match self.call(request).await? {
            BrokerReply::Done => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(reply: &BrokerReply) -> ServerError {
    ServerError::Protocol(medsync_protocol::ProtocolError::UnexpectedReply(
        reply.encode(),
    ))
}
