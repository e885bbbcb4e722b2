//! Registry invocation binding.
//!
//! A name registry listens on its own port and maps service names to broker
//! endpoints. A node publishes its broker binding under a service name; a
//! [`RegistryClient`] locates the registry, looks the name up, checks
//! availability and joins the node's peer set, all over the network.
//!
//! The first node started against a free registry address hosts the
//! registry. Nodes started later against the same address bind into it.

use crate::broker::BrokerClient;
use crate::config::{RegistryConfig, DEFAULT_MAX_FRAME_LEN};
use crate::error::{ServerError, ServerResult};
use crate::framing::{read_frame, write_frame};
use crate::listener::{self, ServeHandle};
use crate::peer::Endpoint;
use chrono::Utc;
use medsync_protocol::{BrokerFault, FaultKind, NameReply, NameRequest, ProtocolError, Record};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

const BINDING: &str = "registry";

const MAX_REGISTRY_CONNECTIONS: usize = 256;

/// Service names and the broker endpoints bound under them.
#[derive(Default)]
pub struct NameRegistry {
    services: RwLock<HashMap<String, String>>,
}

impl NameRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes an endpoint. Fails if the name is taken.
    pub fn bind(&self, name: &str, endpoint: &str) -> ServerResult<()> {
        let mut services = self.services.write();
        if services.contains_key(name) {
            return Err(ServerError::NameBound(name.to_string()));
        }
        services.insert(name.to_string(), endpoint.to_string());
        Ok(())
    }

    /// Withdraws a name. Fails if nothing is bound under it.
    pub fn unbind(&self, name: &str) -> ServerResult<()> {
        self.services
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ServerError::NameNotBound(name.to_string()))
    }

    /// Resolves a name to its endpoint.
    pub fn lookup(&self, name: &str) -> ServerResult<String> {
        self.services
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ServerError::NameNotBound(name.to_string()))
    }

    /// Bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Answers one request.
    pub fn handle(&self, request: NameRequest) -> NameReply {
        let result = match request {
            NameRequest::Bind { name, endpoint } => {
                self.bind(&name, &endpoint).map(|_| NameReply::Done)
            }
            NameRequest::Unbind { name } => self.unbind(&name).map(|_| NameReply::Done),
            NameRequest::Lookup { name } => self.lookup(&name).map(NameReply::Endpoint),
            NameRequest::List => Ok(NameReply::Names(self.names())),
        };
        result.unwrap_or_else(|e| {
            let kind = match e {
                ServerError::NameNotBound(_) => FaultKind::NotFound,
                ServerError::NameBound(_) => FaultKind::Validation,
                _ => FaultKind::Internal,
            };
            NameReply::Fault(BrokerFault::new(kind, e.to_string()))
        })
    }

    /// Binds `addr` and serves this registry on it.
    pub async fn start(self: Arc<Self>, addr: SocketAddr) -> ServerResult<ServeHandle> {
        let listener = listener::bind(BINDING, addr).await?;
        self.serve(listener)
    }

    fn serve(self: Arc<Self>, listener: TcpListener) -> ServerResult<ServeHandle> {
        listener::serve(BINDING, listener, MAX_REGISTRY_CONNECTIONS, move |stream, peer| {
            let registry = Arc::clone(&self);
            async move { registry.serve_connection(stream, peer).await }
        })
    }

    async fn serve_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        loop {
            let frame = match read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN).await {
                Ok(Some(frame)) => frame,
                Ok(None) => return,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "closing registry connection");
                    return;
                }
            };
            let request = std::str::from_utf8(&frame)
                .map_err(|e| e.to_string())
                .and_then(|xml| NameRequest::decode(xml).map_err(|e| e.to_string()));
            let reply = match request {
                Ok(request) => self.handle(request),
                Err(message) => NameReply::Fault(BrokerFault::new(FaultKind::Decode, message)),
            };
            if let Err(e) = write_frame(&mut stream, reply.encode().as_bytes()).await {
                debug!(peer = %peer, error = %e, "reply not delivered");
                return;
            }
        }
    }
}

/// A connection to a name registry.
pub struct NameClient {
    stream: TcpStream,
}

impl NameClient {
    /// Locates the registry at `addr`, giving up after `timeout`.
    pub async fn connect(addr: &str, timeout: Duration) -> ServerResult<Self> {
        Ok(Self {
            stream: listener::connect(addr, timeout).await?,
        })
    }

    async fn call(&mut self, request: &NameRequest) -> ServerResult<NameReply> {
        write_frame(&mut self.stream, request.encode().as_bytes()).await?;
        let frame = read_frame(&mut self.stream, DEFAULT_MAX_FRAME_LEN)
            .await?
            .ok_or_else(|| ServerError::Frame("connection closed before reply".into()))?;
        let xml = std::str::from_utf8(&frame)
            .map_err(|_| ServerError::Frame("reply is not valid UTF-8".into()))?;
        Ok(NameReply::decode(xml)?)
    }

    /// Publishes `endpoint` under `name`.
    pub async fn bind(&mut self, name: &str, endpoint: &str) -> ServerResult<()> {
        let request = NameRequest::Bind {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
        };
        match self.call(&request).await? {
            NameReply::Done => Ok(()),
            NameReply::Fault(fault) if fault.kind == FaultKind::Validation => {
                Err(ServerError::NameBound(name.to_string()))
            }
            other => Err(unexpected(other)),
        }
    }

    /// Withdraws `name`.
    pub async fn unbind(&mut self, name: &str) -> ServerResult<()> {
        let request = NameRequest::Unbind {
            name: name.to_string(),
        };
        match self.call(&request).await? {
            NameReply::Done => Ok(()),
            NameReply::Fault(fault) if fault.kind == FaultKind::NotFound => {
                Err(ServerError::NameNotBound(name.to_string()))
            }
            other => Err(unexpected(other)),
        }
    }

    /// Resolves `name` to the endpoint bound under it.
    pub async fn lookup(&mut self, name: &str) -> ServerResult<String> {
        let request = NameRequest::Lookup {
            name: name.to_string(),
        };
        match self.call(&request).await? {
            NameReply::Endpoint(endpoint) => Ok(endpoint),
            NameReply::Fault(fault) if fault.kind == FaultKind::NotFound => {
                Err(ServerError::NameNotBound(name.to_string()))
            }
            other => Err(unexpected(other)),
        }
    }

    /// Resolves `name` and returns the broker address behind it.
    pub async fn lookup_broker(&mut self, name: &str) -> ServerResult<String> {
        let endpoint = self.lookup(name).await?;
        match Endpoint::parse(&endpoint)? {
            Endpoint::Broker(addr) => Ok(addr),
            other => Err(ServerError::Rejected(format!(
                "'{name}' is bound to {other}, not a broker endpoint"
            ))),
        }
    }

    /// All bound names, sorted.
    pub async fn list(&mut self) -> ServerResult<Vec<String>> {
        match self.call(&NameRequest::List).await? {
            NameReply::Names(names) => Ok(names),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(reply: NameReply) -> ServerError {
    match reply {
        NameReply::Fault(fault) => ServerError::Fault(fault),
        other => ServerError::Protocol(ProtocolError::UnexpectedReply(other.encode())),
    }
}

/// A node's broker endpoint published in a name registry.
pub struct RegistryInvocationBinding {
    service_name: String,
    registry_addr: SocketAddr,
    connect_timeout: Duration,
    hosted: Option<ServeHandle>,
}

impl RegistryInvocationBinding {
    /// Publishes `endpoint` under the configured service name.
    ///
    /// Hosts the registry first when hosting is enabled and the registry
    /// address is free.
    pub async fn start(config: &RegistryConfig, endpoint: &str) -> ServerResult<Self> {
        let hosted = if config.host_registry {
            host(config.registry_addr).await?
        } else {
            None
        };
        let registry_addr = hosted
            .as_ref()
            .map_or(config.registry_addr, ServeHandle::local_addr);

        let published: ServerResult<()> = async {
            let mut names =
                NameClient::connect(&registry_addr.to_string(), config.connect_timeout).await?;
            names.bind(&config.service_name, endpoint).await
        }
        .await;
        if let Err(e) = published {
            if let Some(hosted) = hosted {
                let _ = hosted.shutdown().await;
            }
            return Err(ServerError::startup(
                BINDING,
                format!(
                    "cannot bind '{}' in registry {registry_addr}: {e}",
                    config.service_name
                ),
            ));
        }

        info!(
            binding = BINDING,
            service = %config.service_name,
            registry = %registry_addr,
            endpoint = %endpoint,
            hosted = hosted.is_some(),
            "binding started"
        );
        Ok(Self {
            service_name: config.service_name.clone(),
            registry_addr,
            connect_timeout: config.connect_timeout,
            hosted,
        })
    }

    /// The name the node is bound under.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Address of the registry holding the name.
    pub fn registry_addr(&self) -> SocketAddr {
        self.registry_addr
    }

    /// Whether this binding runs the registry itself.
    pub fn hosts_registry(&self) -> bool {
        self.hosted.is_some()
    }

    /// Unbinds the name, then stops the registry if this binding hosts it.
    pub async fn shutdown(self) -> ServerResult<()> {
        let unbound: ServerResult<()> = async {
            let mut names =
                NameClient::connect(&self.registry_addr.to_string(), self.connect_timeout).await?;
            names.unbind(&self.service_name).await
        }
        .await;
        if let Some(hosted) = self.hosted {
            hosted.shutdown().await?;
        }
        unbound.map_err(|e| ServerError::shutdown(BINDING, e.to_string()))?;
        info!(binding = BINDING, service = %self.service_name, "binding stopped");
        Ok(())
    }
}

/// Serves a fresh registry on `addr`, or returns `None` if the port is
/// already taken.
async fn host(addr: SocketAddr) -> ServerResult<Option<ServeHandle>> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Arc::new(NameRegistry::new()).serve(listener).map(Some),
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            debug!(registry = %addr, "registry address in use, binding into it");
            Ok(None)
        }
        Err(e) => Err(ServerError::startup(
            BINDING,
            format!("cannot bind {addr}: {e}"),
        )),
    }
}

/// How a registry client identifies itself to the node it joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Node id registered with the service.
    pub node_id: String,
    /// Endpoint the service will push updates to.
    pub endpoint: String,
}

impl ClientIdentity {
    /// Creates an explicit identity.
    pub fn new(node_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            endpoint: endpoint.into(),
        }
    }

    /// `RegistryClient_<unix-millis>` at `client://<user>`.
    ///
    /// The `client` scheme is not dialable, so pushes to such a client fail
    /// and are reported as unavailable peers.
    pub fn generated() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            node_id: format!("RegistryClient_{}", Utc::now().timestamp_millis()),
            endpoint: format!("client://{user}"),
        }
    }
}

/// A client joined to a service found through a name registry.
pub struct RegistryClient {
    broker: BrokerClient,
    service_name: String,
    identity: ClientIdentity,
    joined: bool,
}

impl RegistryClient {
    /// Locates the registry at `registry_addr`, looks up `service_name`,
    /// checks availability and, if available, registers `identity` as a peer.
    pub async fn connect(
        registry_addr: &str,
        service_name: &str,
        identity: ClientIdentity,
        timeout: Duration,
    ) -> ServerResult<Self> {
        let mut names = NameClient::connect(registry_addr, timeout).await?;
        let broker_addr = names.lookup_broker(service_name).await?;
        let mut broker = BrokerClient::connect(&broker_addr, timeout).await?;

        let joined = broker.is_available().await?;
        if joined {
            broker
                .register_node(&identity.node_id, &identity.endpoint)
                .await?;
            info!(
                service = %service_name,
                node_id = %identity.node_id,
                endpoint = %identity.endpoint,
                "joined through registry"
            );
        } else {
            warn!(service = %service_name, "service reports unavailable, not joining");
        }
        Ok(Self {
            broker,
            service_name: service_name.to_string(),
            identity,
            joined,
        })
    }

    /// This client's identity.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// The service this client joined.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Whether the handshake registered this client as a peer.
    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// `getRecord`.
    pub async fn get_record(&mut self, patient_id: &str) -> ServerResult<Record> {
        self.broker.get_record(patient_id).await
    }

    /// `syncRecord`.
    pub async fn sync_record(&mut self, record: &Record) -> ServerResult<()> {
        self.broker.sync_record(record).await
    }

    /// `registerNode`.
    pub async fn register_node(&mut self, node_id: &str, endpoint: &str) -> ServerResult<()> {
        self.broker.register_node(node_id, endpoint).await
    }

    /// `unregisterNode`.
    pub async fn unregister_node(&mut self, node_id: &str) -> ServerResult<()> {
        self.broker.unregister_node(node_id).await
    }

    /// `isAvailable`.
    pub async fn is_available(&mut self) -> ServerResult<bool> {
        self.broker.is_available().await
    }

    /// `nodeInfo`.
    pub async fn node_info(&mut self) -> ServerResult<String> {
        self.broker.node_info().await
    }

    /// Leaves the peer set.
    pub async fn leave(mut self) -> ServerResult<()> {
        if self.joined {
            let node_id = self.identity.node_id.clone();
            self.broker.unregister_node(&node_id).await?;
        }
        Ok(())
    }
}
