//! Node assembly: one coordinator behind every configured binding.

use crate::broker::ObjectBrokerBinding;
use crate::config::NodeConfig;
use crate::error::{ServerError, ServerResult};
use crate::listener::ServeHandle;
use crate::peer::PeerConnector;
use crate::registry::RegistryInvocationBinding;
use crate::socket::SocketProtocolBinding;
use medsync_core::{sample_record, RecordService, SyncCoordinator};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::{info, warn};

/// A running node.
///
/// Bindings start in the order socket, broker, registry. If any fails to
/// start, the ones already running are stopped before the error is returned.
///
/// The registry binding publishes the broker binding's address, so it needs
/// either the broker binding or an advertised endpoint.
pub struct Node {
    coordinator: Arc<SyncCoordinator>,
    socket: Option<ServeHandle>,
    broker: Option<ServeHandle>,
    registry: Option<RegistryInvocationBinding>,
}

impl Node {
    /// Builds the coordinator and starts every configured binding.
    pub async fn start(config: NodeConfig) -> ServerResult<Self> {
        let connector = PeerConnector::new(
            config.coordinator.node_id.clone(),
            config.registry_addr(),
            config.connect_timeout(),
        );
        let coordinator = Arc::new(SyncCoordinator::new(
            config.coordinator.clone(),
            Arc::new(connector),
        ));

        if config.seed_sample {
            coordinator.seed(sample_record())?;
        }
        for (node_id, endpoint) in &config.peers {
            coordinator.register_node(node_id, endpoint)?;
        }

        let service: Arc<dyn RecordService> = coordinator.clone();
        let mut node = Self {
            coordinator,
            socket: None,
            broker: None,
            registry: None,
        };

        if let Some(socket) = &config.socket {
            match SocketProtocolBinding::start(Arc::clone(&service), socket).await {
                Ok(handle) => node.socket = Some(handle),
                Err(e) => return Err(node.abort(e).await),
            }
        }
        if let Some(broker) = &config.broker {
            match ObjectBrokerBinding::start(Arc::clone(&service), broker).await {
                Ok(handle) => node.broker = Some(handle),
                Err(e) => return Err(node.abort(e).await),
            }
        }
        if let Some(registry) = &config.registry {
            let endpoint = match (&registry.advertised_endpoint, node.broker_addr()) {
                (Some(endpoint), _) => endpoint.clone(),
                (None, Some(addr)) => format!("broker://{}", reachable(addr)),
                (None, None) => {
                    let err = ServerError::startup(
                        "registry",
                        "registry binding needs the broker binding or an advertised endpoint",
                    );
                    return Err(node.abort(err).await);
                }
            };
            match RegistryInvocationBinding::start(registry, &endpoint).await {
                Ok(binding) => node.registry = Some(binding),
                Err(e) => return Err(node.abort(e).await),
            }
        }

        info!(node_id = %node.coordinator.node_id(), "node started");
        Ok(node)
    }

    async fn abort<E: std::fmt::Display>(self, err: E) -> E {
        warn!(error = %err, "node startup failed, stopping started bindings");
        self.shutdown().await;
        err
    }

    /// The node's coordinator.
    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// Bound socket address, if the socket binding runs.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().map(ServeHandle::local_addr)
    }

    /// Bound broker address, if the broker binding runs.
    pub fn broker_addr(&self) -> Option<SocketAddr> {
        self.broker.as_ref().map(ServeHandle::local_addr)
    }

    /// Registry service name, if the registry binding runs.
    pub fn service_name(&self) -> Option<&str> {
        self.registry
            .as_ref()
            .map(RegistryInvocationBinding::service_name)
    }

    /// Address of the registry the node is published in, if the registry
    /// binding runs.
    pub fn registry_addr(&self) -> Option<SocketAddr> {
        self.registry
            .as_ref()
            .map(RegistryInvocationBinding::registry_addr)
    }

    /// One status line per running binding, tagged with its kind and address.
    pub fn status_lines(&self) -> Vec<String> {
        let info = self.coordinator.node_info();
        let mut lines = Vec::new();
        if let Some(addr) = self.socket_addr() {
            lines.push(format!("Socket Node - Address: {addr}, {info}"));
        }
        if let Some(addr) = self.broker_addr() {
            lines.push(format!("Broker Node - Address: {addr}, {info}"));
        }
        if let Some(registry) = &self.registry {
            lines.push(format!(
                "Registry Node - Service: {} at {}, {info}",
                registry.service_name(),
                registry.registry_addr()
            ));
        }
        lines
    }

    /// Stops every binding in reverse start order.
    ///
    /// A binding that fails to stop is logged and the rest still stop.
    pub async fn shutdown(self) {
        if let Some(registry) = self.registry {
            if let Err(e) = registry.shutdown().await {
                warn!(error = %e, "registry shutdown failed");
            }
        }
        if let Some(broker) = self.broker {
            if let Err(e) = broker.shutdown().await {
                warn!(error = %e, "broker shutdown failed");
            }
        }
        if let Some(socket) = self.socket {
            if let Err(e) = socket.shutdown().await {
                warn!(error = %e, "socket shutdown failed");
            }
        }
        info!(node_id = %self.coordinator.node_id(), "node stopped");
    }
}

/// Replaces a wildcard bind address with loopback so peers can dial it.
fn reachable(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
    } else {
        addr
    }
}
