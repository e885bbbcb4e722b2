//! Serve command implementation.

use medsync_core::{CoordinatorConfig, PropagationMode};
use medsync_server::{BrokerConfig, Node, NodeConfig, RegistryConfig, SocketConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Options for running a node.
///
/// If no binding is selected, all three start on their defaults.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Identifier of this node.
    pub node_id: String,
    /// Socket binding address, if enabled.
    pub socket: Option<SocketAddr>,
    /// Object-broker binding address, if enabled.
    pub broker: Option<SocketAddr>,
    /// Registry service name, if enabled.
    pub service: Option<String>,
    /// Name registry address; the default port on loopback when absent.
    pub registry_addr: Option<SocketAddr>,
    /// Directory for cached record documents.
    pub records_dir: Option<PathBuf>,
    /// Peers registered at startup.
    pub peers: Vec<(String, String)>,
    /// Seed the sample record.
    pub sample: bool,
    /// Peer push timeout in milliseconds.
    pub peer_timeout_ms: u64,
    /// Push to peers one at a time.
    pub sequential: bool,
}

impl ServeOptions {
    /// Builds the node configuration.
    pub fn node_config(&self) -> NodeConfig {
        let propagation = if self.sequential {
            PropagationMode::Sequential
        } else {
            PropagationMode::Concurrent
        };
        let coordinator = CoordinatorConfig::new(self.node_id.clone())
            .with_peer_timeout(Duration::from_millis(self.peer_timeout_ms))
            .with_propagation(propagation);

        let all = self.socket.is_none() && self.broker.is_none() && self.service.is_none();
        let mut config = NodeConfig::new(coordinator);
        let socket = self
            .socket
            .map(SocketConfig::new)
            .or_else(|| all.then(SocketConfig::default));
        if let Some(mut socket) = socket {
            if let Some(dir) = &self.records_dir {
                socket = socket.with_records_dir(dir.clone());
            }
            config = config.with_socket(socket);
        }
        let broker = self
            .broker
            .map(BrokerConfig::new)
            .or_else(|| all.then(BrokerConfig::default));
        if let Some(broker) = broker {
            config = config.with_broker(broker);
        }
        let registry = self
            .service
            .clone()
            .map(RegistryConfig::new)
            .or_else(|| all.then(RegistryConfig::default));
        if let Some(mut registry) = registry {
            if let Some(addr) = self.registry_addr {
                registry = registry.with_registry_addr(addr);
            }
            config = config.with_registry(registry);
        }
        for (node_id, endpoint) in &self.peers {
            config = config.with_peer(node_id.clone(), endpoint.clone());
        }
        if self.sample {
            config = config.with_sample_data();
        }
        config
    }
}

/// Parses a `NODE_ID=ENDPOINT` peer argument.
pub fn parse_peer(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((node_id, endpoint)) if !node_id.is_empty() && !endpoint.is_empty() => {
            Ok((node_id.to_string(), endpoint.to_string()))
        }
        _ => Err(format!("expected NODE_ID=ENDPOINT, got '{arg}'")),
    }
}

/// Runs the serve command until Ctrl-C.
pub async fn run(options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let node = Node::start(options.node_config()).await?;

    for line in node.status_lines() {
        println!("{line}");
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    node.shutdown().await;
    Ok(())
}
