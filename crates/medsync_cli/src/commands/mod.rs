//! CLI command implementations.

pub mod get;
pub mod info;
pub mod peers;
pub mod send;
pub mod serve;

use medsync_server::{default_registry_addr, BrokerClient, Endpoint, NameClient, SocketClient};
use std::time::Duration;

/// How long client commands wait for a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connection to one of a node's network bindings.
pub enum Client {
    /// Socket text protocol.
    Socket(SocketClient),
    /// Object-broker envelopes.
    Broker(BrokerClient),
}

impl Client {
    /// Connects to whichever binding `endpoint` names.
    pub async fn connect(endpoint: &str) -> Result<Self, Box<dyn std::error::Error>> {
        match Endpoint::parse(endpoint)? {
            Endpoint::Socket(addr) => Ok(Client::Socket(
                SocketClient::connect(&addr, CONNECT_TIMEOUT).await?,
            )),
            Endpoint::Broker(addr) => Ok(Client::Broker(
                BrokerClient::connect(&addr, CONNECT_TIMEOUT).await?,
            )),
            Endpoint::Registry { registry, name } => Ok(Client::Broker(
                resolve(registry.as_deref(), &name).await?,
            )),
        }
    }
}

/// Connects to a broker endpoint, directly or through a name registry.
pub async fn connect_broker(endpoint: &str) -> Result<BrokerClient, Box<dyn std::error::Error>> {
    match Endpoint::parse(endpoint)? {
        Endpoint::Broker(addr) => Ok(BrokerClient::connect(&addr, CONNECT_TIMEOUT).await?),
        Endpoint::Registry { registry, name } => resolve(registry.as_deref(), &name).await,
        other => Err(format!("expected a broker:// or registry:// endpoint, got '{other}'").into()),
    }
}

/// Looks `name` up in a registry (the local default when none is given)
/// and connects to the broker it is bound to.
async fn resolve(
    registry: Option<&str>,
    name: &str,
) -> Result<BrokerClient, Box<dyn std::error::Error>> {
    let registry = registry.map_or_else(|| default_registry_addr().to_string(), str::to_string);
    let mut names = NameClient::connect(&registry, CONNECT_TIMEOUT).await?;
    let addr = names.lookup_broker(name).await?;
    Ok(BrokerClient::connect(&addr, CONNECT_TIMEOUT).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use medsync_core::CoordinatorConfig;
    use medsync_server::{BrokerConfig, Node, NodeConfig, RegistryConfig};

    #[tokio::test]
    async fn rejects_unreachable_schemes() {
        assert!(Client::connect("ftp://x").await.is_err());
        assert!(connect_broker("socket://127.0.0.1:1").await.is_err());
    }

    #[tokio::test]
    async fn resolves_registry_endpoints() {
        let config = NodeConfig::new(CoordinatorConfig::new("A"))
            .with_broker(BrokerConfig::new("127.0.0.1:0".parse().unwrap()))
            .with_registry(
                RegistryConfig::new("Records").with_registry_addr("127.0.0.1:0".parse().unwrap()),
            );
        let node = Node::start(config).await.unwrap();
        let registry = node.registry_addr().unwrap();

        let mut broker = connect_broker(&format!("registry://{registry}/Records"))
            .await
            .unwrap();
        assert!(broker.is_available().await.unwrap());
        assert!(matches!(
            Client::connect(&format!("registry://{registry}/Records")).await.unwrap(),
            Client::Broker(_)
        ));
        assert!(connect_broker(&format!("registry://{registry}/Missing"))
            .await
            .is_err());

        node.shutdown().await;
    }
}
