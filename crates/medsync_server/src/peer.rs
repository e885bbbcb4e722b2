//! Network peer client: dials a peer's binding by endpoint scheme.

use crate::broker::BrokerClient;
use crate::error::ServerError;
use crate::registry::NameClient;
use crate::socket::SocketClient;
use async_trait::async_trait;
use medsync_core::{CoreError, CoreResult, PeerClient};
use medsync_protocol::Record;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// A parsed peer endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `socket://host:port` or a bare `host:port`.
    Socket(String),
    /// `broker://host:port`.
    Broker(String),
    /// `registry://name` or `registry://host:port/name`.
    Registry {
        /// Registry address; the caller's default registry when absent.
        registry: Option<String>,
        /// Service name.
        name: String,
    },
}

impl Endpoint {
    /// Parses an endpoint string.
    ///
    /// Unknown schemes and empty targets are peer-unavailable errors, since
    /// they only matter when a push is attempted.
    pub fn parse(endpoint: &str) -> CoreResult<Self> {
        let parsed = match endpoint.split_once("://") {
            Some(("socket", target)) => Endpoint::Socket(target.to_string()),
            Some(("broker", target)) => Endpoint::Broker(target.to_string()),
            Some(("registry", target)) => match target.rsplit_once('/') {
                Some((registry, name)) if !registry.is_empty() => Endpoint::Registry {
                    registry: Some(registry.to_string()),
                    name: name.to_string(),
                },
                Some(_) => return Err(CoreError::peer_unavailable(endpoint, "empty registry address")),
                None => Endpoint::Registry {
                    registry: None,
                    name: target.to_string(),
                },
            },
            Some((scheme, _)) => {
                return Err(CoreError::peer_unavailable(
                    endpoint,
                    format!("unsupported scheme '{scheme}'"),
                ))
            }
            None => Endpoint::Socket(endpoint.to_string()),
        };
        let empty = match &parsed {
            Endpoint::Socket(addr) | Endpoint::Broker(addr) => addr.is_empty(),
            Endpoint::Registry { name, .. } => name.is_empty(),
        };
        if empty {
            return Err(CoreError::peer_unavailable(endpoint, "empty endpoint"));
        }
        Ok(parsed)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Socket(addr) => write!(f, "socket://{addr}"),
            Endpoint::Broker(addr) => write!(f, "broker://{addr}"),
            Endpoint::Registry {
                registry: Some(registry),
                name,
            } => write!(f, "registry://{registry}/{name}"),
            Endpoint::Registry { registry: None, name } => write!(f, "registry://{name}"),
        }
    }
}

/// [`PeerClient`] that speaks whichever binding an endpoint names.
///
/// Every push is a replicate call tagged with this node's id, so the
/// receiving node stores the record without forwarding it.
pub struct PeerConnector {
    origin: String,
    registry_addr: SocketAddr,
    connect_timeout: Duration,
}

impl PeerConnector {
    /// Creates a connector pushing on behalf of node `origin`.
    ///
    /// `registry://name` endpoints resolve through the registry at
    /// `registry_addr`.
    pub fn new(
        origin: impl Into<String>,
        registry_addr: SocketAddr,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            origin: origin.into(),
            registry_addr,
            connect_timeout,
        }
    }

    async fn push_socket(&self, addr: &str, record: &Record) -> Result<(), ServerError> {
        let mut client = SocketClient::connect(addr, self.connect_timeout).await?;
        client.replicate_record(&self.origin, record).await.map(|_| ())
    }

    async fn push_broker(&self, addr: &str, record: &Record) -> Result<(), ServerError> {
        let mut client = BrokerClient::connect(addr, self.connect_timeout).await?;
        client.replicate_record(&self.origin, record).await
    }

    async fn push_registry(
        &self,
        registry: Option<&str>,
        name: &str,
        record: &Record,
    ) -> Result<(), ServerError> {
        let registry = registry.map_or_else(|| self.registry_addr.to_string(), str::to_string);
        let mut names = NameClient::connect(&registry, self.connect_timeout).await?;
        let addr = names.lookup_broker(name).await?;
        self.push_broker(&addr, record).await
    }
}

#[async_trait]
impl PeerClient for PeerConnector {
    async fn push(&self, endpoint: &str, record: &Record) -> CoreResult<()> {
        let result = match Endpoint::parse(endpoint)? {
            Endpoint::Socket(addr) => self.push_socket(&addr, record).await,
            Endpoint::Broker(addr) => self.push_broker(&addr, record).await,
            Endpoint::Registry { registry, name } => {
                self.push_registry(registry.as_deref(), &name, record).await
            }
        };
        result.map_err(|e| e.into_peer_error(endpoint))
    }
}
