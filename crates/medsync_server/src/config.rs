//! Binding and node configuration.

use medsync_core::CoordinatorConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default upper bound on a single socket line or broker frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Default service name for the registry binding.
pub const DEFAULT_SERVICE_NAME: &str = "MedicalRecordService";

/// Default port of the name registry.
pub const DEFAULT_REGISTRY_PORT: u16 = 1099;

/// Default time allowed for dialing the name registry.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the socket text protocol binding.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Longest accepted request line, in bytes.
    pub max_frame_len: usize,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Directory holding one cached document per patient.
    pub records_dir: Option<PathBuf>,
}

impl SocketConfig {
    /// Creates a socket configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_connections: 1000,
            records_dir: None,
        }
    }

    /// Sets the maximum line length.
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Enables the records directory cache.
    pub fn with_records_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.records_dir = Some(dir.into());
        self
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8888)))
    }
}

/// Configuration for the object-broker binding.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Largest accepted frame, in bytes.
    pub max_frame_len: usize,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl BrokerConfig {
    /// Creates a broker configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_connections: 1000,
        }
    }

    /// Sets the maximum frame length.
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 1050)))
    }
}

/// Configuration for the registry invocation binding.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Name the node's broker endpoint is bound under.
    pub service_name: String,
    /// Address of the name registry.
    pub registry_addr: SocketAddr,
    /// Host the registry on `registry_addr` if nothing listens there yet.
    pub host_registry: bool,
    /// Endpoint published instead of the node's own broker address.
    pub advertised_endpoint: Option<String>,
    /// Time allowed for dialing the registry.
    pub connect_timeout: Duration,
}

impl RegistryConfig {
    /// Creates a registry configuration using the default registry address.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            registry_addr: default_registry_addr(),
            host_registry: true,
            advertised_endpoint: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the registry address.
    pub fn with_registry_addr(mut self, addr: SocketAddr) -> Self {
        self.registry_addr = addr;
        self
    }

    /// Only binds into an existing registry, never hosts one.
    pub fn without_hosting(mut self) -> Self {
        self.host_registry = false;
        self
    }

    /// Publishes `endpoint` instead of the broker binding's address.
    pub fn with_advertised_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.advertised_endpoint = Some(endpoint.into());
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

/// `127.0.0.1:1099`.
pub fn default_registry_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], DEFAULT_REGISTRY_PORT))
}

/// Everything needed to start a node.
///
/// A binding whose config is `None` is not started.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Coordinator settings.
    pub coordinator: CoordinatorConfig,
    /// Socket binding.
    pub socket: Option<SocketConfig>,
    /// Object-broker binding.
    pub broker: Option<BrokerConfig>,
    /// Registry binding.
    pub registry: Option<RegistryConfig>,
    /// Peers registered at startup, as `(node_id, endpoint)`.
    pub peers: Vec<(String, String)>,
    /// Seed the sample record without propagating it.
    pub seed_sample: bool,
}

impl NodeConfig {
    /// Creates a node configuration with no bindings enabled.
    pub fn new(coordinator: CoordinatorConfig) -> Self {
        Self {
            coordinator,
            ..Self::default()
        }
    }

    /// Enables the socket binding.
    pub fn with_socket(mut self, config: SocketConfig) -> Self {
        self.socket = Some(config);
        self
    }

    /// Enables the object-broker binding.
    pub fn with_broker(mut self, config: BrokerConfig) -> Self {
        self.broker = Some(config);
        self
    }

    /// Enables the registry binding.
    pub fn with_registry(mut self, config: RegistryConfig) -> Self {
        self.registry = Some(config);
        self
    }

    /// Adds a peer registered at startup.
    pub fn with_peer(mut self, node_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.peers.push((node_id.into(), endpoint.into()));
        self
    }

    /// Seeds the sample record at startup.
    pub fn with_sample_data(mut self) -> Self {
        self.seed_sample = true;
        self
    }

    /// Timeout used when dialing peers.
    pub fn connect_timeout(&self) -> Duration {
        self.coordinator.peer_timeout
    }

    /// Registry used to resolve `registry://name` peers.
    pub fn registry_addr(&self) -> SocketAddr {
        self.registry
            .as_ref()
            .map_or_else(default_registry_addr, |r| r.registry_addr)
    }
}
