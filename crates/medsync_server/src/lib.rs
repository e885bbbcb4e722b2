//! # MedSync Server
//!
//! Transport bindings and node assembly for MedSync.
//!
//! This crate provides:
//! - The socket text protocol (`GET_RECORD:` / `SEND_RECORD:` /
//!   `REPLICATE_RECORD:` lines)
//! - The object-broker binding (length-prefixed call/reply envelopes)
//! - The registry invocation binding (broker endpoints published by name
//!   in a networked name registry, port 1099 by default)
//! - A peer connector that pushes records over any of the three
//! - [`Node`], which runs one coordinator behind every configured binding
//!
//! # Architecture
//!
//! Every binding holds the same `Arc<dyn RecordService>`, so a record saved
//! through one transport is immediately readable through the others. Bindings
//! translate wire messages into coordinator calls and coordinator errors into
//! their own error shape; they keep no record state of their own.
//!
//! Pushes to peers are replicate calls: the receiving node stores the record
//! and does not push it further, so mutually registered nodes exchange each
//! write exactly once.
//!
//! ```rust,ignore
//! use medsync_core::CoordinatorConfig;
//! use medsync_server::{Node, NodeConfig, SocketConfig};
//!
//! let config = NodeConfig::new(CoordinatorConfig::new("node-a"))
//!     .with_socket(SocketConfig::default())
//!     .with_peer("node-b", "broker://10.0.0.2:1050");
//! let node = Node::start(config).await?;
//! // ...
//! node.shutdown().await;
//! ```
//!
//! # Peer endpoints
//!
//! | Endpoint                    | Push goes through                          |
//! |-----------------------------|--------------------------------------------|
//! | `socket://host:port`        | `REPLICATE_RECORD:` line                   |
//! | `host:port`                 | same as `socket://`                        |
//! | `broker://host:port`        | `replicateRecord` call envelope            |
//! | `registry://name`           | lookup in the node's registry, then broker |
//! | `registry://host:port/name` | lookup in the given registry, then broker  |

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod broker;
mod cache;
mod config;
mod error;
mod framing;
mod listener;
mod node;
mod peer;
mod registry;
mod socket;

pub use broker::{fault_from, BrokerClient, ObjectBrokerBinding};
pub use cache::RecordCache;
pub use config::{
    default_registry_addr, BrokerConfig, NodeConfig, RegistryConfig, SocketConfig,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_FRAME_LEN, DEFAULT_REGISTRY_PORT, DEFAULT_SERVICE_NAME,
};
pub use error::{ServerError, ServerResult};
pub use framing::{read_frame, read_line, write_frame, write_line};
pub use listener::ServeHandle;
pub use node::Node;
pub use peer::{Endpoint, PeerConnector};
pub use registry::{
    ClientIdentity, NameClient, NameRegistry, RegistryClient, RegistryInvocationBinding,
};
pub use socket::{SocketClient, SocketProtocolBinding};
