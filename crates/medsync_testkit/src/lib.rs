//! # MedSync Testkit
//!
//! Test utilities for MedSync.
//!
//! This crate provides:
//! - Record fixtures built from the sample record
//! - Property-based record generators using proptest
//! - Peer client doubles that record, fail or stall pushes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn pushes_once_per_peer() {
//!     let peers = Arc::new(RecordingPeerClient::new());
//!     let coordinator = SyncCoordinator::new(CoordinatorConfig::new("A"), peers.clone());
//!     coordinator.register_node("B", "socket://b:8888").unwrap();
//!     coordinator.sync_record(record_for("PAT7")).await.unwrap();
//!     assert_eq!(peers.attempts("socket://b:8888"), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod peers;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::peers::*;
}

pub use fixtures::*;
pub use generators::*;
pub use peers::*;
