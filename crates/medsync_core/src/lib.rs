//! # MedSync Core
//!
//! Record store, node registry and sync coordinator for a MedSync node.
//!
//! This crate provides:
//! - [`RecordStore`]: records keyed by patient id
//! - [`NodeRegistry`]: peer node ids mapped to endpoints
//! - [`SyncCoordinator`]: the only component that touches either map
//! - [`RecordService`]: the capability every transport binding adapts
//! - [`PeerClient`]: how the coordinator dials peers
//!
//! ## Propagation model
//!
//! 1. Validate the incoming record
//! 2. Write it to the local store
//! 3. Push it to every registered peer except this node, each push bounded
//!    by a timeout
//!
//! Peers store a pushed record as a replica and do not push it further, so
//! mutually registered nodes exchange each write once.
//!
//! The caller is acknowledged after step 2. Peer failures are logged and
//! reported per peer, never returned as errors.
//!
//! ## Key Invariants
//!
//! - Records are keyed by patient id, never by record id
//! - A record id is assigned once and inherited by later syncs
//! - Last write wins; there is no merge or version check
//! - Registry entries never expire

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod peer;
mod registry;
mod sample;
mod service;
mod store;

pub use config::{CoordinatorConfig, PropagationMode};
pub use coordinator::SyncCoordinator;
pub use error::{CoreError, CoreResult};
pub use peer::{PeerClient, PeerOutcome, PropagationReport};
pub use registry::{NodeDescriptor, NodeRegistry};
pub use sample::{sample_record, SAMPLE_PATIENT_ID};
pub use service::RecordService;
pub use store::RecordStore;
