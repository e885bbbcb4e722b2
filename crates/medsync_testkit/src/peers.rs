//! Peer client doubles.

use async_trait::async_trait;
use medsync_core::{CoreError, CoreResult, PeerClient};
use medsync_protocol::Record;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Accepts every push and remembers it.
#[derive(Default)]
pub struct RecordingPeerClient {
    pushes: Mutex<Vec<(String, Record)>>,
}

impl RecordingPeerClient {
    /// Creates a recorder with no pushes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pushes to `endpoint`.
    pub fn attempts(&self, endpoint: &str) -> usize {
        self.pushes.lock().iter().filter(|(e, _)| e == endpoint).count()
    }

    /// Number of pushes to any endpoint.
    pub fn total(&self) -> usize {
        self.pushes.lock().len()
    }

    /// Push counts keyed by endpoint.
    pub fn attempts_by_endpoint(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for (endpoint, _) in self.pushes.lock().iter() {
            *counts.entry(endpoint.clone()).or_default() += 1;
        }
        counts
    }

    /// Records pushed to `endpoint`, oldest first.
    pub fn received(&self, endpoint: &str) -> Vec<Record> {
        self.pushes
            .lock()
            .iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Forgets every push.
    pub fn clear(&self) {
        self.pushes.lock().clear();
    }
}

#[async_trait]
impl PeerClient for RecordingPeerClient {
    async fn push(&self, endpoint: &str, record: &Record) -> CoreResult<()> {
        self.pushes
            .lock()
            .push((endpoint.to_string(), record.clone()));
        Ok(())
    }
}

/// Rejects every push as an unavailable peer.
#[derive(Default)]
pub struct FailingPeerClient {
    attempts: Mutex<usize>,
}

impl FailingPeerClient {
    /// Creates a client that fails every push.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pushes attempted.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl PeerClient for FailingPeerClient {
    async fn push(&self, endpoint: &str, _record: &Record) -> CoreResult<()> {
        *self.attempts.lock() += 1;
        Err(CoreError::peer_unavailable(endpoint, "connection refused"))
    }
}

/// Waits before answering, to exercise push timeouts.
pub struct StallingPeerClient {
    delay: Option<Duration>,
}

impl StallingPeerClient {
    /// Never answers.
    pub fn forever() -> Self {
        Self { delay: None }
    }

    /// Answers successfully after `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay) }
    }
}

#[async_trait]
impl PeerClient for StallingPeerClient {
    async fn push(&self, _endpoint: &str, _record: &Record) -> CoreResult<()> {
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => futures::future::pending::<()>().await,
        }
        Ok(())
    }
}
