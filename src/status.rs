//! Per-tick status feed for observers and dashboards.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

/// Snapshot of one container's state as published on every tick.
///
/// Metrics are the last cached values from the stats stream (zeroed until the
/// first sample arrives); `blocked` and `protected` reflect the state before
/// any recovery attempt in the same tick.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ContainerStatus {
    pub name: String,
    pub state: String,
    pub id: String,
    pub protected: bool,
    pub blocked: bool,
    pub cpu_percent: f64,
    pub memory_mb: u64,
}

/// Fan-out handle for the status feed.
///
/// Backed by a broadcast channel: slow or absent observers never block the
/// monitoring loop, they only lose messages.
#[derive(Debug, Clone)]
pub struct StatusBroadcaster {
    tx: broadcast::Sender<ContainerStatus>,
}

impl StatusBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContainerStatus> {
        self.tx.subscribe()
    }

    pub fn publish(&self, status: ContainerStatus) {
        // A send error only means there is currently no subscriber.
        let _ = self.tx.send(status);
    }
}

/// Point-in-time view over the status feed: the latest broadcast per
/// container, keyed by container id.
///
/// Fed by a drain task subscribed to the [`StatusBroadcaster`]; queried by the
/// HTTP surface.
#[derive(Debug, Default, Clone)]
pub struct StatusIndex {
    inner: Arc<DashMap<String, ContainerStatus>>,
}

impl StatusIndex {
    pub fn apply(&self, status: ContainerStatus) {
        self.inner.insert(status.id.clone(), status);
    }

    pub fn snapshot(&self) -> Vec<ContainerStatus> {
        self.inner.iter().map(|entry| entry.value().clone()).collect()
    }
}
