//! Shared fakes for exercising the monitoring core without a container
//! runtime.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream;
use tokio::sync::mpsc;

use crate::alerts::AlertSink;
use crate::audit::{AuditEvent, AuditSink};
use crate::container::{ContainerID, ContainerObservation, ContainerState};
use crate::runtime::{ContainerRuntime, Error, RawStatsSample, Result};

/// Scripted in-memory [`ContainerRuntime`] that records every call.
#[derive(Debug, Default)]
pub(crate) struct FakeRuntime {
    observations: Mutex<Vec<ContainerObservation>>,
    samples: Mutex<HashMap<ContainerID, Vec<RawStatsSample>>>,
    restarts: Mutex<Vec<ContainerID>>,
    stops: Mutex<Vec<ContainerID>>,
    opened: Mutex<Vec<ContainerID>>,
    pub fail_list: AtomicBool,
    pub fail_restart: AtomicBool,
}

impl FakeRuntime {
    pub fn set_observations(&self, observations: Vec<ContainerObservation>) {
        *self.observations.lock().unwrap() = observations;
    }

    pub fn set_samples(&self, id: &ContainerID, samples: Vec<RawStatsSample>) {
        self.samples.lock().unwrap().insert(id.clone(), samples);
    }

    pub fn restarts(&self) -> Vec<ContainerID> {
        self.restarts.lock().unwrap().clone()
    }

    pub fn stops(&self) -> Vec<ContainerID> {
        self.stops.lock().unwrap().clone()
    }

    pub fn opened_streams(&self) -> Vec<ContainerID> {
        self.opened.lock().unwrap().clone()
    }
}

impl ContainerRuntime for FakeRuntime {
    type StatsStream = stream::Iter<std::vec::IntoIter<Result<RawStatsSample>>>;

    async fn list_containers(&self, _include_stopped: bool) -> Result<Vec<ContainerObservation>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Runtime("container list unavailable".to_owned()));
        }
        Ok(self.observations.lock().unwrap().clone())
    }

    async fn restart(&self, id: &ContainerID) -> Result<()> {
        self.restarts.lock().unwrap().push(id.clone());
        if self.fail_restart.load(Ordering::SeqCst) {
            return Err(Error::Runtime("restart refused".to_owned()));
        }
        Ok(())
    }

    async fn stop(&self, id: &ContainerID) -> Result<()> {
        self.stops.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn stats_stream(&self, id: &ContainerID) -> Result<Self::StatsStream> {
        self.opened.lock().unwrap().push(id.clone());
        let samples = self
            .samples
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default();
        Ok(stream::iter(
            samples.into_iter().map(Ok).collect::<Vec<_>>(),
        ))
    }
}

pub(crate) fn mem_sample(mb: u64) -> RawStatsSample {
    RawStatsSample {
        memory_usage_bytes: Some(mb * 1024 * 1024),
        ..Default::default()
    }
}

pub(crate) fn observation(
    id: &str,
    name: &str,
    state: ContainerState,
    protected: bool,
) -> ContainerObservation {
    let mut labels = HashMap::new();
    if protected {
        labels.insert("sentinel.auto-heal".to_owned(), "true".to_owned());
    }
    ContainerObservation {
        id: ContainerID::new(id).unwrap(),
        name: name.to_owned(),
        state,
        labels,
    }
}

/// Audit and alert sinks wired to inspectable receivers.
pub(crate) fn sink_pair() -> (
    AuditSink,
    AlertSink,
    mpsc::Receiver<AuditEvent>,
    mpsc::Receiver<String>,
) {
    let (audit_tx, audit_rx) = mpsc::channel(32);
    let (alert_tx, alert_rx) = mpsc::channel(32);
    (
        AuditSink::new(audit_tx),
        AlertSink::new(alert_tx),
        audit_rx,
        alert_rx,
    )
}
