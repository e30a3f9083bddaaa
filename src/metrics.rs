//! Long-lived statistics streams and the latest-metrics cache.
//!
//! The supervisor owns one background task per running container, each holding
//! a subscription to the runtime's stats stream. Every delivered sample is
//! normalized through [`crate::usage`], overwrites the container's cache slot,
//! and is checked against the proactive memory threshold. Streaming is
//! best-effort telemetry: a stream that errors or completes simply releases its
//! slot so a later tick can reopen it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::StreamExt;
use tokio::task::AbortHandle;

use crate::alerts::{AlertCooldown, AlertSink};
use crate::audit::{AuditEvent, AuditSink, EventKind};
use crate::container::ContainerID;
use crate::runtime::{ContainerRuntime, RawStatsSample};
use crate::usage;

/// Latest computed metrics for one container.
///
/// `raw` keeps the last raw counter tuple, which the next sample's CPU delta
/// computation needs. CPU stays at 0 until a second sample has arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub cpu_percent: f64,
    pub memory_mb: u64,
    pub raw: RawStatsSample,
}

/// State shared between the supervisor and its stream tasks.
#[derive(Debug)]
struct Shared {
    cache: DashMap<ContainerID, MetricsSnapshot>,
    streams: DashMap<ContainerID, AbortHandle>,
    cooldown: AlertCooldown,
    threshold_mb: u64,
    audit: AuditSink,
    alerts: AlertSink,
}

/// Owns the per-container stats subscriptions and the metrics cache.
#[derive(Debug)]
pub struct StreamSupervisor<R> {
    runtime: Arc<R>,
    shared: Arc<Shared>,
}

impl<R: ContainerRuntime> StreamSupervisor<R> {
    pub fn new(
        runtime: Arc<R>,
        cooldown_window: Duration,
        threshold_mb: u64,
        audit: AuditSink,
        alerts: AlertSink,
    ) -> Self {
        Self {
            runtime,
            shared: Arc::new(Shared {
                cache: DashMap::default(),
                streams: DashMap::default(),
                cooldown: AlertCooldown::new(cooldown_window),
                threshold_mb,
                audit,
                alerts,
            }),
        }
    }

    /// Returns the latest cached metrics for the container, if any stream has
    /// delivered a sample yet.
    pub fn snapshot(&self, id: &ContainerID) -> Option<MetricsSnapshot> {
        self.shared.cache.get(id).map(|entry| *entry.value())
    }

    /// Opens a stats subscription for the container unless one is already
    /// active.
    pub fn ensure_stream(&self, id: &ContainerID, name: &str) {
        if let Some(entry) = self.shared.streams.get(id) {
            // A finished handle can be left behind when the task completes
            // before its handle is inserted below; treat it as absent so the
            // subscription can be reopened.
            if !entry.value().is_finished() {
                return;
            }
        }

        let handle = tokio::spawn(run_stream(
            Arc::clone(&self.runtime),
            Arc::clone(&self.shared),
            id.clone(),
            name.to_owned(),
        ));
        self.shared.streams.insert(id.clone(), handle.abort_handle());
    }

    /// Cancels every subscription whose container is no longer observed
    /// running, and drops its cache slot.
    pub fn retain(&self, running: &HashSet<ContainerID>) {
        self.shared.streams.retain(|id, handle| {
            if running.contains(id) {
                true
            } else {
                handle.abort();
                self.shared.cache.remove(id);
                false
            }
        });
    }

    pub fn active_streams(&self) -> usize {
        self.shared.streams.len()
    }
}

/// One long-lived stream subscription.
///
/// Runs until the stream completes, errors, or the task is aborted by
/// [`StreamSupervisor::retain`]; in every case the stream slot and cache entry
/// are released so the next tick can start over.
async fn run_stream<R: ContainerRuntime>(
    runtime: Arc<R>,
    shared: Arc<Shared>,
    id: ContainerID,
    name: String,
) {
    let mut stream = match runtime.stats_stream(&id).await {
        Ok(stream) => stream,
        Err(err) => {
            log::debug!("failed to open stats stream for `{id}`: {err}");
            shared.streams.remove(&id);
            return;
        }
    };

    let mut prev: Option<RawStatsSample> = None;
    while let Some(item) = stream.next().await {
        let raw = match item {
            Ok(raw) => raw,
            Err(err) => {
                log::debug!("stats stream for `{id}` failed: {err}");
                break;
            }
        };

        let snapshot = MetricsSnapshot {
            cpu_percent: usage::cpu_percent(prev.as_ref(), &raw),
            memory_mb: usage::memory_mb(&raw),
            raw,
        };
        log::trace!(
            "container `{id}`: cpu={:.2}%, memory={}MB",
            snapshot.cpu_percent,
            snapshot.memory_mb
        );
        shared.cache.insert(id.clone(), snapshot);

        if snapshot.memory_mb > shared.threshold_mb
            && shared.cooldown.should_send(&id, Instant::now())
        {
            shared.audit.record(AuditEvent::new(
                &name,
                &id,
                EventKind::Warning,
                format!(
                    "memory usage at {}MB exceeds the {}MB threshold",
                    snapshot.memory_mb, shared.threshold_mb
                ),
            ));
            shared.alerts.send(format!(
                "⚠️ *Sentinel memory warning*\nContainer `{name}` is using *{}MB* of memory.\nCheck for a possible memory leak.",
                snapshot.memory_mb
            ));
        }

        prev = Some(raw);
    }

    shared.streams.remove(&id);
    shared.cache.remove(&id);
}
