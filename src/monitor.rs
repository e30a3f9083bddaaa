//! The periodic monitoring tick.
//!
//! One tick observes every container on the host and drives all other
//! components: stream lifecycle, status broadcast, and the recovery path.
//! A tick never aborts midway; if the initial container listing fails the
//! whole tick is skipped without mutating any state, and the next tick retries
//! independently.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::container::ContainerID;
use crate::metrics::StreamSupervisor;
use crate::recovery::RecoveryEngine;
use crate::runtime::ContainerRuntime;
use crate::status::{ContainerStatus, StatusBroadcaster};

pub struct Monitor<R> {
    runtime: Arc<R>,
    supervisor: StreamSupervisor<R>,
    recovery: RecoveryEngine<R>,
    broadcaster: StatusBroadcaster,
    protect_label: String,
    protect_label_value: String,
}

impl<R: ContainerRuntime> Monitor<R> {
    pub fn new(
        runtime: Arc<R>,
        supervisor: StreamSupervisor<R>,
        recovery: RecoveryEngine<R>,
        broadcaster: StatusBroadcaster,
        protect_label: impl Into<String>,
        protect_label_value: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            supervisor,
            recovery,
            broadcaster,
            protect_label: protect_label.into(),
            protect_label_value: protect_label_value.into(),
        }
    }

    pub fn status_feed(&self) -> broadcast::Receiver<ContainerStatus> {
        self.broadcaster.subscribe()
    }

    /// Runs one monitoring cycle over the full container set.
    ///
    /// Per container: keep the stats stream in sync with the observed state,
    /// publish a status broadcast reflecting the pre-recovery state, then run
    /// the failure path for protected, exited, unblocked containers.
    pub async fn tick(&self) {
        let containers = match self.runtime.list_containers(true).await {
            Ok(containers) => containers,
            Err(err) => {
                log::warn!("skipping tick, failed to list containers: {err}");
                return;
            }
        };
        log::trace!("observed {} containers", containers.len());

        let running: HashSet<ContainerID> = containers
            .iter()
            .filter(|c| c.state.is_running())
            .map(|c| c.id.clone())
            .collect();
        self.supervisor.retain(&running);

        for container in containers {
            // "created" is transient and carries no actionable signal yet.
            if container.state.is_created() {
                continue;
            }

            if container.state.is_running() {
                self.supervisor.ensure_stream(&container.id, &container.name);
                self.recovery.observe_running(&container.name);
            }

            let protected =
                container.has_label(&self.protect_label, &self.protect_label_value);
            let record = self.recovery.status(&container.name);
            let metrics = self.supervisor.snapshot(&container.id).unwrap_or_default();

            self.broadcaster.publish(ContainerStatus {
                name: container.name.clone(),
                state: container.state.to_string(),
                id: container.id.to_string(),
                protected,
                blocked: record.blocked,
                cpu_percent: metrics.cpu_percent,
                memory_mb: metrics.memory_mb,
            });

            if protected && container.state.is_exited() && !record.blocked {
                self.recovery
                    .handle_failure(&container.id, &container.name)
                    .await;
            }
        }
    }
}
