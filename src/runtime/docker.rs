use std::str::FromStr;

use bollard::Docker;
use bollard::models::{ContainerStatsResponse, ContainerSummary, ContainerSummaryStateEnum};
use bollard::query_parameters::{
    ListContainersOptionsBuilder, RestartContainerOptions, StatsOptionsBuilder,
    StopContainerOptions,
};
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::container::{ContainerID, ContainerObservation, ContainerState};

use super::{ContainerRuntime, Error, RawStatsSample, Result};

/// Upper bound on the synchronous daemon calls the monitoring loop waits on.
/// The stats stream is long-lived and exempt.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

async fn with_timeout<T>(
    op: &'static str,
    fut: impl Future<Output = std::result::Result<T, bollard::errors::Error>>,
) -> Result<T> {
    tokio::time::timeout(REQUEST_TIMEOUT, fut)
        .await
        .map_err(|_| Error::Timeout { op })?
        .map_err(|source| Error::Request { op, source })
}

/// [`ContainerRuntime`] implementation backed by the local Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects using the platform defaults (unix socket on Linux, honoring
    /// `DOCKER_HOST` when set).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(Error::Connect)?;
        Ok(Self { docker })
    }
}

impl ContainerRuntime for DockerRuntime {
    type StatsStream = BoxStream<'static, Result<RawStatsSample>>;

    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerObservation>> {
        let options = ListContainersOptionsBuilder::new()
            .all(include_stopped)
            .build();
        let summaries = with_timeout(
            "list containers",
            self.docker.list_containers(Some(options)),
        )
        .await?;

        Ok(summaries.into_iter().filter_map(observation_from).collect())
    }

    async fn restart(&self, id: &ContainerID) -> Result<()> {
        with_timeout(
            "restart container",
            self.docker
                .restart_container(id.as_ref(), None::<RestartContainerOptions>),
        )
        .await
    }

    async fn stop(&self, id: &ContainerID) -> Result<()> {
        with_timeout(
            "stop container",
            self.docker
                .stop_container(id.as_ref(), None::<StopContainerOptions>),
        )
        .await
    }

    async fn stats_stream(&self, id: &ContainerID) -> Result<Self::StatsStream> {
        let options = StatsOptionsBuilder::new().stream(true).build();
        let stream = self
            .docker
            .stats(id.as_ref(), Some(options))
            .map(|item| {
                item.map(sample_from).map_err(|source| Error::Request {
                    op: "container stats",
                    source,
                })
            })
            .boxed();

        Ok(stream)
    }
}

/// Maps one Docker container summary into a [`ContainerObservation`].
///
/// Summaries without a usable id are skipped. Docker reports names with a
/// leading slash, which is stripped for display.
fn observation_from(summary: ContainerSummary) -> Option<ContainerObservation> {
    let id = match summary.id.as_deref().map(ContainerID::from_str) {
        Some(Ok(id)) => id,
        Some(Err(err)) => {
            log::warn!("skipping container with unusable id: {err}");
            return None;
        }
        None => return None,
    };
    let name = summary
        .names
        .as_deref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/').to_owned())
        .unwrap_or_else(|| id.to_string());

    Some(ContainerObservation {
        id,
        name,
        state: state_from(summary.state),
        labels: summary.labels.unwrap_or_default(),
    })
}

fn state_from(state: Option<ContainerSummaryStateEnum>) -> ContainerState {
    match state {
        Some(ContainerSummaryStateEnum::CREATED) => ContainerState::Created,
        Some(ContainerSummaryStateEnum::RUNNING) => ContainerState::Running,
        Some(ContainerSummaryStateEnum::EXITED) => ContainerState::Exited,
        Some(ContainerSummaryStateEnum::PAUSED) => ContainerState::Other("paused".to_owned()),
        Some(ContainerSummaryStateEnum::RESTARTING) => {
            ContainerState::Other("restarting".to_owned())
        }
        Some(ContainerSummaryStateEnum::REMOVING) => ContainerState::Other("removing".to_owned()),
        Some(ContainerSummaryStateEnum::DEAD) => ContainerState::Other("dead".to_owned()),
        _ => ContainerState::Other("unknown".to_owned()),
    }
}

/// Extracts the counters the usage calculator needs from a raw Docker stats
/// message. Missing or unexpected shapes map to `None`, never to an error.
fn sample_from(stats: ContainerStatsResponse) -> RawStatsSample {
    let cpu = stats.cpu_stats.as_ref();
    RawStatsSample {
        cpu_usage_ns: cpu
            .and_then(|c| c.cpu_usage.as_ref())
            .and_then(|u| u.total_usage),
        system_usage_ns: cpu.and_then(|c| c.system_cpu_usage),
        online_cpus: cpu.and_then(|c| c.online_cpus),
        memory_usage_bytes: stats.memory_stats.as_ref().and_then(|m| m.usage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_skips_missing_id() {
        let summary = ContainerSummary {
            id: None,
            ..Default::default()
        };
        assert!(observation_from(summary).is_none());
    }

    #[test]
    fn test_observation_strips_name_slash() {
        let summary = ContainerSummary {
            id: Some("abc123".to_owned()),
            names: Some(vec!["/web".to_owned()]),
            state: Some(ContainerSummaryStateEnum::RUNNING),
            ..Default::default()
        };
        let obs = observation_from(summary).unwrap();
        assert_eq!(obs.name, "web");
        assert!(obs.state.is_running());
    }

    #[test]
    fn test_observation_falls_back_to_id_as_name() {
        let summary = ContainerSummary {
            id: Some("abc123".to_owned()),
            ..Default::default()
        };
        let obs = observation_from(summary).unwrap();
        assert_eq!(obs.name, "abc123");
    }

    #[test]
    fn test_sample_from_empty_stats() {
        let sample = sample_from(ContainerStatsResponse::default());
        assert_eq!(sample, RawStatsSample::default());
    }
}
