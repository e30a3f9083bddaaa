//! The container-runtime gateway.
//!
//! The monitoring core never talks to a container runtime directly; it consumes
//! the narrow [`ContainerRuntime`] trait, which covers exactly the four
//! operations the agent needs: listing containers, restarting and stopping one,
//! and opening a live resource-statistics stream. The production implementation
//! is [`DockerRuntime`], backed by the local Docker socket.

use futures::Stream;

use crate::container::{ContainerID, ContainerObservation};

mod docker;
mod error;

pub use docker::DockerRuntime;
pub use error::{Error, Result};

/// One raw statistics sample as delivered by the runtime's stats stream.
///
/// CPU counters are cumulative since container start; computing a usage
/// percentage requires the delta between two consecutive samples. Any field the
/// runtime does not report is `None` and never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawStatsSample {
    /// Cumulative CPU time consumed by the container, in nanoseconds.
    pub cpu_usage_ns: Option<u64>,
    /// Cumulative CPU time consumed by the whole host, in nanoseconds.
    pub system_usage_ns: Option<u64>,
    pub online_cpus: Option<u32>,
    pub memory_usage_bytes: Option<u64>,
}

pub trait ContainerRuntime: Send + Sync + 'static {
    type StatsStream: Stream<Item = Result<RawStatsSample>> + Send + Unpin + 'static;

    /// Lists the containers visible on this host.
    ///
    /// With `include_stopped` the result also covers containers that are not
    /// currently running (the monitor always asks for those, since an exited
    /// protected container is exactly what it is looking for).
    fn list_containers(
        &self,
        include_stopped: bool,
    ) -> impl Future<Output = Result<Vec<ContainerObservation>>> + Send;

    fn restart(&self, id: &ContainerID) -> impl Future<Output = Result<()>> + Send;

    fn stop(&self, id: &ContainerID) -> impl Future<Output = Result<()>> + Send;

    /// Opens a long-lived statistics stream for the given container.
    ///
    /// The stream ends when the runtime closes it (container gone, daemon
    /// restart); stream termination is never fatal for the caller.
    fn stats_stream(
        &self,
        id: &ContainerID,
    ) -> impl Future<Output = Result<Self::StatsStream>> + Send;
}
