#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to the container runtime: {0}")]
    Connect(#[source] bollard::errors::Error),
    #[error("container runtime request `{op}` failed: {source}")]
    Request {
        op: &'static str,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("container runtime request `{op}` timed out")]
    Timeout { op: &'static str },
    #[error("container runtime reported: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, Error>;
