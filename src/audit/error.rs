#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to insert audit event: {0}")]
    InsertError(#[source] sqlx::Error),
    #[error("failed to read audit events: {0}")]
    ReadError(#[source] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
