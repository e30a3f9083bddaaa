use super::{AuditEvent, Result, StoredEvent};

pub trait EventPersister {
    fn persist_event(&self, event: &AuditEvent) -> impl Future<Output = Result<()>> + Send;

    /// Returns the most recent `limit` events, newest first.
    fn recent_events(&self, limit: u32) -> impl Future<Output = Result<Vec<StoredEvent>>> + Send;
}
