//! Audit trail of monitoring decisions.
//!
//! Every failure detection, recovery attempt, block transition, and proactive
//! warning produces one immutable [`AuditEvent`]. Events are handed off through
//! an [`AuditSink`] (a bounded channel) to a background persister task; the
//! monitoring loop never waits on the database and never fails because of it.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use crate::container::ContainerID;

mod error;
mod mysql;
mod persister;

pub use error::{Error, Result};
pub use mysql::{MySqlEventPersister, StoredEvent};
pub use persister::EventPersister;

/// Classification of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A protected container was found failed; a recovery attempt follows.
    Failure,
    /// A recovery attempt succeeded.
    Recovery,
    /// A recovery attempt failed, or the retry limit was reached.
    CriticalError,
    /// A proactive resource-threshold warning.
    Warning,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failure => "FAILURE",
            Self::Recovery => "RECOVERY",
            Self::CriticalError => "CRITICAL_ERROR",
            Self::Warning => "WARNING",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit record. The core constructs these and hands them off; it
/// does not retain them afterwards.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub container_name: String,
    pub container_id: String,
    pub kind: EventKind,
    pub detail: String,
    /// Creation time, unix seconds.
    pub timestamp: u64,
}

impl AuditEvent {
    pub fn new(
        container_name: &str,
        container_id: &ContainerID,
        kind: EventKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            container_name: container_name.to_owned(),
            container_id: container_id.to_string(),
            kind,
            detail: detail.into(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
        }
    }
}

/// Cloneable, best-effort handle for emitting audit events.
///
/// A full or closed channel drops the event with a log line; audit emission is
/// a side channel and must never stall or abort the monitoring loop.
#[derive(Debug, Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditSink {
    pub fn new(tx: mpsc::Sender<AuditEvent>) -> Self {
        Self { tx }
    }

    pub fn record(&self, event: AuditEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                log::warn!(
                    "dropping audit event for `{}`, persister backlogged",
                    event.container_name
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                log::warn!(
                    "dropping audit event for `{}`, persister unavailable",
                    event.container_name
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::Failure.as_str(), "FAILURE");
        assert_eq!(EventKind::Recovery.as_str(), "RECOVERY");
        assert_eq!(EventKind::CriticalError.as_str(), "CRITICAL_ERROR");
        assert_eq!(EventKind::Warning.as_str(), "WARNING");
    }

    #[test]
    fn test_sink_delivers_event() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = AuditSink::new(tx);
        let id = ContainerID::new("abc").unwrap();
        sink.record(AuditEvent::new(
            "web",
            &id,
            EventKind::Warning,
            "high memory",
        ));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.container_name, "web");
        assert_eq!(event.kind, EventKind::Warning);
        assert!(event.timestamp > 0);
    }

    #[test]
    fn test_sink_survives_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = AuditSink::new(tx);
        let id = ContainerID::new("abc").unwrap();
        // Must not panic or error out.
        sink.record(AuditEvent::new("web", &id, EventKind::Failure, "gone"));
    }

    #[test]
    fn test_sink_drops_event_when_channel_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = AuditSink::new(tx);
        let id = ContainerID::new("abc").unwrap();
        // The second record must return immediately instead of waiting for
        // the backlogged drain task.
        sink.record(AuditEvent::new("web", &id, EventKind::Failure, "first"));
        sink.record(AuditEvent::new("web", &id, EventKind::Failure, "second"));

        assert_eq!(rx.try_recv().unwrap().detail, "first");
        assert!(rx.try_recv().is_err());
    }
}
