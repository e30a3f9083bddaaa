//! Outbound operator alerts.
//!
//! Two concerns live here: the cooldown table that de-duplicates proactive
//! resource alerts per container, and the best-effort delivery path (a bounded
//! channel drained by a webhook notifier task). Alert delivery is
//! fire-and-forget; a failed or unconfigured webhook is logged, never
//! propagated back into the monitoring loop.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;

use crate::container::ContainerID;

mod webhook;

pub use webhook::WebhookNotifier;

/// Per-container cooldown table for proactive alerts.
///
/// `should_send` answers "is an alert for this container due?" and records the
/// send in the same step, so concurrent stream callbacks cannot both win for
/// the same container within one window.
#[derive(Debug)]
pub struct AlertCooldown {
    window: Duration,
    last_sent: DashMap<ContainerID, Instant>,
}

impl AlertCooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_sent: DashMap::default(),
        }
    }

    /// Returns `true` and records `now` as the last-sent time iff no alert was
    /// recorded for this container within the cooldown window.
    pub fn should_send(&self, id: &ContainerID, now: Instant) -> bool {
        match self.last_sent.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) >= self.window {
                    entry.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }
}

/// Cloneable, best-effort handle for submitting alert messages.
#[derive(Debug, Clone)]
pub struct AlertSink {
    tx: mpsc::Sender<String>,
}

impl AlertSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    pub fn send(&self, message: String) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("dropping alert, notifier backlogged");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::warn!("dropping alert, notifier unavailable");
            }
        }
    }
}
