//! The per-container recovery state machine and anti-loop policy.
//!
//! Each container name carries a consecutive-failure counter. A container is
//! `Healthy` at 0 attempts, `Recovering` while attempts stay within the
//! configured maximum, and `Blocked` once the counter exceeds it. Blocked is a
//! deliberate one-way latch: the only way out is the container independently
//! reporting "running" again, which clears the record unconditionally.
//!
//! Storing only the counter makes the blocked invariant structural:
//! `blocked == (retry_count > max_retries)` cannot be violated because
//! `blocked` is never stored, always derived.

use std::sync::Arc;

use dashmap::DashMap;

use crate::alerts::AlertSink;
use crate::audit::{AuditEvent, AuditSink, EventKind};
use crate::container::ContainerID;
use crate::runtime::ContainerRuntime;

/// Read-only view of one container's recovery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthRecord {
    /// Consecutive recovery attempts since the container last reported
    /// "running".
    pub retry_count: u32,
    pub blocked: bool,
}

/// Decides, per observed failure, between a restart attempt, a terminal
/// anti-loop alert, or nothing at all.
#[derive(Debug)]
pub struct RecoveryEngine<R> {
    runtime: Arc<R>,
    max_retries: u32,
    records: DashMap<String, u32>,
    audit: AuditSink,
    alerts: AlertSink,
}

impl<R: ContainerRuntime> RecoveryEngine<R> {
    pub fn new(runtime: Arc<R>, max_retries: u32, audit: AuditSink, alerts: AlertSink) -> Self {
        Self {
            runtime,
            max_retries,
            records: DashMap::default(),
            audit,
            alerts,
        }
    }

    pub fn status(&self, name: &str) -> HealthRecord {
        let retry_count = self.records.get(name).map_or(0, |entry| *entry.value());
        HealthRecord {
            retry_count,
            blocked: retry_count > self.max_retries,
        }
    }

    /// Clears the failure record after a "running" observation. This is the
    /// only transition that unblocks a container.
    pub fn observe_running(&self, name: &str) {
        self.records.remove(name);
    }

    /// Handles one "exited" observation of a protected container.
    ///
    /// Within the retry budget this increments the counter and attempts a
    /// restart; the attempt that would exceed the budget instead latches the
    /// block and raises the one-shot anti-loop alert. Observations of an
    /// already-blocked container do nothing.
    pub async fn handle_failure(&self, id: &ContainerID, name: &str) {
        let attempts = self.records.get(name).map_or(0, |entry| *entry.value());
        if attempts > self.max_retries {
            return;
        }

        if attempts < self.max_retries {
            let attempt = attempts + 1;
            self.records.insert(name.to_owned(), attempt);
            self.audit.record(AuditEvent::new(
                name,
                id,
                EventKind::Failure,
                format!("recovery attempt #{attempt} of {}", self.max_retries),
            ));
            self.restart(id, name, attempt).await;
        } else {
            // Retry budget exhausted: latch the block, alert exactly once.
            self.records.insert(name.to_owned(), self.max_retries + 1);
            self.audit.record(AuditEvent::new(
                name,
                id,
                EventKind::CriticalError,
                "ANTI-LOOP: retry limit reached, automatic recovery suspended",
            ));
            self.alerts.send(format!(
                "🚨 *Sentinel critical alert - anti-loop*\nContainer `{name}` failed repeatedly and has been blocked.\nAutomatic restarts are suspended until it is checked manually."
            ));
        }
    }

    async fn restart(&self, id: &ContainerID, name: &str, attempt: u32) {
        match self.runtime.restart(id).await {
            Ok(()) => {
                self.audit.record(AuditEvent::new(
                    name,
                    id,
                    EventKind::Recovery,
                    "service restored by automatic restart",
                ));
                self.alerts.send(format!(
                    "*Sentinel self-healing report*\nContainer `{name}` restored.\nRecovery attempts so far: {attempt}"
                ));
            }
            Err(err) => {
                // No same-tick retry; the next observation re-evaluates.
                self.audit.record(AuditEvent::new(
                    name,
                    id,
                    EventKind::CriticalError,
                    format!("restart request failed: {err}"),
                ));
                self.alerts.send(format!(
                    "🚨 *Sentinel recovery failure*\nRestart of container `{name}` failed (attempt {attempt}): {err}"
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testutil::{FakeRuntime, sink_pair};

    fn engine(
        runtime: Arc<FakeRuntime>,
        max_retries: u32,
    ) -> (
        RecoveryEngine<FakeRuntime>,
        tokio::sync::mpsc::Receiver<AuditEvent>,
        tokio::sync::mpsc::Receiver<String>,
    ) {
        let (audit, alerts, audit_rx, alert_rx) = sink_pair();
        (
            RecoveryEngine::new(runtime, max_retries, audit, alerts),
            audit_rx,
            alert_rx,
        )
    }

    fn drain_events(
        rx: &mut tokio::sync::mpsc::Receiver<AuditEvent>,
    ) -> Vec<(EventKind, String)> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push((event.kind, event.detail));
        }
        out
    }

    #[tokio::test]
    async fn test_retry_budget_then_anti_loop() {
        let runtime = Arc::new(FakeRuntime::default());
        let id = ContainerID::new("abc").unwrap();
        let (engine, mut audit_rx, mut alert_rx) = engine(Arc::clone(&runtime), 3);

        // Four consecutive failure observations with MAX_RETRIES=3.
        for _ in 0..4 {
            engine.handle_failure(&id, "web").await;
        }

        assert_eq!(runtime.restarts().len(), 3);
        let events = drain_events(&mut audit_rx);
        let failures = events
            .iter()
            .filter(|(kind, _)| *kind == EventKind::Failure)
            .count();
        let recoveries = events
            .iter()
            .filter(|(kind, _)| *kind == EventKind::Recovery)
            .count();
        let criticals: Vec<_> = events
            .iter()
            .filter(|(kind, _)| *kind == EventKind::CriticalError)
            .collect();
        assert_eq!(failures, 3);
        assert_eq!(recoveries, 3);
        assert_eq!(criticals.len(), 1);
        assert!(criticals[0].1.contains("ANTI-LOOP"));

        // Exactly one critical alert, plus the three recovery reports.
        let mut alerts = Vec::new();
        while let Ok(alert) = alert_rx.try_recv() {
            alerts.push(alert);
        }
        assert_eq!(
            alerts.iter().filter(|a| a.contains("anti-loop")).count(),
            1
        );

        // Further failures of the blocked container are silent.
        engine.handle_failure(&id, "web").await;
        assert_eq!(runtime.restarts().len(), 3);
        assert!(audit_rx.try_recv().is_err());
        assert!(alert_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_blocked_iff_retries_exceed_max() {
        let runtime = Arc::new(FakeRuntime::default());
        runtime.fail_restart.store(true, Ordering::SeqCst);
        let id = ContainerID::new("abc").unwrap();
        let (engine, _audit_rx, _alert_rx) = engine(runtime, 3);

        for expected in 1..=3 {
            engine.handle_failure(&id, "web").await;
            let record = engine.status("web");
            assert_eq!(record.retry_count, expected);
            assert!(!record.blocked);
        }

        engine.handle_failure(&id, "web").await;
        let record = engine.status("web");
        assert_eq!(record.retry_count, 4);
        assert!(record.blocked);
    }

    #[tokio::test]
    async fn test_running_observation_clears_block() {
        let runtime = Arc::new(FakeRuntime::default());
        let id = ContainerID::new("abc").unwrap();
        let (engine, _audit_rx, _alert_rx) = engine(Arc::clone(&runtime), 1);

        engine.handle_failure(&id, "web").await;
        engine.handle_failure(&id, "web").await;
        assert!(engine.status("web").blocked);

        engine.observe_running("web");
        let record = engine.status("web");
        assert_eq!(record.retry_count, 0);
        assert!(!record.blocked);

        // Eligible for recovery again.
        engine.handle_failure(&id, "web").await;
        assert_eq!(runtime.restarts().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_restart_emits_critical_error() {
        let runtime = Arc::new(FakeRuntime::default());
        runtime.fail_restart.store(true, Ordering::SeqCst);
        let id = ContainerID::new("abc").unwrap();
        let (engine, mut audit_rx, mut alert_rx) = engine(Arc::clone(&runtime), 3);

        engine.handle_failure(&id, "web").await;

        let events = drain_events(&mut audit_rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, EventKind::Failure);
        assert_eq!(events[1].0, EventKind::CriticalError);
        assert!(events[1].1.contains("restart request failed"));
        // The attempt still counts, and the operator hears about the failure.
        assert_eq!(engine.status("web").retry_count, 1);
        let alert = alert_rx.try_recv().unwrap();
        assert!(alert.contains("web"));
        assert!(alert_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_container_is_healthy() {
        let runtime = Arc::new(FakeRuntime::default());
        let (engine, _audit_rx, _alert_rx) = engine(runtime, 3);
        assert_eq!(
            engine.status("never-seen"),
            HealthRecord {
                retry_count: 0,
                blocked: false
            }
        );
    }
}
