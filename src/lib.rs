//! Sentinel Monitor: a container health-monitoring and self-healing agent.
//!
//! This library provides the core functionality for observing the containers
//! on one host, automatically restarting failed containers that are marked as
//! protected (with a bounded, anti-loop retry policy), streaming resource
//! usage metrics, and emitting alerts and audit events.

use std::sync::Arc;

pub mod alerts;
pub mod api;
pub mod audit;
pub mod config;
pub mod container;
pub mod metrics;
pub mod monitor;
pub mod recovery;
pub mod runtime;
pub mod status;
pub mod usage;

#[cfg(test)]
pub(crate) mod testutil;

use alerts::AlertSink;
use audit::{AuditEvent, AuditSink, EventPersister};

/// Runs the Sentinel Monitor agent.
///
/// Connects to the local container runtime and the database, spawns the
/// background tasks (audit persister, alert notifier, API server), and then
/// drives the monitoring loop on the configured period. Does not return under
/// normal operation.
///
/// # Errors
///
/// Possible errors include:
/// - Missing or invalid environment variables (e.g., `DATABASE_URL`).
/// - Failure to connect to the database or run the initial migration.
/// - Failure to connect to the container runtime socket.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::debug!(
        "Monitoring every {:?} with max_retries={} and memory threshold {}MB",
        config.interval,
        config.max_retries,
        config.memory_threshold_mb
    );

    let container_runtime = Arc::new(runtime::DockerRuntime::connect()?);

    let db = sqlx::mysql::MySqlPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(10))
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!().run(&db).await?;

    let persister = audit::MySqlEventPersister::new(db.clone());
    let (audit_tx, mut audit_rx) = tokio::sync::mpsc::channel::<AuditEvent>(32);
    {
        let persister = persister.clone();
        tokio::spawn(async move {
            while let Some(event) = audit_rx.recv().await {
                if let Err(err) = persister.persist_event(&event).await {
                    log::error!("failed to persist audit event: {err}");
                }
            }
        });
    }

    let (alert_tx, mut alert_rx) = tokio::sync::mpsc::channel::<String>(32);
    {
        let notifier = config.webhook_url.clone().map(alerts::WebhookNotifier::new);
        tokio::spawn(async move {
            while let Some(message) = alert_rx.recv().await {
                match &notifier {
                    Some(notifier) => {
                        if let Err(err) = notifier.notify(&message).await {
                            log::error!("failed to deliver alert: {err}");
                        }
                    }
                    None => log::info!("alert (no webhook configured): {message}"),
                }
            }
        });
    }

    let audit_sink = AuditSink::new(audit_tx);
    let alert_sink = AlertSink::new(alert_tx);

    let broadcaster = status::StatusBroadcaster::new(64);
    let statuses = status::StatusIndex::default();
    {
        let statuses = statuses.clone();
        let mut feed = broadcaster.subscribe();
        tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(status) => statuses.apply(status),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        log::debug!("status feed consumer lagged by {n} messages");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    {
        let state = api::ApiState::new(persister, Arc::clone(&container_runtime), statuses);
        let addr = config.api_addr.clone();
        tokio::spawn(async move {
            let api = api::APIServer::new(state).await;
            api.listen(addr).await
        });
    }

    let supervisor = metrics::StreamSupervisor::new(
        Arc::clone(&container_runtime),
        config.alert_cooldown,
        config.memory_threshold_mb,
        audit_sink.clone(),
        alert_sink.clone(),
    );
    let recovery = recovery::RecoveryEngine::new(
        Arc::clone(&container_runtime),
        config.max_retries,
        audit_sink,
        alert_sink,
    );
    let monitor = monitor::Monitor::new(
        container_runtime,
        supervisor,
        recovery,
        broadcaster,
        config.protect_label.clone(),
        config.protect_label_value.clone(),
    );

    let mut interval = tokio::time::interval(config.interval);
    loop {
        interval.tick().await;
        monitor.tick().await;
    }
}
