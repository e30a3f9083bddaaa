//! HTTP surface: recent audit events and manual container control.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::ToSocketAddrs;

use crate::audit::{EventPersister, MySqlEventPersister};
use crate::container::ContainerID;
use crate::runtime::ContainerRuntime;
use crate::status::StatusIndex;

/// How many events the recent-events endpoint returns.
const RECENT_EVENTS_LIMIT: u32 = 10;

#[derive(Debug)]
pub struct ApiState<R> {
    events: MySqlEventPersister,
    runtime: Arc<R>,
    statuses: StatusIndex,
}

impl<R> ApiState<R> {
    pub fn new(events: MySqlEventPersister, runtime: Arc<R>, statuses: StatusIndex) -> Self {
        Self {
            events,
            runtime,
            statuses,
        }
    }
}

impl<R> Clone for ApiState<R> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            runtime: Arc::clone(&self.runtime),
            statuses: self.statuses.clone(),
        }
    }
}

async fn recent_events<R: ContainerRuntime>(State(state): State<ApiState<R>>) -> Response {
    match state.events.recent_events(RECENT_EVENTS_LIMIT).await {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(err) => {
            log::error!("failed to query recent events: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to query recent events",
            )
                .into_response()
        }
    }
}

/// The latest observed status of every container, one entry per container.
async fn container_statuses<R: ContainerRuntime>(State(state): State<ApiState<R>>) -> Response {
    (StatusCode::OK, Json(state.statuses.snapshot())).into_response()
}

/// Stops a container on operator demand, independent of the automatic loop.
async fn stop_container<R: ContainerRuntime>(
    State(state): State<ApiState<R>>,
    Path(id): Path<String>,
) -> Response {
    let id = match ContainerID::new(&id) {
        Ok(id) => id,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    log::info!("manual stop requested for container `{id}`");
    match state.runtime.stop(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            log::error!("failed to stop container `{id}`: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to stop container").into_response()
        }
    }
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub async fn new<R: ContainerRuntime>(state: ApiState<R>) -> Self {
        let router = axum::Router::new()
            .route("/api/events/recent", get(recent_events::<R>))
            .route("/api/status", get(container_statuses::<R>))
            .route("/api/containers/{id}/stop", post(stop_container::<R>))
            .with_state(state);
        Self { router }
    }

    pub async fn listen(self, addr: impl ToSocketAddrs) {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("TCP Listener bind");
        axum::serve(listener, self.router.into_make_service())
            .await
            .expect("API server failed")
    }
}
