use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::{Stream, StreamExt};
use kview_core::Capability;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::TcpListener as StdTcpListener;
use uuid::Uuid;

use super::{gate_capability, gate_write, AppState};
use crate::error::ApiError;
use crate::sessions::logs::LogRequest;
use crate::sessions::portforward::PortForwardTarget;
use crate::sessions::shell::ShellTarget;

#[derive(Deserialize)]
pub struct LogQuery {
    pub container: Option<String>,
    #[serde(default)]
    pub tail_lines: Option<i64>,
    #[serde(default)]
    pub previous: bool,
    #[serde(default)]
    pub timestamps: bool,
}

fn to_request(namespace: String, pod_name: String, q: LogQuery, follow: bool) -> LogRequest {
    LogRequest {
        namespace,
        pod_name,
        container: q.container,
        tail_lines: q.tail_lines,
        previous: q.previous,
        timestamps: q.timestamps,
        follow,
    }
}

pub async fn capture_logs(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Query(q): Query<LogQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    gate_capability(&state, Capability::Logs).await?;
    let manager = state.logs().await.ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    let req = to_request(namespace, name, q, false);
    let buffer = manager.capture(&req).await?;
    Ok(Json(serde_json::json!({ "data": buffer.data })))
}

pub async fn stream_logs(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Query(q): Query<LogQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    gate_capability(&state, Capability::Logs).await?;
    let manager = state.logs().await.ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    let req = to_request(namespace, name, q, true);
    let (_id, mut chunks) = manager.follow(&req).await?;

    let stream = async_stream::stream! {
        while let Some(chunk) = chunks.next().await {
            yield Ok(SseEvent::default().event("log").data(chunk.data));
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Deserialize)]
pub struct ExecQuery {
    pub container: Option<String>,
    #[serde(default)]
    pub command: Vec<String>,
}

pub async fn exec_ws(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Query(q): Query<ExecQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    gate_capability(&state, Capability::Exec).await?;
    let manager = state.shells().await.ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    let command = if q.command.is_empty() { vec!["/bin/sh".to_string()] } else { q.command };
    let target = ShellTarget {
        namespace,
        pod_name: name,
        container: q.container,
        command,
    };
    Ok(ws.on_upgrade(move |socket| async move {
        manager.run_session(target, socket).await;
    }))
}

#[derive(Deserialize)]
pub struct OpenPortForwardRequest {
    pub namespace: String,
    pub target: String,
    #[serde(default)]
    pub is_service: bool,
    pub remote_port: u16,
    pub local_port: Option<u16>,
}

#[derive(Serialize)]
pub struct PortForwardView {
    pub id: Uuid,
    pub local_addr: String,
    pub state: kview_core::SessionState,
}

pub async fn open_port_forward(
    State(state): State<AppState>,
    Json(req): Json<OpenPortForwardRequest>,
) -> Result<Json<PortForwardView>, ApiError> {
    gate_write(&state)?;
    gate_capability(&state, Capability::PortForward).await?;
    let manager = state
        .port_forwards()
        .await
        .ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    let target = PortForwardTarget {
        namespace: req.namespace,
        name: req.target,
        is_service: req.is_service,
        remote_port: req.remote_port,
    };
    let handle = manager
        .open(target, req.local_port)
        .await
        .map_err(ApiError::from)?;
    let session = handle.session.lock().await.clone();
    Ok(Json(PortForwardView {
        id: Uuid::parse_str(&session.id).unwrap_or_else(|_| Uuid::nil()),
        local_addr: handle.local_addr.to_string(),
        state: session.state,
    }))
}

pub async fn list_port_forwards(
    State(state): State<AppState>,
) -> Result<Json<Vec<PortForwardView>>, ApiError> {
    let Some(manager) = state.port_forwards().await else {
        return Ok(Json(Vec::new()));
    };
    let items = manager
        .list()
        .await
        .into_iter()
        .map(|(id, session, addr)| PortForwardView {
            id,
            local_addr: addr.to_string(),
            state: session.state,
        })
        .collect();
    Ok(Json(items))
}

pub async fn close_port_forward(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(), ApiError> {
    gate_write(&state)?;
    let manager = state
        .port_forwards()
        .await
        .ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    if manager.close(id).await {
        Ok(())
    } else {
        Err(ApiError::NotFound(id.to_string()))
    }
}

#[derive(Serialize)]
pub struct AvailablePort {
    /// Whether `target` currently resolves to a live pod that a forward
    /// could actually be opened against.
    pub available: bool,
    pub port: u16,
}

/// Checks whether `{type}/{ns}/{name}` (a pod, or a service resolved to
/// its backing pod) is currently forwardable, and hands back an
/// OS-assigned loopback port the caller can use as its `local_port` hint.
pub async fn available_port(
    State(state): State<AppState>,
    Path((target_type, namespace, name)): Path<(String, String, String)>,
) -> Result<Json<AvailablePort>, ApiError> {
    let is_service = match target_type.as_str() {
        "pod" => false,
        "service" | "svc" => true,
        other => return Err(ApiError::BadRequest(format!("unknown port-forward target type: {other}"))),
    };
    let client = state.facade.client().await.ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    let available = crate::sessions::portforward::target_is_available(&client, &namespace, &name, is_service).await;

    let listener = StdTcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let port = listener
        .local_addr()
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .port();
    Ok(Json(AvailablePort { available, port }))
}
