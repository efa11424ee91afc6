//! HTTP surface: axum router, route handlers, and SSE/WebSocket framing.

mod context;
mod events;
mod images;
mod releases;
mod resources;
mod sessions;
mod state;
mod topology;

pub use state::{AppState, CHANGE_REPLAY_CAPACITY};

use axum::routing::{delete, get, post, put};
use axum::Router;
use kview_core::Capability;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cluster-info", get(resources::cluster_info))
        .route("/capabilities", get(resources::capabilities))
        .route("/api-resources", get(resources::api_resources))
        .route("/namespaces", get(resources::namespaces))
        .route("/context/switch", post(context::switch_context))
        .route("/topology", get(topology::get_topology))
        .route("/events/stream", get(events::stream))
        .route("/events", get(events::list_raw_events))
        .route("/changes", get(events::list_changes))
        .route("/resources/:kind", get(resources::list))
        .route(
            "/resources/:kind/:namespace/:name",
            get(resources::get).put(resources::put).delete(resources::delete),
        )
        .route("/pods/:namespace/:name/logs", get(sessions::capture_logs))
        .route("/pods/:namespace/:name/logs/stream", get(sessions::stream_logs))
        .route("/pods/:namespace/:name/exec", get(sessions::exec_ws))
        .route("/portforwards", get(sessions::list_port_forwards).post(sessions::open_port_forward))
        .route("/portforwards/:id", delete(sessions::close_port_forward))
        .route("/portforwards/available/:type/:namespace/:name", get(sessions::available_port))
        .route("/helm/releases", get(releases::list))
        .route("/helm/releases/:namespace/:name", get(releases::get).delete(releases::uninstall))
        .route("/helm/releases/:namespace/:name/manifest", get(releases::manifest))
        .route("/helm/releases/:namespace/:name/values", get(releases::values))
        .route("/helm/releases/:namespace/:name/history", get(releases::history))
        .route("/helm/releases/:namespace/:name/diff", post(releases::diff))
        .route("/helm/releases/:namespace/:name/rollback", post(releases::rollback))
        .route("/helm/releases/:namespace/:name/upgrade", put(releases::upgrade))
        .route("/helm/releases/:namespace/:name/upgrade-check", post(releases::upgrade_check))
        .route("/images/metadata", get(images::metadata))
        .route("/images/inspect", get(images::inspect))
        .route("/images/file", get(images::get_file))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Rejects write/session-opening requests up front when the daemon was
/// started with `--read-only`.
fn require_write_allowed(state: &AppState) -> Result<(), ApiError> {
    if state.read_only {
        Err(ApiError::ReadOnly)
    } else {
        Ok(())
    }
}

/// Looks up the current capability set and denies with a 503 if `cap`
/// isn't allowed against the active cluster.
async fn require_capability(state: &AppState, cap: Capability) -> Result<(), ApiError> {
    let caps = state.prober.capabilities().await;
    if caps.allows(cap) {
        Ok(())
    } else {
        Err(ApiError::CapabilityDenied(cap))
    }
}

pub(crate) use require_capability as gate_capability;
pub(crate) use require_write_allowed as gate_write;
