use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use super::{gate_write, AppState};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SwitchContextRequest {
    pub context: String,
}

/// Tears down the active cluster client and every session it was
/// holding (port-forwards, exec, log-follow), then rebuilds against
/// `context`. Sessions do not survive a context switch by design, so
/// this is the one place that closes all of them at once on success.
pub async fn switch_context(
    State(state): State<AppState>,
    Json(req): Json<SwitchContextRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    gate_write(&state)?;
    state
        .facade
        .switch_context(&req.context)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    state.refresh_sessions().await;
    Ok(Json(serde_json::json!({ "context": req.context })))
}
