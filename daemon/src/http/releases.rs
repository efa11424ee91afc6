use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use super::{gate_write, AppState};
use crate::error::ApiError;
use crate::release_ops::{ReleaseHistoryEntry, ReleaseOpsError, ReleaseOutcome, ReleaseSummary};

impl From<ReleaseOpsError> for ApiError {
    fn from(e: ReleaseOpsError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[derive(Deserialize)]
pub struct ListReleasesQuery {
    pub namespace: String,
}

pub async fn list(
    State(state): State<AppState>,
    Query(q): Query<ListReleasesQuery>,
) -> Result<Json<Vec<ReleaseSummary>>, ApiError> {
    Ok(Json(state.releases.list(&q.namespace).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<ReleaseSummary>, ApiError> {
    Ok(Json(state.releases.get(&namespace, &name).await?))
}

pub async fn manifest(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<String, ApiError> {
    Ok(state.releases.manifest(&namespace, &name).await?)
}

pub async fn values(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.releases.values(&namespace, &name).await?))
}

pub async fn history(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Vec<ReleaseHistoryEntry>>, ApiError> {
    Ok(Json(state.releases.history(&namespace, &name).await?))
}

#[derive(Deserialize)]
pub struct ChartValuesRequest {
    pub chart: String,
    #[serde(default)]
    pub values: serde_json::Value,
}

pub async fn diff(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(req): Json<ChartValuesRequest>,
) -> Result<String, ApiError> {
    Ok(state.releases.diff(&namespace, &name, &req.chart, &req.values).await?)
}

pub async fn upgrade_check(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(req): Json<ChartValuesRequest>,
) -> Result<String, ApiError> {
    Ok(state.releases.upgrade_check(&namespace, &name, &req.chart, &req.values).await?)
}

#[derive(Deserialize)]
pub struct RollbackRequest {
    pub revision: u32,
}

pub async fn rollback(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(req): Json<RollbackRequest>,
) -> Result<Json<ReleaseOutcome>, ApiError> {
    gate_write(&state)?;
    Ok(Json(state.releases.rollback(&namespace, &name, req.revision).await?))
}

pub async fn upgrade(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(req): Json<ChartValuesRequest>,
) -> Result<Json<ReleaseOutcome>, ApiError> {
    gate_write(&state)?;
    Ok(Json(state.releases.upgrade(&namespace, &name, &req.chart, &req.values).await?))
}

pub async fn uninstall(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<ReleaseOutcome>, ApiError> {
    gate_write(&state)?;
    Ok(Json(state.releases.uninstall(&namespace, &name).await?))
}
