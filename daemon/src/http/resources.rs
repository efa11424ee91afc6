use axum::extract::{Path, Query, State};
use axum::Json;
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams};
use kview_core::CachedObject;
use serde::{Deserialize, Serialize};

use super::{gate_capability, gate_write, AppState};
use crate::error::ApiError;

#[derive(Serialize)]
pub struct ClusterInfo {
    pub context: Option<String>,
    pub read_only: bool,
}

pub async fn cluster_info(State(state): State<AppState>) -> Json<ClusterInfo> {
    Json(ClusterInfo {
        context: state.facade.context_name().await,
        read_only: state.read_only,
    })
}

pub async fn capabilities(State(state): State<AppState>) -> Json<kview_core::Capabilities> {
    Json(state.prober.capabilities().await)
}

#[derive(Serialize)]
pub struct ApiResourceEntry {
    pub kind: String,
    pub group: String,
    pub version: String,
    pub namespaced: bool,
    pub curated: bool,
}

pub async fn api_resources(State(state): State<AppState>) -> Result<Json<Vec<ApiResourceEntry>>, ApiError> {
    let mut out = Vec::new();
    if let Some(typed) = state.facade.typed().await {
        for k in typed.available_kinds().await {
            out.push(ApiResourceEntry {
                kind: k.kind,
                group: k.group,
                version: k.version,
                namespaced: k.namespaced,
                curated: true,
            });
        }
    }
    if let Some(dynamic) = state.facade.dynamic().await {
        for k in dynamic.available_kinds().await {
            out.push(ApiResourceEntry {
                kind: k.kind,
                group: k.group,
                version: k.version,
                namespaced: k.namespaced,
                curated: false,
            });
        }
    }
    Ok(Json(out))
}

pub async fn namespaces(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let typed = state.facade.typed().await.ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    let objects = typed.all_objects();
    let mut names: Vec<String> = objects
        .into_iter()
        .filter(|(r, _)| r.kind == "Namespace")
        .map(|(r, _)| r.name)
        .collect();
    names.sort();
    names.dedup();
    Ok(Json(names))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub namespace: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<CachedObject>>, ApiError> {
    if let Some(typed) = state.facade.typed().await {
        if let Some(snapshot) = typed.snapshot(&kind) {
            let items = snapshot.list(q.namespace.as_deref()).into_iter().cloned().collect();
            return Ok(Json(items));
        }
    }
    let dynamic = state.facade.dynamic().await.ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    let items = dynamic.list_dynamic(&kind, q.namespace.as_deref()).await?;
    Ok(Json(items))
}

pub async fn get(
    State(state): State<AppState>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> Result<Json<CachedObject>, ApiError> {
    if let Some(typed) = state.facade.typed().await {
        if let Some(snapshot) = typed.snapshot(&kind) {
            if let Some(obj) = snapshot.get(&namespace, &name) {
                return Ok(Json(obj.clone()));
            }
        }
    }
    let dynamic = state.facade.dynamic().await.ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    let obj = dynamic
        .get_dynamic(&kind, &namespace, &name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{kind}/{namespace}/{name}")))?;
    Ok(Json(obj))
}

pub async fn put(
    State(state): State<AppState>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<CachedObject>, ApiError> {
    gate_write(&state)?;
    if kind == "Secret" {
        gate_capability(&state, kview_core::Capability::Secrets).await?;
    }
    let client = state.facade.client().await.ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    let descriptor = resolve_descriptor(&state, &kind).await?;
    let api: Api<DynamicObject> = Api::namespaced_with(client, &namespace, &descriptor);
    let patched = api
        .patch(&name, &PatchParams::apply("kviewd"), &Patch::Merge(body))
        .await?;
    let cached = CachedObject::from_dynamic(&patched).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(cached))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> Result<(), ApiError> {
    gate_write(&state)?;
    if kind == "Secret" {
        gate_capability(&state, kview_core::Capability::Secrets).await?;
    }
    let client = state.facade.client().await.ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    let descriptor = resolve_descriptor(&state, &kind).await?;
    let api: Api<DynamicObject> = Api::namespaced_with(client, &namespace, &descriptor);
    api.delete(&name, &Default::default()).await?;
    Ok(())
}

async fn resolve_descriptor(state: &AppState, kind: &str) -> Result<ApiResource, ApiError> {
    let dynamic = state.facade.dynamic().await.ok_or_else(|| ApiError::ClientNotReady("no active cluster".into()))?;
    dynamic
        .api_resource_for(kind)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("unknown kind {kind}")))
}
