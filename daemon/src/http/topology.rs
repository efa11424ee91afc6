use axum::extract::{Query, State};
use axum::Json;
use kview_core::topology::{Topology, ViewMode};
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct TopologyQuery {
    #[serde(default)]
    pub view: Option<String>,
    pub namespace: Option<String>,
}

pub async fn get_topology(
    State(state): State<AppState>,
    Query(q): Query<TopologyQuery>,
) -> Result<Json<Topology>, ApiError> {
    let view_mode = match q.view.as_deref() {
        Some("traffic") => ViewMode::Traffic,
        _ => ViewMode::Resources,
    };
    let mut rx = state.topology.subscribe(view_mode, q.namespace).await;
    let snapshot = rx.borrow_and_update().clone();
    Ok(Json((*snapshot.topology).clone()))
}
