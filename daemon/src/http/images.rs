use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use oci_util::image_reference::ImageReference;
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ImageQuery {
    pub reference: String,
}

fn parse_reference(raw: &str) -> Result<ImageReference, ApiError> {
    raw.parse::<ImageReference>()
        .map_err(|e| ApiError::BadRequest(format!("invalid image reference: {e}")))
}

pub async fn metadata(
    State(state): State<AppState>,
    Query(q): Query<ImageQuery>,
) -> Result<Json<crate::image::ImageMetadata>, ApiError> {
    let reference = parse_reference(&q.reference)?;
    let meta = state.images.metadata(&reference).await.map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(meta))
}

pub async fn inspect(
    State(state): State<AppState>,
    Query(q): Query<ImageQuery>,
) -> Result<Json<crate::image::ImageMetadata>, ApiError> {
    metadata(State(state), Query(q)).await
}

#[derive(Deserialize)]
pub struct FileQuery {
    pub reference: String,
    pub path: String,
}

pub async fn get_file(
    State(state): State<AppState>,
    Query(q): Query<FileQuery>,
) -> Result<Bytes, ApiError> {
    let reference = parse_reference(&q.reference)?;
    let bytes = state
        .images
        .get_file(&reference, &q.path)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(q.path.clone()))?;
    Ok(Bytes::from(bytes))
}
