//! Sighting endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use snailtrack_common::db::{NewImage, NewSighting};
use tracing::info;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSightingRequest {
    pub garden_location: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub images: Vec<NewImage>,
}

/// POST /api/snails/:id/sightings
pub async fn create_sighting(
    State(state): State<AppState>,
    Path(snail_id): Path<i64>,
    Json(req): Json<CreateSightingRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let garden_location = req
        .garden_location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Garden location is required".to_string()))?;

    let new = NewSighting {
        garden_location,
        notes: req.notes,
        images: req
            .images
            .into_iter()
            .filter(|img| !img.url.trim().is_empty())
            .collect(),
    };

    let sighting = db::create_sighting(&state.db, snail_id, &new)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Snail {} not found", snail_id)))?;

    info!(
        snail_id,
        sighting_id = sighting.sighting.id,
        location = %sighting.sighting.garden_location,
        "Recorded sighting"
    );
    Ok((StatusCode::CREATED, Json(json!({ "sighting": sighting }))))
}

/// DELETE /api/sightings/:id
pub async fn delete_sighting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !db::delete_sighting(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Sighting {} not found", id)));
    }
    info!(sighting_id = id, "Deleted sighting");
    Ok(Json(json!({ "message": "Sighting deleted successfully" })))
}
