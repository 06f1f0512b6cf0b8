//! Snail endpoints
//!
//! - `GET/POST /api/snails`
//! - `GET/PUT/DELETE /api/snails/:id`
//! - `POST /api/snails/:id/images`
//! - `PUT /api/snails/:id/images/:image_id/primary`

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use snailtrack_common::db::{NewImage, NewSnail, Snail, SnailImage, SnailUpdate};
use tracing::{debug, info, warn};

use crate::ai::CapabilityError;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const DEFAULT_SPECIES: &str = "Garden snail";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub search: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSnailRequest {
    pub name: Option<String>,
    pub species_tag: Option<String>,
    pub notes: Option<String>,
    pub approx_age: Option<String>,
    pub age_explanation: Option<String>,
    pub age_confidence: Option<String>,
    #[serde(default)]
    pub images: Vec<NewImage>,
}

#[derive(Debug, Deserialize)]
pub struct AddImageRequest {
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

/// Newly created snail with its stored images
#[derive(Debug, Serialize)]
struct CreatedSnail {
    #[serde(flatten)]
    snail: Snail,
    images: Vec<SnailImage>,
}

/// GET /api/snails
pub async fn list_snails(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Value>> {
    let sort = db::SnailSort::from_param(params.sort_by.as_deref());
    let snails = db::list_snails(&state.db, params.search.as_deref(), sort).await?;
    Ok(Json(json!({ "snails": snails })))
}

/// POST /api/snails
pub async fn create_snail(
    State(state): State<AppState>,
    Json(req): Json<CreateSnailRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let name = non_empty(req.name).ok_or_else(|| ApiError::BadRequest("Name is required".to_string()))?;

    let images: Vec<NewImage> = req
        .images
        .into_iter()
        .filter(|img| !img.url.trim().is_empty())
        .collect();
    if images.is_empty() {
        return Err(ApiError::BadRequest("At least one image is required".to_string()));
    }

    let new = NewSnail {
        name,
        species_tag: non_empty(req.species_tag).unwrap_or_else(|| DEFAULT_SPECIES.to_string()),
        approx_age: req.approx_age,
        age_explanation: req.age_explanation,
        age_confidence: req.age_confidence,
        notes: req.notes,
        images,
    };

    let (snail, images) = db::create_snail(&state.db, &new).await?;
    info!(snail_id = snail.id, name = %snail.name, images = images.len(), "Created snail");

    embed_images(&state, &images).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "snail": CreatedSnail { snail, images } })),
    ))
}

/// GET /api/snails/:id
pub async fn get_snail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let detail = db::get_snail_detail(&state.db, id)
        .await?
        .ok_or_else(|| snail_not_found(id))?;
    Ok(Json(json!({ "snail": detail })))
}

/// PUT /api/snails/:id
pub async fn update_snail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<SnailUpdate>,
) -> ApiResult<Json<Value>> {
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest("Name cannot be empty".to_string()));
    }

    let snail = db::update_snail(&state.db, id, &update)
        .await?
        .ok_or_else(|| snail_not_found(id))?;
    info!(snail_id = id, "Updated snail");
    Ok(Json(json!({ "snail": snail })))
}

/// DELETE /api/snails/:id
pub async fn delete_snail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !db::delete_snail(&state.db, id).await? {
        return Err(snail_not_found(id));
    }
    info!(snail_id = id, "Deleted snail");
    Ok(Json(json!({ "message": "Snail deleted successfully" })))
}

/// POST /api/snails/:id/images
pub async fn add_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AddImageRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let url = non_empty(req.url).ok_or_else(|| ApiError::BadRequest("Image URL is required".to_string()))?;
    let new = NewImage {
        url,
        thumbnail_url: req.thumbnail_url,
    };

    let image = db::add_image(&state.db, id, &new, req.is_primary)
        .await?
        .ok_or_else(|| snail_not_found(id))?;
    debug!(snail_id = id, image_id = image.id, primary = image.is_primary, "Added image");

    embed_images(&state, std::slice::from_ref(&image)).await;

    Ok((StatusCode::CREATED, Json(json!({ "image": image }))))
}

/// PUT /api/snails/:id/images/:image_id/primary
pub async fn set_primary_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(i64, i64)>,
) -> ApiResult<Json<Value>> {
    let image = db::set_primary_image(&state.db, id, image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Image {} not found for snail {}", image_id, id)))?;
    info!(snail_id = id, image_id, "Primary image changed");
    Ok(Json(json!({ "image": image })))
}

/// Compute and store embeddings for new images
///
/// Best effort: a missing provider or a failed call leaves the image without
/// an embedding, which only excludes it from embedding-based matching.
async fn embed_images(state: &AppState, images: &[SnailImage]) {
    let embedder = &state.capabilities.embedder;

    let results = join_all(images.iter().map(|image| async move {
        (image.id, embedder.embed_image(&image.image_url).await)
    }))
    .await;

    for (image_id, result) in results {
        match result {
            Ok(embedding) => {
                if let Err(e) = db::store_embedding(&state.db, image_id, &embedding).await {
                    warn!(image_id, error = %e, "Failed to store embedding");
                }
            }
            Err(CapabilityError::NotConfigured) => {
                debug!(image_id, "No embedding provider configured, skipping");
            }
            Err(e) => warn!(image_id, error = %e, "Embedding generation failed"),
        }
    }
}

fn snail_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Snail {} not found", id))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
