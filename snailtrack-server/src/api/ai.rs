//! AI endpoints
//!
//! - `POST /api/ai/estimate-age` - age estimate for one photo
//! - `POST /api/ai/analyze` - species, age, features plus pairwise matches
//! - `POST /api/ai/identify` - ranked matches only

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use snailtrack_common::config::IdentifyStrategy;
use tracing::info;

use crate::ai::AgeEstimate;
use crate::error::{ApiError, ApiResult};
use crate::matching::AnalysisReport;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub image_url: Option<String>,
    /// identify only: "embedding" or "pairwise"
    pub strategy: Option<String>,
}

impl ImageRequest {
    fn image_url(&self) -> ApiResult<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Image URL is required".to_string()))
    }
}

/// POST /api/ai/estimate-age
pub async fn estimate_age(
    State(state): State<AppState>,
    Json(req): Json<ImageRequest>,
) -> ApiResult<Json<AgeEstimate>> {
    let image_url = req.image_url()?;
    let estimate = state.capabilities.age_estimator.estimate_age(image_url).await?;
    Ok(Json(estimate))
}

/// POST /api/ai/analyze
pub async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<ImageRequest>,
) -> ApiResult<Json<AnalysisReport>> {
    let image_url = req.image_url()?;
    let report = state.facade.analyze(image_url).await?;
    info!(
        species = %report.species,
        matches = report.matches.len(),
        "Analysis complete"
    );
    Ok(Json(report))
}

/// POST /api/ai/identify
pub async fn identify(
    State(state): State<AppState>,
    Json(req): Json<ImageRequest>,
) -> ApiResult<Json<Value>> {
    let image_url = req.image_url()?;
    let strategy = req
        .strategy
        .as_deref()
        .map(str::parse::<IdentifyStrategy>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let matches = state.matcher.identify(image_url, strategy).await?;
    Ok(Json(json!({ "matches": matches })))
}
