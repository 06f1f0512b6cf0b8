//! snailtrack-server library
//!
//! HTTP service for tracking garden snails: individual records, sightings,
//! photo uploads, and AI-assisted re-identification of previously seen
//! snails from a new photo.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use snailtrack_common::config::{AuthConfig, MatchingConfig};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod ai;
pub mod api;
pub mod blob;
pub mod config;
pub mod db;
pub mod error;
pub mod matching;

use ai::{AgeEstimator, EmbeddingGenerator, ImageAnalyzer, PairwiseComparator, Unconfigured};
use blob::BlobStore;
use matching::{AnalysisFacade, MatchService, SqliteCandidateRepository};

/// Uploads arrive base64-encoded inside JSON
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// AI capability handles injected into the service
#[derive(Clone)]
pub struct Capabilities {
    pub analyzer: Arc<dyn ImageAnalyzer>,
    pub age_estimator: Arc<dyn AgeEstimator>,
    pub comparator: Arc<dyn PairwiseComparator>,
    pub embedder: Arc<dyn EmbeddingGenerator>,
}

impl Capabilities {
    /// Every capability served by one client
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: ImageAnalyzer + AgeEstimator + PairwiseComparator + EmbeddingGenerator + 'static,
    {
        Self {
            analyzer: client.clone(),
            age_estimator: client.clone(),
            comparator: client.clone(),
            embedder: client,
        }
    }

    /// Every AI call fails with "not configured"
    pub fn unconfigured() -> Self {
        Self::from_client(Arc::new(Unconfigured))
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub auth: Arc<AuthConfig>,
    pub capabilities: Capabilities,
    pub blobs: Arc<dyn BlobStore>,
    /// Directory served at `/images`
    pub images_dir: PathBuf,
    pub matcher: Arc<MatchService>,
    pub facade: Arc<AnalysisFacade>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        auth: AuthConfig,
        capabilities: Capabilities,
        blobs: Arc<dyn BlobStore>,
        images_dir: PathBuf,
        matching: MatchingConfig,
    ) -> Self {
        let matcher = Arc::new(MatchService::new(
            Arc::new(SqliteCandidateRepository::new(db.clone())),
            capabilities.comparator.clone(),
            capabilities.embedder.clone(),
            matching,
        ));
        let facade = Arc::new(AnalysisFacade::new(
            capabilities.analyzer.clone(),
            matcher.clone(),
        ));

        Self {
            db,
            auth: Arc::new(auth),
            capabilities,
            blobs,
            images_dir,
            matcher,
            facade,
        }
    }
}

/// Build application router
///
/// Every `/api` route sits behind the Basic-Auth gate. `/health` and the
/// stored images are public.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post, put};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/snails", get(api::list_snails).post(api::create_snail))
        .route(
            "/api/snails/:id",
            get(api::get_snail).put(api::update_snail).delete(api::delete_snail),
        )
        .route("/api/snails/:id/images", post(api::add_image))
        .route(
            "/api/snails/:id/images/:image_id/primary",
            put(api::set_primary_image),
        )
        .route("/api/snails/:id/sightings", post(api::create_sighting))
        .route("/api/sightings/:id", delete(api::delete_sighting))
        .route("/api/upload", post(api::upload))
        .route("/api/ai/estimate-age", post(api::estimate_age))
        .route("/api/ai/analyze", post(api::analyze))
        .route("/api/ai/identify", post(api::identify))
        .route("/api/buildinfo", get(api::get_build_info))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .merge(api::health_routes())
        .nest_service("/images", ServeDir::new(&state.images_dir));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
