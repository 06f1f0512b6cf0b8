//! Shared helpers for snailtrack-server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use serde_json::Value;
use snailtrack_common::api::basic_header_value;
use snailtrack_common::config::{AuthConfig, AuthMode, Credentials, MatchingConfig};
use snailtrack_common::db::init_database;
use snailtrack_server::ai::{
    AgeEstimate, AgeEstimator, CapabilityError, Comparison, EmbeddingGenerator, ImageAnalyzer,
    PairwiseComparator, SnailAnalysis,
};
use snailtrack_server::blob::LocalBlobStore;
use snailtrack_server::{build_router, AppState, Capabilities};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const USER: &str = "family";
pub const PASS: &str = "garden:snails";

/// Scripted AI provider
///
/// Comparisons and embeddings are looked up by image URL. Unknown URLs fail.
#[derive(Default)]
pub struct MockAi {
    pub comparisons: Mutex<HashMap<String, u8>>,
    pub embeddings: Mutex<HashMap<String, Vec<f32>>>,
    pub analysis_fails: bool,
}

impl MockAi {
    pub fn compare_as(&self, candidate_url: &str, confidence: u8) {
        self.comparisons
            .lock()
            .unwrap()
            .insert(candidate_url.to_string(), confidence);
    }

    pub fn embed_as(&self, url: &str, embedding: Vec<f32>) {
        self.embeddings
            .lock()
            .unwrap()
            .insert(url.to_string(), embedding);
    }
}

#[async_trait]
impl ImageAnalyzer for MockAi {
    async fn analyze_image(&self, _image_url: &str) -> Result<SnailAnalysis, CapabilityError> {
        if self.analysis_fails {
            return Err(CapabilityError::Api {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        Ok(SnailAnalysis {
            species: "Cornu aspersum".to_string(),
            age: "adult".to_string(),
            age_explanation: "Thick, glossy shell lip".to_string(),
            age_confidence: "medium".to_string(),
            distinctive_features: vec!["dark spiral bands".to_string()],
        })
    }
}

#[async_trait]
impl AgeEstimator for MockAi {
    async fn estimate_age(&self, _image_url: &str) -> Result<AgeEstimate, CapabilityError> {
        Ok(AgeEstimate {
            approx_age_label: "juvenile".to_string(),
            explanation: "Small shell with a thin lip".to_string(),
            confidence: "high".to_string(),
        })
    }
}

#[async_trait]
impl PairwiseComparator for MockAi {
    async fn compare(&self, _a: &str, b: &str) -> Result<Comparison, CapabilityError> {
        let confidence = self.comparisons.lock().unwrap().get(b).copied();
        confidence
            .map(|confidence| Comparison {
                confidence,
                reasoning: format!("compared with {}", b),
            })
            .ok_or_else(|| CapabilityError::Network("connection reset".to_string()))
    }
}

#[async_trait]
impl EmbeddingGenerator for MockAi {
    async fn embed_image(&self, image_url: &str) -> Result<Vec<f32>, CapabilityError> {
        let embedding = self.embeddings.lock().unwrap().get(image_url).cloned();
        embedding.ok_or_else(|| CapabilityError::Network("no embedding".to_string()))
    }
}

/// Router over a fresh on-disk database in a temp dir
pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub ai: Arc<MockAi>,
    pub dir: TempDir,
}

impl TestApp {
    /// Auth enabled, scripted AI
    pub async fn new() -> Self {
        Self::with_ai(MockAi::default()).await
    }

    pub async fn with_ai(ai: MockAi) -> Self {
        let mode = AuthMode::Basic(Credentials {
            username: USER.to_string(),
            password: PASS.to_string(),
        });
        Self::build(Some(ai), mode).await
    }

    /// Auth explicitly disabled, no AI provider
    pub async fn open_unconfigured() -> Self {
        Self::build(None, AuthMode::Disabled).await
    }

    /// No credentials configured and auth not disabled
    pub async fn locked() -> Self {
        Self::build(Some(MockAi::default()), AuthMode::Locked).await
    }

    async fn build(ai: Option<MockAi>, mode: AuthMode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("snailtrack.db")).await.unwrap();
        let images_dir = dir.path().join("images");

        let configured = ai.is_some();
        let ai = Arc::new(ai.unwrap_or_default());
        let capabilities = if configured {
            Capabilities::from_client(ai.clone())
        } else {
            Capabilities::unconfigured()
        };

        let auth = AuthConfig { mode };

        let state = AppState::new(
            pool.clone(),
            auth,
            capabilities,
            Arc::new(LocalBlobStore::new(images_dir.clone(), "http://snails.test")),
            images_dir,
            MatchingConfig::default(),
        );

        Self {
            router: build_router(state),
            pool,
            ai,
            dir,
        }
    }
}

/// Authenticated request with an optional JSON body
pub fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic_header_value(USER, PASS));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Request without credentials
pub fn anonymous(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
