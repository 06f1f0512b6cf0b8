//! External AI capabilities
//!
//! Four narrow traits, one per capability the service consumes. The
//! OpenAI-compatible client implements all of them; tests inject mocks.
//!
//! # Capabilities
//! 1. **ImageAnalyzer** - species, age and distinctive features from one photo
//! 2. **AgeEstimator** - kid-friendly age estimate from one photo
//! 3. **PairwiseComparator** - "same individual?" judgment for two photos
//! 4. **EmbeddingGenerator** - fixed-length vector for one photo

pub mod openai_client;
pub mod parsing;

pub use openai_client::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Species/age/feature extraction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnailAnalysis {
    pub species: String,
    pub age: String,
    pub age_explanation: String,
    pub age_confidence: String,
    pub distinctive_features: Vec<String>,
}

/// Age estimate as returned by `/api/ai/estimate-age`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeEstimate {
    pub approx_age_label: String,
    pub explanation: String,
    pub confidence: String,
}

/// Pairwise comparison judgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Likelihood both photos show the same individual (0-100)
    pub confidence: u8,
    pub reasoning: String,
}

impl Comparison {
    /// Neutral result used when the model reply cannot be read
    pub fn unable_to_compare() -> Self {
        Self {
            confidence: 0,
            reasoning: "unable to compare".to_string(),
        }
    }
}

/// External capability failure
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// No provider configured (missing API key)
    #[error("AI capability not configured")]
    NotConfigured,

    /// Request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered with a non-success status
    #[error("Provider returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Response envelope could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Request timed out")]
    Timeout,
}

impl From<reqwest::Error> for CapabilityError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CapabilityError::Timeout
        } else if e.is_decode() {
            CapabilityError::Parse(e.to_string())
        } else {
            CapabilityError::Network(e.to_string())
        }
    }
}

#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze_image(&self, image_url: &str) -> Result<SnailAnalysis, CapabilityError>;
}

#[async_trait]
pub trait AgeEstimator: Send + Sync {
    async fn estimate_age(&self, image_url: &str) -> Result<AgeEstimate, CapabilityError>;
}

#[async_trait]
pub trait PairwiseComparator: Send + Sync {
    /// Judge whether `image_a` and `image_b` show the same snail.
    ///
    /// A reply that is not well-formed degrades to
    /// [`Comparison::unable_to_compare`] instead of failing.
    async fn compare(&self, image_a: &str, image_b: &str) -> Result<Comparison, CapabilityError>;
}

#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    async fn embed_image(&self, image_url: &str) -> Result<Vec<f32>, CapabilityError>;
}

/// Stand-in used when no provider is configured. Every call fails with
/// [`CapabilityError::NotConfigured`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl ImageAnalyzer for Unconfigured {
    async fn analyze_image(&self, _image_url: &str) -> Result<SnailAnalysis, CapabilityError> {
        Err(CapabilityError::NotConfigured)
    }
}

#[async_trait]
impl AgeEstimator for Unconfigured {
    async fn estimate_age(&self, _image_url: &str) -> Result<AgeEstimate, CapabilityError> {
        Err(CapabilityError::NotConfigured)
    }
}

#[async_trait]
impl PairwiseComparator for Unconfigured {
    async fn compare(&self, _a: &str, _b: &str) -> Result<Comparison, CapabilityError> {
        Err(CapabilityError::NotConfigured)
    }
}

#[async_trait]
impl EmbeddingGenerator for Unconfigured {
    async fn embed_image(&self, _image_url: &str) -> Result<Vec<f32>, CapabilityError> {
        Err(CapabilityError::NotConfigured)
    }
}
