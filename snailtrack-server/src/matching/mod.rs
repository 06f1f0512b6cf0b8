//! Snail re-identification
//!
//! Decides which previously recorded snail (if any) a new photo shows.
//!
//! # Pipeline
//! 1. **candidates** - one representative image per known snail
//! 2. **scorer** - scores the query against one candidate (pairwise vision
//!    comparison or embedding cosine similarity)
//! 3. **aggregator** - concurrent fan-out over all candidates, per-candidate
//!    error isolation, confidence floor, ranking, top-N
//! 4. **facade** - image analysis merged with a pairwise matching run
//!
//! [`MatchService`] wires the repository, scorers and options together for
//! the HTTP handlers.

pub mod aggregator;
pub mod candidates;
pub mod facade;
pub mod scorer;
pub mod service;

pub use aggregator::find_matches;
pub use candidates::{CandidateRepository, SqliteCandidateRepository};
pub use facade::{AgeReport, AnalysisFacade, AnalysisReport};
pub use scorer::{cosine_confidence, EmbeddingScorer, PairwiseVisionScorer, SimilarityScorer};
pub use service::MatchService;

use serde::Serialize;
use snailtrack_common::config::MatchingConfig;
use std::time::Duration;
use thiserror::Error;

use crate::ai::CapabilityError;

/// Projection of a known snail used only while matching
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    pub snail_id: i64,
    pub name: String,
    pub species_tag: String,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

/// The photo being identified
#[derive(Debug, Clone, Default)]
pub struct MatchQuery {
    pub image_url: String,
    /// Required by the embedding strategy only
    pub embedding: Option<Vec<f32>>,
}

impl MatchQuery {
    pub fn from_url(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// One ranked match. Confidence is always within 0-100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub snail_id: i64,
    pub snail_name: String,
    pub species_tag: String,
    pub thumbnail_url: String,
    pub confidence: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Aggregation knobs
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Results below this confidence are dropped (0 = no floor)
    pub confidence_floor: u8,
    pub top_n: usize,
    /// Per-candidate scoring timeout
    pub scoring_timeout: Duration,
    /// Cap on the whole fan-out; unfinished candidates count as failures
    pub fanout_timeout: Option<Duration>,
}

impl MatchOptions {
    /// Pairwise comparison: configured floor applies
    pub fn pairwise(config: &MatchingConfig) -> Self {
        Self {
            confidence_floor: config.confidence_floor,
            top_n: config.top_n,
            scoring_timeout: config.scoring_timeout,
            fanout_timeout: Some(config.fanout_timeout),
        }
    }

    /// Embedding similarity: no floor, every scored candidate is ranked
    pub fn embedding(config: &MatchingConfig) -> Self {
        Self {
            confidence_floor: 0,
            ..Self::pairwise(config)
        }
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self::pairwise(&MatchingConfig::default())
    }
}

/// Matching failures visible to callers
///
/// Per-candidate scoring failures never appear here; the aggregator absorbs them.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Malformed input, rejected before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    /// Candidate fetch failed
    #[error("Repository error: {0}")]
    Repository(String),

    /// Scorer cannot run as configured
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Whole-request capability call failed (e.g. query embedding)
    #[error("External capability error: {0}")]
    Capability(#[from] CapabilityError),
}
