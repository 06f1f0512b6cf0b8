//! Similarity scoring strategies
//!
//! Both strategies implement [`SimilarityScorer`] so the aggregator can run
//! either one over a candidate set:
//! - [`PairwiseVisionScorer`] asks an external comparator whether two photos
//!   show the same snail
//! - [`EmbeddingScorer`] computes cosine similarity of stored vectors

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use super::{CandidateRow, MatchError, MatchQuery};
use crate::ai::{CapabilityError, PairwiseComparator};

/// Score for one candidate (confidence 0-100)
#[derive(Debug, Clone, PartialEq)]
pub struct Similarity {
    pub confidence: u8,
    pub rationale: Option<String>,
}

/// Per-candidate scoring failure. Never leaves the aggregator.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("capability failed: {0}")]
    Capability(#[from] CapabilityError),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Scores a query photo against one candidate
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &'static str;

    /// Reject a query this strategy cannot score, before any scoring I/O
    fn validate_query(&self, _query: &MatchQuery) -> Result<(), MatchError> {
        Ok(())
    }

    /// Whether a candidate is scorable against this query at all. Rejected
    /// candidates are excluded, not scored as zero.
    fn accepts(&self, _query: &MatchQuery, _candidate: &CandidateRow) -> bool {
        true
    }

    /// Reject a query that none of the candidates can be compared with
    fn validate_candidates(
        &self,
        _query: &MatchQuery,
        _candidates: &[CandidateRow],
    ) -> Result<(), MatchError> {
        Ok(())
    }

    async fn score(
        &self,
        query: &MatchQuery,
        candidate: &CandidateRow,
    ) -> Result<Similarity, ScoringError>;
}

// ============================================================================
// Pairwise vision comparison
// ============================================================================

/// Delegates each candidate to an external "same individual?" comparator
pub struct PairwiseVisionScorer {
    comparator: Arc<dyn PairwiseComparator>,
}

impl PairwiseVisionScorer {
    pub fn new(comparator: Arc<dyn PairwiseComparator>) -> Self {
        Self { comparator }
    }
}

#[async_trait]
impl SimilarityScorer for PairwiseVisionScorer {
    fn name(&self) -> &'static str {
        "pairwise"
    }

    fn validate_query(&self, query: &MatchQuery) -> Result<(), MatchError> {
        if query.image_url.trim().is_empty() {
            return Err(MatchError::Validation("Image URL is required".to_string()));
        }
        Ok(())
    }

    async fn score(
        &self,
        query: &MatchQuery,
        candidate: &CandidateRow,
    ) -> Result<Similarity, ScoringError> {
        let comparison = self
            .comparator
            .compare(&query.image_url, &candidate.image_url)
            .await?;

        Ok(Similarity {
            confidence: comparison.confidence.min(100),
            rationale: Some(comparison.reasoning),
        })
    }
}

// ============================================================================
// Embedding cosine similarity
// ============================================================================

/// Cosine similarity over stored embeddings. Candidates without an
/// embedding, or with one of a different dimension than the query, are
/// skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddingScorer;

#[async_trait]
impl SimilarityScorer for EmbeddingScorer {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn validate_query(&self, query: &MatchQuery) -> Result<(), MatchError> {
        let embedding = query
            .embedding
            .as_deref()
            .ok_or_else(|| MatchError::Configuration("Embedding scorer needs a query embedding".to_string()))?;
        if embedding.is_empty() {
            return Err(MatchError::Validation("Query embedding is empty".to_string()));
        }
        if norm(embedding) == 0.0 {
            return Err(MatchError::Validation("Query embedding has zero magnitude".to_string()));
        }
        Ok(())
    }

    fn accepts(&self, query: &MatchQuery, candidate: &CandidateRow) -> bool {
        match (query.embedding.as_deref(), candidate.embedding.as_deref()) {
            (Some(q), Some(c)) => q.len() == c.len(),
            _ => false,
        }
    }

    fn validate_candidates(
        &self,
        query: &MatchQuery,
        candidates: &[CandidateRow],
    ) -> Result<(), MatchError> {
        let dimension = query.embedding.as_ref().map_or(0, Vec::len);
        let stored = candidates.iter().filter(|c| c.embedding.is_some()).count();
        let comparable = candidates.iter().filter(|c| self.accepts(query, c)).count();

        let mismatched = stored - comparable;
        if mismatched == 0 {
            return Ok(());
        }
        warn!(
            dimension,
            mismatched, comparable, "Stored embeddings with a different dimension excluded"
        );

        if comparable == 0 {
            return Err(MatchError::Validation(format!(
                "No stored embedding has the query's dimension ({})",
                dimension
            )));
        }
        Ok(())
    }

    async fn score(
        &self,
        query: &MatchQuery,
        candidate: &CandidateRow,
    ) -> Result<Similarity, ScoringError> {
        let (Some(q), Some(c)) = (query.embedding.as_deref(), candidate.embedding.as_deref()) else {
            return Err(ScoringError::Invalid("missing embedding".to_string()));
        };

        let confidence = cosine_confidence(q, c).map_err(|e| ScoringError::Invalid(e.to_string()))?;
        Ok(Similarity {
            confidence,
            rationale: None,
        })
    }
}

/// Cosine similarity scaled to a 0-100 confidence
///
/// `dot(a, b) / (|a| * |b|)`, times 100, rounded. Negative similarity maps
/// to 0. Empty, zero-magnitude or mismatched vectors are a validation error.
pub fn cosine_confidence(a: &[f32], b: &[f32]) -> Result<u8, MatchError> {
    if a.is_empty() || b.is_empty() {
        return Err(MatchError::Validation("Embedding vectors must not be empty".to_string()));
    }
    if a.len() != b.len() {
        return Err(MatchError::Validation(format!(
            "Embedding length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        return Err(MatchError::Validation("Embedding has zero magnitude".to_string()));
    }

    let similarity = dot / denom;
    Ok((similarity * 100.0).round().clamp(0.0, 100.0) as u8)
}

fn norm(v: &[f32]) -> f64 {
    v.iter().map(|x| *x as f64 * *x as f64).sum::<f64>().sqrt()
}
