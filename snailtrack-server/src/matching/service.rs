//! Matching entry points used by the HTTP layer

use snailtrack_common::config::{IdentifyStrategy, MatchingConfig};
use std::sync::Arc;
use tracing::{debug, info};

use super::aggregator::find_matches;
use super::candidates::CandidateRepository;
use super::scorer::{EmbeddingScorer, PairwiseVisionScorer};
use super::{MatchError, MatchOptions, MatchQuery, MatchResult};
use crate::ai::{EmbeddingGenerator, PairwiseComparator};

/// Runs one matching request: fetch candidates, pick a scorer, aggregate
///
/// Candidates are fetched fresh per request; nothing is held across the
/// scoring fan-out.
pub struct MatchService {
    candidates: Arc<dyn CandidateRepository>,
    comparator: Arc<dyn PairwiseComparator>,
    embedder: Arc<dyn EmbeddingGenerator>,
    config: MatchingConfig,
}

impl MatchService {
    pub fn new(
        candidates: Arc<dyn CandidateRepository>,
        comparator: Arc<dyn PairwiseComparator>,
        embedder: Arc<dyn EmbeddingGenerator>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            candidates,
            comparator,
            embedder,
            config,
        }
    }

    /// Score the photo against every candidate with the vision comparator
    pub async fn match_pairwise(&self, image_url: &str) -> Result<Vec<MatchResult>, MatchError> {
        let image_url = require_url(image_url)?;
        let candidates = self.candidates.list_candidates(self.config.candidate_limit).await?;

        let scorer = PairwiseVisionScorer::new(Arc::clone(&self.comparator));
        let query = MatchQuery::from_url(image_url);
        let results = find_matches(&query, &candidates, &scorer, &MatchOptions::pairwise(&self.config)).await?;

        info!(
            candidates = candidates.len(),
            matches = results.len(),
            "Pairwise matching complete"
        );
        Ok(results)
    }

    /// Embed the photo and rank candidates by cosine similarity
    ///
    /// The query embedding is only requested when at least one candidate
    /// carries a stored embedding. Failure to embed the query fails the
    /// whole request, as does a query whose dimension no stored embedding
    /// shares.
    pub async fn match_embedding(&self, image_url: &str) -> Result<Vec<MatchResult>, MatchError> {
        let image_url = require_url(image_url)?;
        let candidates = self.candidates.list_candidates(self.config.candidate_limit).await?;

        if !candidates.iter().any(|c| c.embedding.is_some()) {
            debug!(
                candidates = candidates.len(),
                "No candidate has a stored embedding, skipping query embedding"
            );
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_image(image_url).await?;
        let query = MatchQuery::from_url(image_url).with_embedding(embedding);
        let results = find_matches(&query, &candidates, &EmbeddingScorer, &MatchOptions::embedding(&self.config)).await?;

        info!(
            candidates = candidates.len(),
            matches = results.len(),
            "Embedding matching complete"
        );
        Ok(results)
    }

    /// Identify with the requested strategy, or the configured default
    pub async fn identify(
        &self,
        image_url: &str,
        strategy: Option<IdentifyStrategy>,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let strategy = strategy.unwrap_or(self.config.identify_strategy);
        debug!(%strategy, "Identify request");

        match strategy {
            IdentifyStrategy::Embedding => self.match_embedding(image_url).await,
            IdentifyStrategy::Pairwise => self.match_pairwise(image_url).await,
        }
    }
}

fn require_url(image_url: &str) -> Result<&str, MatchError> {
    let trimmed = image_url.trim();
    if trimmed.is_empty() {
        return Err(MatchError::Validation("Image URL is required".to_string()));
    }
    Ok(trimmed)
}
