//! Match aggregation
//!
//! Runs one scorer over every candidate concurrently and turns the outcomes
//! into a ranked, truncated match list.
//!
//! # Error isolation
//! Each candidate is scored independently under its own timeout. A failure,
//! timeout or malformed reply for one candidate drops that candidate only;
//! the others are never cancelled or blocked. When every candidate fails the
//! result is an empty list, not an error.
//!
//! # Ranking
//! Confidence descending, then the candidate's position in the input list.
//! Equal scores therefore keep repository order (newest snail first).

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use super::scorer::{ScoringError, Similarity, SimilarityScorer};
use super::{CandidateRow, MatchError, MatchOptions, MatchQuery, MatchResult};

/// Result of scoring one candidate, tagged with its input position
struct Outcome {
    position: usize,
    result: Result<Similarity, ScoringError>,
}

/// Score `query` against every candidate and return the ranked matches
///
/// Output is sorted by confidence (non-increasing), contains no result below
/// `options.confidence_floor`, and holds at most `options.top_n` entries.
///
/// # Errors
/// Only query validation (`Validation` / `Configuration`) fails the call,
/// including a query no candidate can be compared with.
/// Per-candidate scoring failures are logged and skipped.
pub async fn find_matches(
    query: &MatchQuery,
    candidates: &[CandidateRow],
    scorer: &dyn SimilarityScorer,
    options: &MatchOptions,
) -> Result<Vec<MatchResult>, MatchError> {
    scorer.validate_query(query)?;

    if candidates.is_empty() || options.top_n == 0 {
        return Ok(Vec::new());
    }
    scorer.validate_candidates(query, candidates)?;

    let eligible: Vec<(usize, &CandidateRow)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| scorer.accepts(query, c))
        .collect();

    let skipped = candidates.len() - eligible.len();
    if skipped > 0 {
        debug!(
            scorer = scorer.name(),
            skipped, "Candidates not scorable by this strategy were excluded"
        );
    }

    let outcomes = score_all(query, &eligible, scorer, options).await;

    let mut scored: Vec<(usize, Similarity)> = Vec::with_capacity(outcomes.len());
    let mut failed = 0usize;
    for outcome in outcomes {
        match outcome.result {
            Ok(similarity) => scored.push((outcome.position, similarity)),
            Err(e) => {
                failed += 1;
                warn!(
                    scorer = scorer.name(),
                    snail_id = candidates[outcome.position].snail_id,
                    error = %e,
                    "Scoring failed, candidate dropped"
                );
            }
        }
    }
    // Candidates still running when the fan-out cap expired
    failed += eligible.len() - scored.len() - failed;

    let scored_count = scored.len();
    let floor = options.confidence_floor;
    scored.retain(|(_, s)| s.confidence >= floor);

    scored.sort_by(|(pos_a, a), (pos_b, b)| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| pos_a.cmp(pos_b))
    });
    scored.truncate(options.top_n);

    debug!(
        scorer = scorer.name(),
        candidates = candidates.len(),
        scored = scored_count,
        failed,
        kept = scored.len(),
        floor,
        "Match aggregation complete"
    );

    Ok(scored
        .into_iter()
        .map(|(position, similarity)| to_match_result(&candidates[position], similarity))
        .collect())
}

/// Issue every scoring call at once and wait for all outcomes
///
/// With a fan-out cap, collection stops at the deadline and unfinished
/// candidates are simply absent from the returned outcomes.
async fn score_all(
    query: &MatchQuery,
    eligible: &[(usize, &CandidateRow)],
    scorer: &dyn SimilarityScorer,
    options: &MatchOptions,
) -> Vec<Outcome> {
    let per_call = options.scoring_timeout;

    let mut pending: FuturesUnordered<_> = eligible
        .iter()
        .map(|&(position, candidate)| async move {
            let result = match timeout(per_call, scorer.score(query, candidate)).await {
                Ok(result) => result,
                Err(_) => Err(ScoringError::Timeout(per_call)),
            };
            Outcome { position, result }
        })
        .collect();

    let mut outcomes = Vec::with_capacity(eligible.len());
    let deadline = options.fanout_timeout.map(|cap| Instant::now() + cap);

    loop {
        let next = match deadline {
            Some(deadline) => {
                let polled = tokio::time::timeout_at(deadline, pending.next()).await;
                match polled {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            scorer = scorer.name(),
                            unfinished = pending.len(),
                            "Fan-out time cap reached, unfinished candidates dropped"
                        );
                        break;
                    }
                }
            }
            None => pending.next().await,
        };

        match next {
            Some(outcome) => outcomes.push(outcome),
            None => break,
        }
    }

    outcomes
}

fn to_match_result(candidate: &CandidateRow, similarity: Similarity) -> MatchResult {
    MatchResult {
        snail_id: candidate.snail_id,
        snail_name: candidate.name.clone(),
        species_tag: candidate.species_tag.clone(),
        thumbnail_url: candidate
            .thumbnail_url
            .clone()
            .unwrap_or_else(|| candidate.image_url.clone()),
        confidence: similarity.confidence.min(100),
        reasoning: similarity.rationale,
    }
}

// ============================================================================
// Mock scorers for testing
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::ai::CapabilityError;

    /// Scripted behaviour for one candidate image URL
    #[derive(Clone)]
    pub enum Script {
        Score(u8),
        Fail,
        Hang,
    }

    /// Scorer answering from a per-URL script
    pub struct ScriptedScorer {
        pub script: HashMap<String, Script>,
        pub calls: AtomicUsize,
    }

    impl ScriptedScorer {
        pub fn new(entries: &[(&str, Script)]) -> Self {
            Self {
                script: entries
                    .iter()
                    .map(|(url, s)| (url.to_string(), s.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SimilarityScorer for ScriptedScorer {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn score(
            &self,
            _query: &MatchQuery,
            candidate: &CandidateRow,
        ) -> Result<Similarity, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.get(&candidate.image_url) {
                Some(Script::Score(c)) => Ok(Similarity {
                    confidence: *c,
                    rationale: Some(format!("scored {}", c)),
                }),
                Some(Script::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Similarity {
                        confidence: 100,
                        rationale: None,
                    })
                }
                Some(Script::Fail) | None => Err(ScoringError::Capability(
                    CapabilityError::Network("connection reset".to_string()),
                )),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
