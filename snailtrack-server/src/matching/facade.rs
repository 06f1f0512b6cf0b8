//! Photo analysis merged with a matching run

use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use super::service::MatchService;
use super::{MatchError, MatchResult};
use crate::ai::ImageAnalyzer;

/// Age block of an analysis report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeReport {
    pub label: String,
    pub explanation: String,
    pub confidence: String,
}

/// Response body of `/api/ai/analyze`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub species: String,
    pub age: AgeReport,
    pub distinctive_features: Vec<String>,
    pub matches: Vec<MatchResult>,
}

/// Runs image analysis and pairwise matching for one photo
///
/// Both run concurrently. Analysis is required: its failure fails the call
/// and drops any comparator calls still in flight. Matching is best effort:
/// its failure is logged and reported as no matches.
pub struct AnalysisFacade {
    analyzer: Arc<dyn ImageAnalyzer>,
    matcher: Arc<MatchService>,
}

impl AnalysisFacade {
    pub fn new(analyzer: Arc<dyn ImageAnalyzer>, matcher: Arc<MatchService>) -> Self {
        Self { analyzer, matcher }
    }

    pub async fn analyze(&self, image_url: &str) -> Result<AnalysisReport, MatchError> {
        let image_url = image_url.trim();
        if image_url.is_empty() {
            return Err(MatchError::Validation("Image URL is required".to_string()));
        }

        let matching = async {
            let matches = self.matcher.match_pairwise(image_url).await.unwrap_or_else(|e| {
                warn!(error = %e, "Matching failed during analysis, returning no matches");
                Vec::new()
            });
            Ok::<_, MatchError>(matches)
        };
        let analysis = async {
            self.analyzer
                .analyze_image(image_url)
                .await
                .map_err(MatchError::from)
        };

        let (analysis, matches) = tokio::try_join!(analysis, matching)?;

        Ok(AnalysisReport {
            species: analysis.species,
            age: AgeReport {
                label: analysis.age,
                explanation: analysis.age_explanation,
                confidence: analysis.age_confidence,
            },
            distinctive_features: analysis.distinctive_features,
            matches,
        })
    }
}
