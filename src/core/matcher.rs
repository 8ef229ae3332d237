use crate::core::{distance::haversine_distance, scoring::ScoringEngine};
use crate::models::{CandidatePage, Profile, ScoredCandidate};

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Ranks an already-filtered candidate pool for one requester
///
/// # Pipeline Stages
/// 1. Score each candidate against the requester (preview score)
/// 2. Sort by preview score descending, ties by profile id ascending
/// 3. Cut the requested page
#[derive(Debug, Clone)]
pub struct Matcher {
    scoring: ScoringEngine,
    default_limit: u32,
    max_limit: u32,
}

impl Matcher {
    pub fn new(scoring: ScoringEngine, default_limit: u32, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            scoring,
            default_limit: default_limit.clamp(1, max_limit),
            max_limit,
        }
    }

    pub fn with_default_limits(scoring: ScoringEngine) -> Self {
        Self::new(scoring, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT)
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    /// Rank `candidates` for `requester` and return the requested page
    ///
    /// `page` is 1-based; `limit` is capped at the configured maximum.
    pub fn rank(
        &self,
        requester: &Profile,
        candidates: Vec<Profile>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> CandidatePage {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(self.default_limit).clamp(1, self.max_limit);
        let total = candidates.len();

        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|profile| {
                let preview_score = self.scoring.score(requester, &profile).score;
                let distance_km = match (requester.coordinates(), profile.coordinates()) {
                    (Some(from), Some(to)) => Some(haversine_distance(&from, &to)),
                    _ => None,
                };
                ScoredCandidate {
                    profile,
                    preview_score,
                    distance_km,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.preview_score
                .total_cmp(&a.preview_score)
                .then_with(|| a.profile.id.cmp(&b.profile.id))
        });

        let offset = (page as usize - 1).saturating_mul(limit as usize);
        let candidates: Vec<ScoredCandidate> = scored.into_iter().skip(offset).take(limit as usize).collect();

        tracing::debug!(
            "Ranked {} candidates for {} (page {}, limit {}, returned {})",
            total,
            requester.id,
            page,
            limit,
            candidates.len()
        );

        CandidatePage {
            candidates,
            page,
            limit,
            total,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_limits(ScoringEngine::default())
    }
}
