use std::sync::Arc;
use std::time::Duration;

use crate::core::filters::build_candidate_filter;
use crate::core::matcher::{Matcher, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::core::scoring::ScoringEngine;
use crate::core::state_machine::MatchStateMachine;
use crate::error::KindredError;
use crate::models::{
    ActionKind, ActionResult, CandidatePage, CandidateQuery, CompatibilityResult, MatchPair, Profile, ProfilePatch,
};
use crate::services::deadline::StoreDeadline;
use crate::services::match_store::MatchStore;
use crate::services::profile_store::ProfileStore;

/// Tunables for the engine
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub storage_timeout: Duration,
    pub lock_timeout: Duration,
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            storage_timeout: Duration::from_secs(2),
            lock_timeout: Duration::from_secs(2),
            default_limit: DEFAULT_PAGE_LIMIT,
            max_limit: MAX_PAGE_LIMIT,
        }
    }
}

/// Entry point for everything the HTTP layer needs: candidates, scores,
/// actions and matches
pub struct MatchEngine {
    profiles: Arc<dyn ProfileStore>,
    machine: MatchStateMachine,
    matcher: Matcher,
    deadline: StoreDeadline,
}

impl MatchEngine {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        matches: Arc<dyn MatchStore>,
        scoring: ScoringEngine,
        options: EngineOptions,
    ) -> Self {
        let deadline = StoreDeadline::new(options.storage_timeout);
        Self {
            machine: MatchStateMachine::new(
                Arc::clone(&profiles),
                matches,
                scoring,
                deadline,
                options.lock_timeout,
            ),
            matcher: Matcher::new(scoring, options.default_limit, options.max_limit),
            profiles,
            deadline,
        }
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    pub fn state_machine(&self) -> &MatchStateMachine {
        &self.machine
    }

    /// Deadline applied to every store call, shared with the HTTP layer for
    /// stores the engine does not own
    pub fn deadline(&self) -> StoreDeadline {
        self.deadline
    }

    pub async fn get_profile(&self, id: &str) -> Result<Profile, KindredError> {
        self.deadline
            .run_with_retry("load profile", || self.profiles.get_profile(id))
            .await
    }

    /// Not retried: a create that timed out may still have landed, and a
    /// second attempt would report a conflict for the caller's own profile
    pub async fn create_profile(&self, profile: Profile) -> Result<Profile, KindredError> {
        self.deadline
            .run("insert profile", self.profiles.insert_profile(profile))
            .await
    }

    pub async fn update_profile(&self, id: &str, patch: ProfilePatch) -> Result<Profile, KindredError> {
        self.deadline
            .run_with_retry("update profile", || self.profiles.update_profile(id, patch.clone()))
            .await
    }

    pub async fn delete_profile(&self, id: &str) -> Result<(), KindredError> {
        self.deadline
            .run_with_retry("delete profile", || self.profiles.delete_profile(id))
            .await
    }

    pub async fn record_action(
        &self,
        actor_id: &str,
        target_id: &str,
        kind: ActionKind,
    ) -> Result<ActionResult, KindredError> {
        self.machine.record_action(actor_id, target_id, kind).await
    }

    pub async fn block(&self, actor_id: &str, target_id: &str) -> Result<ActionResult, KindredError> {
        self.machine.block(actor_id, target_id).await
    }

    /// Compatibility between two stored profiles
    pub async fn score(&self, id_a: &str, id_b: &str) -> Result<CompatibilityResult, KindredError> {
        let a = self.get_profile(id_a).await?;
        let b = self.get_profile(id_b).await?;

        Ok(self.matcher.scoring().score(&a, &b))
    }

    /// Ranked, paged candidates for `requester_id`
    pub async fn candidates(&self, requester_id: &str, query: &CandidateQuery) -> Result<CandidatePage, KindredError> {
        let requester = self
            .deadline
            .run_with_retry("load requester", || self.profiles.get_profile(requester_id))
            .await?;

        let excluded = self.machine.excluded_targets(requester_id).await?;
        tracing::debug!("Excluding {} profiles for {}", excluded.len(), requester_id);

        let filter = build_candidate_filter(&requester, query, excluded)?;
        let pool = self
            .deadline
            .run_with_retry("list candidates", || self.profiles.list_candidates(&filter))
            .await?;

        let page = self.matcher.rank(&requester, pool, query.page, query.limit);

        tracing::info!(
            "Returning {} candidates for {} (from {} eligible)",
            page.candidates.len(),
            requester_id,
            page.total
        );

        Ok(page)
    }

    /// Whether the match store answers within the storage deadline
    pub async fn is_healthy(&self) -> bool {
        match self.machine.health_check().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Match store health check failed: {}", e);
                false
            }
        }
    }

    pub async fn matches_for(&self, profile_id: &str) -> Result<Vec<MatchPair>, KindredError> {
        // Surface unknown profiles as 404 rather than an empty list
        self.get_profile(profile_id).await?;
        self.machine.matches_for(profile_id).await
    }
}
