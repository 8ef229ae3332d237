use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::core::locks::PairLocks;
use crate::core::scoring::ScoringEngine;
use crate::error::KindredError;
use crate::models::{ActionKind, ActionResult, LikeAction, MatchPair, PairKey, PairStatus, Profile};
use crate::services::deadline::StoreDeadline;
use crate::services::match_store::{MatchStore, PairSnapshot, PairWrite};
use crate::services::profile_store::ProfileStore;

/// Tracks like/dislike/superlike actions and forms matches on mutual interest
///
/// Per ordered pair the latest action wins. Per unordered pair the status
/// moves `pending -> matched`, and `blocked` is reachable from anywhere and
/// terminal. The decision for a pair is made inside the store's atomic
/// `apply`, so it always sees the latest reverse action even when several
/// instances share one store. The in-process pair lock only keeps local
/// writers from contending on the store.
pub struct MatchStateMachine {
    profiles: Arc<dyn ProfileStore>,
    store: Arc<dyn MatchStore>,
    scoring: ScoringEngine,
    locks: PairLocks,
    deadline: StoreDeadline,
}

impl MatchStateMachine {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        store: Arc<dyn MatchStore>,
        scoring: ScoringEngine,
        deadline: StoreDeadline,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            profiles,
            store,
            scoring,
            locks: PairLocks::new(lock_timeout),
            deadline,
        }
    }

    /// Record an action from `actor_id` towards `target_id`
    pub async fn record_action(
        &self,
        actor_id: &str,
        target_id: &str,
        kind: ActionKind,
    ) -> Result<ActionResult, KindredError> {
        let key = validate_pair(actor_id, target_id)?;
        let (actor, target) = self.load_profiles(actor_id, target_id).await?;

        let _guard = self.locks.acquire(&key).await?;

        let action = LikeAction {
            actor_id: actor_id.to_string(),
            target_id: target_id.to_string(),
            kind,
            created_at: Utc::now(),
        };
        let scoring = &self.scoring;
        let decide = |snapshot: &PairSnapshot| decide_action(scoring, &key, &action, &actor, &target, snapshot);

        let applied = self
            .deadline
            .run_with_retry("apply action", || self.store.apply(&key, actor_id, target_id, &decide))
            .await?;

        let matched = applied
            .write
            .pair
            .as_ref()
            .map_or(false, |p| p.status == PairStatus::Matched);
        let resulting = applied.write.pair.or(applied.previous);

        let result = ActionResult {
            matched,
            pair_status: resulting.as_ref().map_or(PairStatus::Pending, |p| p.status),
            compatibility: resulting.as_ref().and_then(MatchPair::compatibility),
        };

        if matched {
            tracing::info!(
                "Match formed: {} (score {:.2})",
                key,
                result.compatibility.as_ref().map_or(0.0, |c| c.score)
            );
        } else {
            tracing::debug!(
                "Recorded {} -> {} ({}), pair {}",
                actor_id,
                target_id,
                kind.as_str(),
                result.pair_status.as_str()
            );
        }

        Ok(result)
    }

    /// Block the pair. Terminal: no later action can change it.
    pub async fn block(&self, actor_id: &str, target_id: &str) -> Result<ActionResult, KindredError> {
        let key = validate_pair(actor_id, target_id)?;
        self.load_profiles(actor_id, target_id).await?;

        let _guard = self.locks.acquire(&key).await?;

        let now = Utc::now();
        let decide = |snapshot: &PairSnapshot| match &snapshot.pair {
            Some(pair) if pair.status == PairStatus::Blocked => {
                Err(KindredError::Conflict(format!("pair {} is already blocked", key)))
            }
            current => Ok(PairWrite {
                key: key.clone(),
                action: None,
                pair: Some(
                    current
                        .clone()
                        .unwrap_or_else(|| MatchPair::pending(key.clone(), now))
                        .into_blocked(actor_id, now),
                ),
            }),
        };

        self.deadline
            .run_with_retry("apply block", || self.store.apply(&key, actor_id, target_id, &decide))
            .await?;

        tracing::info!("Pair {} blocked by {}", key, actor_id);

        Ok(ActionResult {
            matched: false,
            pair_status: PairStatus::Blocked,
            compatibility: None,
        })
    }

    /// Current pair record, if any
    pub async fn pair(&self, a: &str, b: &str) -> Result<Option<MatchPair>, KindredError> {
        self.load_pair(&PairKey::new(a, b)).await
    }

    /// Matched pairs involving `profile_id`, most recent match first
    pub async fn matches_for(&self, profile_id: &str) -> Result<Vec<MatchPair>, KindredError> {
        let mut pairs: Vec<MatchPair> = self
            .deadline
            .run_with_retry("load pairs", || self.store.pairs_for(profile_id))
            .await?
            .into_iter()
            .filter(|p| p.status == PairStatus::Matched)
            .collect();

        pairs.sort_by(|a, b| b.matched_at.cmp(&a.matched_at).then_with(|| a.key.cmp(&b.key)));
        Ok(pairs)
    }

    /// Profiles `profile_id` should no longer be offered: everyone it acted
    /// on and everyone it shares a blocked pair with
    pub async fn excluded_targets(&self, profile_id: &str) -> Result<HashSet<String>, KindredError> {
        let mut excluded: HashSet<String> = self
            .deadline
            .run_with_retry("load acted targets", || self.store.acted_targets(profile_id))
            .await?
            .into_iter()
            .collect();

        let pairs = self
            .deadline
            .run_with_retry("load pairs", || self.store.pairs_for(profile_id))
            .await?;
        excluded.extend(
            pairs
                .iter()
                .filter(|p| p.status == PairStatus::Blocked)
                .filter_map(|p| p.key.other(profile_id).map(str::to_string)),
        );

        Ok(excluded)
    }

    pub async fn health_check(&self) -> Result<(), KindredError> {
        self.deadline.run("health check", self.store.health_check()).await
    }

    async fn load_pair(&self, key: &PairKey) -> Result<Option<MatchPair>, KindredError> {
        self.deadline
            .run_with_retry("load pair", || self.store.pair(key))
            .await
    }

    async fn load_profiles(&self, actor_id: &str, target_id: &str) -> Result<(Profile, Profile), KindredError> {
        let actor = self
            .deadline
            .run_with_retry("load actor profile", || self.profiles.get_profile(actor_id))
            .await?;
        let target = self
            .deadline
            .run_with_retry("load target profile", || self.profiles.get_profile(target_id))
            .await?;
        Ok((actor, target))
    }
}

/// Next write for a like, superlike or dislike given the pair as stored
///
/// A positive action creates the pending pair, or forms the match when the
/// reverse action is positive too. Compatibility is computed only then.
/// A matched pair is never rewritten and a dislike never touches the pair.
fn decide_action(
    scoring: &ScoringEngine,
    key: &PairKey,
    action: &LikeAction,
    actor: &Profile,
    target: &Profile,
    snapshot: &PairSnapshot,
) -> Result<PairWrite, KindredError> {
    let existing = snapshot.pair.as_ref();
    if existing.map_or(false, |p| p.status == PairStatus::Blocked) {
        return Err(KindredError::Conflict(format!("pair {} is blocked", key)));
    }

    let pair = if action.kind.is_positive() {
        let mutual = snapshot.reverse.as_ref().map_or(false, |r| r.kind.is_positive());
        let now = action.created_at;

        match existing {
            Some(pair) if pair.status == PairStatus::Matched => None,
            Some(pair) if mutual => Some(pair.clone().into_matched(scoring.score(actor, target), now)),
            Some(_) => None,
            None if mutual => Some(MatchPair::pending(key.clone(), now).into_matched(scoring.score(actor, target), now)),
            None => Some(MatchPair::pending(key.clone(), now)),
        }
    } else {
        None
    };

    Ok(PairWrite {
        key: key.clone(),
        action: Some(action.clone()),
        pair,
    })
}

fn validate_pair(actor_id: &str, target_id: &str) -> Result<PairKey, KindredError> {
    if actor_id.trim().is_empty() || target_id.trim().is_empty() {
        return Err(KindredError::invalid_action("actorId and targetId are required"));
    }
    if actor_id == target_id {
        return Err(KindredError::invalid_action("a profile cannot act on itself"));
    }
    Ok(PairKey::new(actor_id, target_id))
}
