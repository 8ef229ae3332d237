use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::KindredError;
use crate::models::{LikeAction, MatchPair, PairKey, PairStatus};

/// Writes for one pair that must become visible together or not at all
#[derive(Debug, Clone)]
pub struct PairWrite {
    pub key: PairKey,
    pub action: Option<LikeAction>,
    pub pair: Option<MatchPair>,
}

/// State of one pair as read inside the store's atomic section
#[derive(Debug, Clone, Default)]
pub struct PairSnapshot {
    pub pair: Option<MatchPair>,
    /// Latest action from the target back towards the actor
    pub reverse: Option<LikeAction>,
}

/// A write that was applied, with the pair as it was before
#[derive(Debug, Clone)]
pub struct AppliedWrite {
    pub previous: Option<MatchPair>,
    pub write: PairWrite,
}

/// Persistence for like actions and match pairs
///
/// `apply` is the only mutation. It reads the pair and the reverse action,
/// hands them to `decide` and stores the returned write, all as one atomic
/// step that is serialized per pair across every process sharing the store.
/// `decide` may run more than once when a timed-out call is retried.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Latest action from `actor_id` towards `target_id`
    async fn action(&self, actor_id: &str, target_id: &str) -> Result<Option<LikeAction>, KindredError>;

    async fn pair(&self, key: &PairKey) -> Result<Option<MatchPair>, KindredError>;

    /// Read, decide and write one pair atomically. An error from `decide`
    /// leaves the store untouched.
    async fn apply(
        &self,
        key: &PairKey,
        actor_id: &str,
        target_id: &str,
        decide: &(dyn for<'s> Fn(&'s PairSnapshot) -> Result<PairWrite, KindredError> + Send + Sync),
    ) -> Result<AppliedWrite, KindredError>;

    /// Ids `actor_id` has acted on, whatever the action kind
    async fn acted_targets(&self, actor_id: &str) -> Result<Vec<String>, KindredError>;

    /// Every pair `profile_id` belongs to
    async fn pairs_for(&self, profile_id: &str) -> Result<Vec<MatchPair>, KindredError>;

    /// Backend reachability, reported by the health endpoint
    async fn health_check(&self) -> Result<(), KindredError> {
        Ok(())
    }
}

/// Transitions no store may perform: leaving `blocked`, falling back from
/// `matched` to `pending`, or writing a pair under another key
pub fn check_transition(key: &PairKey, current: Option<&MatchPair>, write: &PairWrite) -> Result<(), KindredError> {
    if write.key != *key || write.pair.as_ref().map_or(false, |p| p.key != *key) {
        return Err(KindredError::Internal(format!("write for pair {} carries another key", key)));
    }

    let next = write.pair.as_ref().map(|p| p.status);
    match current.map(|p| p.status) {
        Some(PairStatus::Blocked) if next != Some(PairStatus::Blocked) => {
            Err(KindredError::Conflict(format!("pair {} is blocked", key)))
        }
        Some(PairStatus::Matched) if next == Some(PairStatus::Pending) => Err(KindredError::Internal(format!(
            "pair {} cannot fall back from matched to pending",
            key
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Default)]
struct MatchTables {
    actions: HashMap<(String, String), LikeAction>,
    pairs: HashMap<PairKey, MatchPair>,
}

/// Process-local match store used in demo mode and tests
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    tables: RwLock<MatchTables>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pair_count(&self) -> usize {
        self.read().pairs.len()
    }

    pub fn action_count(&self) -> usize {
        self.read().actions.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MatchTables> {
        self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MatchTables> {
        self.tables.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn action(&self, actor_id: &str, target_id: &str) -> Result<Option<LikeAction>, KindredError> {
        Ok(self
            .read()
            .actions
            .get(&(actor_id.to_string(), target_id.to_string()))
            .cloned())
    }

    async fn pair(&self, key: &PairKey) -> Result<Option<MatchPair>, KindredError> {
        Ok(self.read().pairs.get(key).cloned())
    }

    async fn apply(
        &self,
        key: &PairKey,
        actor_id: &str,
        target_id: &str,
        decide: &(dyn for<'s> Fn(&'s PairSnapshot) -> Result<PairWrite, KindredError> + Send + Sync),
    ) -> Result<AppliedWrite, KindredError> {
        // Single critical section with no await points: all or nothing
        let mut tables = self.write();

        let snapshot = PairSnapshot {
            pair: tables.pairs.get(key).cloned(),
            reverse: tables
                .actions
                .get(&(target_id.to_string(), actor_id.to_string()))
                .cloned(),
        };

        let write = decide(&snapshot)?;
        check_transition(key, snapshot.pair.as_ref(), &write)?;

        if let Some(action) = &write.action {
            tables
                .actions
                .insert((action.actor_id.clone(), action.target_id.clone()), action.clone());
        }
        if let Some(pair) = &write.pair {
            tables.pairs.insert(key.clone(), pair.clone());
        }

        Ok(AppliedWrite {
            previous: snapshot.pair,
            write,
        })
    }

    async fn acted_targets(&self, actor_id: &str) -> Result<Vec<String>, KindredError> {
        Ok(self
            .read()
            .actions
            .keys()
            .filter(|(actor, _)| actor == actor_id)
            .map(|(_, target)| target.clone())
            .collect())
    }

    async fn pairs_for(&self, profile_id: &str) -> Result<Vec<MatchPair>, KindredError> {
        Ok(self
            .read()
            .pairs
            .values()
            .filter(|pair| pair.key.contains(profile_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionKind;
    use chrono::Utc;

    fn like(actor: &str, target: &str) -> LikeAction {
        LikeAction {
            actor_id: actor.to_string(),
            target_id: target.to_string(),
            kind: ActionKind::Like,
            created_at: Utc::now(),
        }
    }

    /// Apply a fixed write regardless of the snapshot
    async fn put(store: &InMemoryMatchStore, write: PairWrite) -> Result<AppliedWrite, KindredError> {
        let key = write.key.clone();
        let (actor, target) = match &write.action {
            Some(action) => (action.actor_id.clone(), action.target_id.clone()),
            None => (key.low.clone(), key.high.clone()),
        };
        store.apply(&key, &actor, &target, &|_| Ok(write.clone())).await
    }

    #[tokio::test]
    async fn test_latest_action_wins() {
        let store = InMemoryMatchStore::new();
        let key = PairKey::new("a", "b");

        put(&store, PairWrite { key: key.clone(), action: Some(like("a", "b")), pair: None })
            .await
            .unwrap();

        let mut dislike = like("a", "b");
        dislike.kind = ActionKind::Dislike;
        put(&store, PairWrite { key, action: Some(dislike), pair: None })
            .await
            .unwrap();

        let stored = store.action("a", "b").await.unwrap().unwrap();
        assert_eq!(stored.kind, ActionKind::Dislike);
        assert_eq!(store.action_count(), 1);
        assert!(store.action("b", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_carries_reverse_action_and_pair() {
        let store = InMemoryMatchStore::new();
        let key = PairKey::new("a", "b");
        put(
            &store,
            PairWrite {
                key: key.clone(),
                action: Some(like("a", "b")),
                pair: Some(MatchPair::pending(key.clone(), Utc::now())),
            },
        )
        .await
        .unwrap();

        let seen = std::sync::Mutex::new(None);
        let applied = store
            .apply(&key, "b", "a", &|snapshot| {
                *seen.lock().unwrap() = Some(snapshot.clone());
                Ok(PairWrite { key: key.clone(), action: Some(like("b", "a")), pair: None })
            })
            .await
            .unwrap();

        let snapshot = seen.into_inner().unwrap().unwrap();
        assert_eq!(snapshot.reverse.unwrap().actor_id, "a");
        assert_eq!(snapshot.pair.unwrap().status, PairStatus::Pending);
        assert_eq!(applied.previous.unwrap().status, PairStatus::Pending);
    }

    #[tokio::test]
    async fn test_rejected_decision_writes_nothing() {
        let store = InMemoryMatchStore::new();
        let key = PairKey::new("a", "b");

        let result = store
            .apply(&key, "a", "b", &|_| Err(KindredError::Conflict("no".to_string())))
            .await;

        assert!(matches!(result, Err(KindredError::Conflict(_))));
        assert_eq!(store.action_count(), 0);
        assert_eq!(store.pair_count(), 0);
    }

    #[tokio::test]
    async fn test_blocked_pair_rejects_writes() {
        let store = InMemoryMatchStore::new();
        let key = PairKey::new("a", "b");
        let blocked = MatchPair::pending(key.clone(), Utc::now()).into_blocked("a", Utc::now());

        put(&store, PairWrite { key: key.clone(), action: None, pair: Some(blocked) })
            .await
            .unwrap();

        let result = put(&store, PairWrite { key: key.clone(), action: Some(like("b", "a")), pair: None }).await;

        assert!(matches!(result, Err(KindredError::Conflict(_))));
        assert!(store.action("b", "a").await.unwrap().is_none());
        assert_eq!(store.pair(&key).await.unwrap().unwrap().status, PairStatus::Blocked);
    }

    #[test]
    fn test_matched_never_falls_back_to_pending() {
        let key = PairKey::new("a", "b");
        let pending = MatchPair::pending(key.clone(), Utc::now());
        let matched = MatchPair {
            status: PairStatus::Matched,
            ..pending.clone()
        };
        let write = PairWrite { key: key.clone(), action: None, pair: Some(pending) };

        assert!(check_transition(&key, None, &write).is_ok());
        assert!(matches!(
            check_transition(&key, Some(&matched), &write),
            Err(KindredError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_acted_targets_and_pairs_for() {
        let store = InMemoryMatchStore::new();
        for target in ["b", "c"] {
            let key = PairKey::new("a", target);
            put(
                &store,
                PairWrite {
                    key: key.clone(),
                    action: Some(like("a", target)),
                    pair: Some(MatchPair::pending(key, Utc::now())),
                },
            )
            .await
            .unwrap();
        }

        let mut targets = store.acted_targets("a").await.unwrap();
        targets.sort();
        assert_eq!(targets, vec!["b", "c"]);
        assert_eq!(store.pairs_for("c").await.unwrap().len(), 1);
        assert_eq!(store.pairs_for("a").await.unwrap().len(), 2);
    }
}
