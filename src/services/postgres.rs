use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;

use crate::error::KindredError;
use crate::models::{ActionKind, CategoryScores, LikeAction, MatchPair, PairKey, PairStatus, SharedInterest};
use crate::services::match_store::{check_transition, AppliedWrite, MatchStore, PairSnapshot, PairWrite};

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}

impl From<PostgresError> for KindredError {
    fn from(value: PostgresError) -> Self {
        match value {
            PostgresError::SqlxError(sqlx::Error::PoolTimedOut) => {
                KindredError::StorageTimeout("database pool exhausted".to_string())
            }
            PostgresError::SqlxError(sqlx::Error::RowNotFound) => {
                KindredError::NotFound("row not found".to_string())
            }
            other => KindredError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for KindredError {
    fn from(value: sqlx::Error) -> Self {
        PostgresError::from(value).into()
    }
}

/// Column type for like actions
#[derive(Debug, Clone, Copy, sqlx::Type)]
#[sqlx(type_name = "like_kind", rename_all = "lowercase")]
pub enum LikeKindColumn {
    Like,
    Superlike,
    Dislike,
}

impl From<ActionKind> for LikeKindColumn {
    fn from(value: ActionKind) -> Self {
        match value {
            ActionKind::Like => LikeKindColumn::Like,
            ActionKind::Superlike => LikeKindColumn::Superlike,
            ActionKind::Dislike => LikeKindColumn::Dislike,
        }
    }
}

impl From<LikeKindColumn> for ActionKind {
    fn from(value: LikeKindColumn) -> Self {
        match value {
            LikeKindColumn::Like => ActionKind::Like,
            LikeKindColumn::Superlike => ActionKind::Superlike,
            LikeKindColumn::Dislike => ActionKind::Dislike,
        }
    }
}

/// Column type for pair status
#[derive(Debug, Clone, Copy, sqlx::Type)]
#[sqlx(type_name = "pair_status", rename_all = "lowercase")]
pub enum PairStatusColumn {
    Pending,
    Matched,
    Blocked,
}

impl From<PairStatus> for PairStatusColumn {
    fn from(value: PairStatus) -> Self {
        match value {
            PairStatus::Pending => PairStatusColumn::Pending,
            PairStatus::Matched => PairStatusColumn::Matched,
            PairStatus::Blocked => PairStatusColumn::Blocked,
        }
    }
}

impl From<PairStatusColumn> for PairStatus {
    fn from(value: PairStatusColumn) -> Self {
        match value {
            PairStatusColumn::Pending => PairStatus::Pending,
            PairStatusColumn::Matched => PairStatus::Matched,
            PairStatusColumn::Blocked => PairStatus::Blocked,
        }
    }
}

const PAIR_COLUMNS: &str = r#"
    id, profile_low, profile_high, status, created_at, updated_at,
    matched_at, blocked_by, match_score, category_scores, shared_interests
"#;

/// PostgreSQL match store
///
/// Actions and pairs live in `like_actions` and `match_pairs`. The canonical
/// pair key is the primary key of `match_pairs`, so a pair can never be
/// duplicated. Each `apply` runs in one transaction that first takes a
/// transaction-scoped advisory lock on the pair, then reads the pair and the
/// reverse action, decides, and writes. Reads, decision and writes are
/// therefore serialized per pair across service instances as well as within
/// one.
pub struct PostgresMatchStore {
    pool: PgPool,
}

impl PostgresMatchStore {
    /// Connect and run migrations
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

fn pair_from_row(row: &PgRow) -> Result<MatchPair, sqlx::Error> {
    let status: PairStatusColumn = row.try_get("status")?;
    let category_scores: Option<Json<CategoryScores>> = row.try_get("category_scores")?;
    let shared_interests: Json<Vec<SharedInterest>> = row.try_get("shared_interests")?;

    Ok(MatchPair {
        id: row.try_get("id")?,
        key: PairKey {
            low: row.try_get("profile_low")?,
            high: row.try_get("profile_high")?,
        },
        status: status.into(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        matched_at: row.try_get("matched_at")?,
        blocked_by: row.try_get("blocked_by")?,
        match_score: row.try_get("match_score")?,
        category_scores: category_scores.map(|json| json.0),
        shared_interests: shared_interests.0,
    })
}

fn action_from_row(row: &PgRow) -> Result<LikeAction, sqlx::Error> {
    let kind: LikeKindColumn = row.try_get("kind")?;
    Ok(LikeAction {
        actor_id: row.try_get("actor_id")?,
        target_id: row.try_get("target_id")?,
        kind: kind.into(),
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl MatchStore for PostgresMatchStore {
    async fn action(&self, actor_id: &str, target_id: &str) -> Result<Option<LikeAction>, KindredError> {
        let query = r#"
            SELECT actor_id, target_id, kind, created_at
            FROM like_actions
            WHERE actor_id = $1 AND target_id = $2
        "#;

        let row = sqlx::query(query)
            .bind(actor_id)
            .bind(target_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(action_from_row).transpose()?)
    }

    async fn pair(&self, key: &PairKey) -> Result<Option<MatchPair>, KindredError> {
        let query = format!(
            "SELECT {} FROM match_pairs WHERE profile_low = $1 AND profile_high = $2",
            PAIR_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(&key.low)
            .bind(&key.high)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(pair_from_row).transpose()?)
    }

    async fn apply(
        &self,
        key: &PairKey,
        actor_id: &str,
        target_id: &str,
        decide: &(dyn for<'s> Fn(&'s PairSnapshot) -> Result<PairWrite, KindredError> + Send + Sync),
    ) -> Result<AppliedWrite, KindredError> {
        // Dropping the transaction before commit rolls it back
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key.to_string())
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "SELECT {} FROM match_pairs WHERE profile_low = $1 AND profile_high = $2 FOR UPDATE",
            PAIR_COLUMNS
        );
        let current = sqlx::query(&query)
            .bind(&key.low)
            .bind(&key.high)
            .fetch_optional(&mut *tx)
            .await?
            .as_ref()
            .map(pair_from_row)
            .transpose()?;

        let reverse = sqlx::query(
            "SELECT actor_id, target_id, kind, created_at FROM like_actions WHERE actor_id = $1 AND target_id = $2",
        )
        .bind(target_id)
        .bind(actor_id)
        .fetch_optional(&mut *tx)
        .await?
        .as_ref()
        .map(action_from_row)
        .transpose()?;

        let snapshot = PairSnapshot { pair: current, reverse };
        let write = decide(&snapshot)?;
        check_transition(key, snapshot.pair.as_ref(), &write)?;

        if let Some(action) = &write.action {
            sqlx::query(
                r#"
                INSERT INTO like_actions (actor_id, target_id, kind, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (actor_id, target_id)
                DO UPDATE SET
                    kind = EXCLUDED.kind,
                    created_at = EXCLUDED.created_at
                "#,
            )
            .bind(&action.actor_id)
            .bind(&action.target_id)
            .bind(LikeKindColumn::from(action.kind))
            .bind(action.created_at)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(pair) = &write.pair {
            // The WHERE clause keeps blocked rows blocked and matched rows matched
            sqlx::query(
                r#"
                INSERT INTO match_pairs (
                    id, profile_low, profile_high, status, created_at, updated_at,
                    matched_at, blocked_by, match_score, category_scores, shared_interests
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (profile_low, profile_high)
                DO UPDATE SET
                    status = EXCLUDED.status,
                    updated_at = EXCLUDED.updated_at,
                    matched_at = EXCLUDED.matched_at,
                    blocked_by = EXCLUDED.blocked_by,
                    match_score = EXCLUDED.match_score,
                    category_scores = EXCLUDED.category_scores,
                    shared_interests = EXCLUDED.shared_interests
                WHERE match_pairs.status <> 'blocked'
                    AND NOT (match_pairs.status = 'matched' AND EXCLUDED.status = 'pending')
                "#,
            )
            .bind(pair.id)
            .bind(&pair.key.low)
            .bind(&pair.key.high)
            .bind(PairStatusColumn::from(pair.status))
            .bind(pair.created_at)
            .bind(pair.updated_at)
            .bind(pair.matched_at)
            .bind(&pair.blocked_by)
            .bind(pair.match_score)
            .bind(pair.category_scores.map(Json))
            .bind(Json(&pair.shared_interests))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!("Applied pair write for {}", key);
        Ok(AppliedWrite {
            previous: snapshot.pair,
            write,
        })
    }

    async fn acted_targets(&self, actor_id: &str) -> Result<Vec<String>, KindredError> {
        let targets: Vec<String> = sqlx::query_scalar("SELECT target_id FROM like_actions WHERE actor_id = $1")
            .bind(actor_id)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!("Profile {} has acted on {} profiles", actor_id, targets.len());
        Ok(targets)
    }

    async fn pairs_for(&self, profile_id: &str) -> Result<Vec<MatchPair>, KindredError> {
        let query = format!(
            "SELECT {} FROM match_pairs WHERE profile_low = $1 OR profile_high = $1",
            PAIR_COLUMNS
        );

        let rows = sqlx::query(&query).bind(profile_id).fetch_all(&self.pool).await?;

        rows.iter()
            .map(pair_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn health_check(&self) -> Result<(), KindredError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
