use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::error::KindredError;

/// Errors that can occur with the Redis-backed code store
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}

impl From<CacheError> for KindredError {
    fn from(value: CacheError) -> Self {
        KindredError::Internal(value.to_string())
    }
}

/// A freshly issued verification code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub code: String,
    pub expires_in: Duration,
}

/// Short-lived verification codes keyed by subject (profile id, phone, email)
///
/// Every entry carries a time-to-live. Expired codes never verify, and a
/// code verifies at most once.
#[async_trait]
pub trait VerificationCodeStore: Send + Sync {
    /// Issue a new code for `subject`, replacing any outstanding one
    async fn issue(&self, subject: &str) -> Result<IssuedCode, KindredError>;

    /// Check and consume the code for `subject`
    async fn verify(&self, subject: &str, code: &str) -> Result<bool, KindredError>;

    /// Put a consumed code back for a fresh TTL, unless a newer code was
    /// issued in the meantime
    async fn reinstate(&self, subject: &str, code: &str) -> Result<(), KindredError>;

    fn ttl(&self) -> Duration;
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a verification code
    pub fn verification(subject: &str) -> String {
        format!("verify:{}", subject)
    }
}

/// Six random digits
fn generate_code() -> String {
    format!("{:06}", Uuid::new_v4().as_u128() % 1_000_000)
}

/// In-process store; moka evicts entries once their TTL passes
pub struct MemoryCodeStore {
    codes: moka::future::Cache<String, String>,
    ttl: Duration,
}

impl MemoryCodeStore {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let codes = moka::future::CacheBuilder::new(capacity)
            .time_to_live(ttl)
            .build();

        Self { codes, ttl }
    }
}

#[async_trait]
impl VerificationCodeStore for MemoryCodeStore {
    async fn issue(&self, subject: &str) -> Result<IssuedCode, KindredError> {
        let code = generate_code();
        self.codes.insert(CacheKey::verification(subject), code.clone()).await;
        tracing::debug!("Issued verification code for {}", subject);

        Ok(IssuedCode {
            code,
            expires_in: self.ttl,
        })
    }

    async fn verify(&self, subject: &str, code: &str) -> Result<bool, KindredError> {
        let key = CacheKey::verification(subject);
        match self.codes.get(&key).await {
            Some(stored) if stored == code => {
                // Only the caller that actually removes the entry wins
                Ok(self.codes.remove(&key).await.as_deref() == Some(code))
            }
            _ => Ok(false),
        }
    }

    async fn reinstate(&self, subject: &str, code: &str) -> Result<(), KindredError> {
        self.codes
            .entry(CacheKey::verification(subject))
            .or_insert(code.to_string())
            .await;
        Ok(())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Redis-backed store shared across instances
pub struct RedisCodeStore {
    redis: ConnectionManager,
    ttl: Duration,
}

impl RedisCodeStore {
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis, ttl })
    }
}

#[async_trait]
impl VerificationCodeStore for RedisCodeStore {
    async fn issue(&self, subject: &str) -> Result<IssuedCode, KindredError> {
        let code = generate_code();
        let mut conn = self.redis.clone();

        let _: () = redis::cmd("SET")
            .arg(CacheKey::verification(subject))
            .arg(&code)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(CacheError::from)?;

        tracing::debug!("Issued verification code for {}", subject);
        Ok(IssuedCode {
            code,
            expires_in: self.ttl,
        })
    }

    async fn verify(&self, subject: &str, code: &str) -> Result<bool, KindredError> {
        let key = CacheKey::verification(subject);
        let mut conn = self.redis.clone();

        let stored: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(CacheError::from)?;

        if stored.as_deref() != Some(code) {
            return Ok(false);
        }

        let removed: i64 = redis::cmd("DEL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(CacheError::from)?;

        Ok(removed == 1)
    }

    async fn reinstate(&self, subject: &str, code: &str) -> Result<(), KindredError> {
        let mut conn = self.redis.clone();

        // NX: a code issued since the failed attempt stays authoritative
        let _: Option<String> = redis::cmd("SET")
            .arg(CacheKey::verification(subject))
            .arg(code)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::from)?;

        Ok(())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_code_verifies_once() {
        let store = MemoryCodeStore::new(100, Duration::from_secs(60));
        let issued = store.issue("p1").await.unwrap();

        assert_eq!(issued.code.len(), 6);
        assert!(!store.verify("p1", "not-it").await.unwrap());
        assert!(store.verify("p1", &issued.code).await.unwrap());
        assert!(!store.verify("p1", &issued.code).await.unwrap());
    }

    #[tokio::test]
    async fn test_reissue_replaces_code() {
        let store = MemoryCodeStore::new(100, Duration::from_secs(60));
        let first = store.issue("p1").await.unwrap();
        let second = store.issue("p1").await.unwrap();

        if first.code != second.code {
            assert!(!store.verify("p1", &first.code).await.unwrap());
        }
        assert!(store.verify("p1", &second.code).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let store = MemoryCodeStore::new(100, Duration::from_millis(100));
        let issued = store.issue("p1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(!store.verify("p1", &issued.code).await.unwrap());
    }

    #[tokio::test]
    async fn test_reinstated_code_verifies_again() {
        let store = MemoryCodeStore::new(100, Duration::from_secs(60));
        let issued = store.issue("p1").await.unwrap();
        assert!(store.verify("p1", &issued.code).await.unwrap());

        store.reinstate("p1", &issued.code).await.unwrap();
        assert!(store.verify("p1", &issued.code).await.unwrap());
        assert!(!store.verify("p1", &issued.code).await.unwrap());
    }

    #[tokio::test]
    async fn test_reinstate_keeps_newer_code() {
        let store = MemoryCodeStore::new(100, Duration::from_secs(60));
        let old = store.issue("p1").await.unwrap();
        assert!(store.verify("p1", &old.code).await.unwrap());

        let newer = store.issue("p1").await.unwrap();
        store.reinstate("p1", &old.code).await.unwrap();

        assert!(store.verify("p1", &newer.code).await.unwrap());
    }

    #[tokio::test]
    async fn test_codes_are_per_subject() {
        let store = MemoryCodeStore::new(100, Duration::from_secs(60));
        let issued = store.issue("p1").await.unwrap();
        assert!(!store.verify("p2", &issued.code).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_redis_code_roundtrip() {
        let store = RedisCodeStore::connect("redis://127.0.0.1:6379", Duration::from_secs(30))
            .await
            .expect("Failed to connect to Redis");

        let issued = store.issue("redis-subject").await.unwrap();
        assert!(store.verify("redis-subject", &issued.code).await.unwrap());
        assert!(!store.verify("redis-subject", &issued.code).await.unwrap());
    }

    #[test]
    fn test_cache_key_builder() {
        assert_eq!(CacheKey::verification("user123"), "verify:user123");
    }
}
