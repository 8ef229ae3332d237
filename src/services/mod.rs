// Service exports
pub mod appwrite;
pub mod deadline;
pub mod match_store;
pub mod postgres;
pub mod profile_store;
pub mod verification;

pub use appwrite::{AppwriteError, AppwriteProfileStore};
pub use deadline::StoreDeadline;
pub use match_store::{AppliedWrite, InMemoryMatchStore, MatchStore, PairSnapshot, PairWrite};
pub use postgres::{PostgresError, PostgresMatchStore};
pub use profile_store::{InMemoryProfileStore, ProfileStore};
pub use verification::{CacheError, CacheKey, IssuedCode, MemoryCodeStore, RedisCodeStore, VerificationCodeStore};
