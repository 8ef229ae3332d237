//! Kindred - compatibility scoring and match engine for a dating app
//!
//! Scores pairs of profiles by weighted interest overlap, ranks candidates
//! for a requester, and turns mutual likes into matches. Pair state changes
//! are serialized per pair and committed atomically.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{EngineOptions, MatchEngine, MatchStateMachine, Matcher, ScoringEngine};
pub use error::KindredError;
pub use models::{
    ActionKind, ActionResult, CandidatePage, CandidateQuery, CategoryWeights, CompatibilityResult, Interest,
    InterestCategory, MatchPair, PairKey, PairStatus, Profile,
};
