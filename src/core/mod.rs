// Core algorithm exports
pub mod distance;
pub mod engine;
pub mod filters;
pub mod locks;
pub mod matcher;
pub mod scoring;
pub mod state_machine;

pub use distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box};
pub use engine::{EngineOptions, MatchEngine};
pub use filters::{build_candidate_filter, matches_filter};
pub use locks::{PairGuard, PairLocks};
pub use matcher::Matcher;
pub use scoring::ScoringEngine;
pub use state_machine::MatchStateMachine;
