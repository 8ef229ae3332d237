// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    ActionKind, ActionResult, BoundingBox, CandidateFilter, CandidatePage, CandidateQuery, CategoryScores,
    CategoryWeights, CompatibilityResult, Coordinates, Gender, Interest, InterestCategory, LikeAction, Location,
    MatchPair, PairKey, PairStatus, Profile, ProfilePatch, ScoredCandidate, SharedInterest,
};
pub use requests::{
    CandidatesParams, CreateProfileRequest, MatchesParams, RecordActionRequest, RequestedAction, ScoreParams,
    SendCodeRequest, VerifyCodeRequest,
};
pub use responses::{ErrorResponse, HealthResponse, MatchesResponse, VerificationResponse, VerificationSentResponse};
