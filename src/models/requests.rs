use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::KindredError;
use crate::models::domain::{ActionKind, CandidateQuery, Gender, Interest, Location, Profile};

/// Request to record an action from one profile towards another
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordActionRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "actor_id")]
    pub actor_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "target_id")]
    pub target_id: String,
    /// like | superlike | dislike | block
    pub kind: String,
}

/// What the caller asked for: a like-style action or an explicit block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedAction {
    Act(ActionKind),
    Block,
}

impl RecordActionRequest {
    pub fn requested_action(&self) -> Result<RequestedAction, KindredError> {
        if self.kind.trim().eq_ignore_ascii_case("block") {
            return Ok(RequestedAction::Block);
        }
        self.kind.parse::<ActionKind>().map(RequestedAction::Act).map_err(|_| {
            KindredError::Validation(format!(
                "kind must be one of: like, superlike, dislike, block (got {:?})",
                self.kind
            ))
        })
    }
}

/// Query parameters for candidate search
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CandidatesParams {
    #[validate(length(min = 1))]
    pub requester_id: String,
    pub age_min: Option<u8>,
    pub age_max: Option<u8>,
    #[validate(range(min = 0.0))]
    pub max_distance: Option<f64>,
    /// Comma-separated list, e.g. `female,non_binary`
    pub gender_pref: Option<String>,
    #[serde(default)]
    pub verified_only: bool,
    #[serde(default)]
    pub with_photo: bool,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1))]
    pub limit: Option<u32>,
}

impl CandidatesParams {
    pub fn to_query(&self) -> Result<CandidateQuery, KindredError> {
        let gender_pref = match self.gender_pref.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(list) => Some(
                list.split(',')
                    .filter(|g| !g.trim().is_empty())
                    .map(str::parse::<Gender>)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };

        Ok(CandidateQuery {
            age_min: self.age_min,
            age_max: self.age_max,
            max_distance_km: self.max_distance,
            gender_pref,
            verified_only: self.verified_only,
            with_photo: self.with_photo,
            page: self.page,
            limit: self.limit,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScoreParams {
    #[validate(length(min = 1))]
    pub id_a: String,
    #[validate(length(min = 1))]
    pub id_b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchesParams {
    #[validate(length(min = 1))]
    pub profile_id: String,
}

/// Registration payload for a new profile
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[validate(range(min = 18, max = 120))]
    pub age: u8,
    #[serde(default)]
    pub location: Location,
    pub gender: Gender,
    #[serde(default)]
    pub seeking: Vec<Gender>,
    #[serde(default)]
    pub interests: Vec<Interest>,
    #[serde(default)]
    pub photo_ids: Vec<String>,
    #[serde(default)]
    pub is_premium: bool,
}

impl CreateProfileRequest {
    /// New profiles always start unverified
    pub fn into_profile(self) -> Profile {
        let mut profile = Profile::new(self.id, self.age, self.gender);
        profile.display_name = self.display_name;
        profile.location = self.location;
        profile.seeking = self.seeking;
        profile.interests = self.interests;
        profile.photo_ids = self.photo_ids;
        profile.is_premium = self.is_premium;
        profile
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeRequest {
    #[validate(length(min = 1))]
    pub subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    #[validate(length(min = 1))]
    pub subject: String,
    #[validate(length(equal = 6))]
    pub code: String,
}
