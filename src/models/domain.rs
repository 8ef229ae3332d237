use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::KindredError;

pub const MIN_AGE: u8 = 18;
pub const MAX_AGE: u8 = 120;

/// Interest categories, declared in scoring priority order
/// (music > sport > film > hobby).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestCategory {
    Music,
    Sport,
    Film,
    Hobby,
}

impl InterestCategory {
    pub const ALL: [InterestCategory; 4] = [
        InterestCategory::Music,
        InterestCategory::Sport,
        InterestCategory::Film,
        InterestCategory::Hobby,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InterestCategory::Music => "music",
            InterestCategory::Sport => "sport",
            InterestCategory::Film => "film",
            InterestCategory::Hobby => "hobby",
        }
    }
}

impl fmt::Display for InterestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A weighted (category, value) pair describing a profile's taste
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    pub category: InterestCategory,
    pub value: String,
    pub weight: f64,
}

impl Interest {
    pub fn new(category: InterestCategory, value: impl Into<String>, weight: f64) -> Self {
        Self {
            category,
            value: value.into(),
            weight,
        }
    }

    /// Values compare case-insensitively with surrounding whitespace ignored
    pub fn normalized_value(&self) -> String {
        self.value.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    Other,
}

impl FromStr for Gender {
    type Err = KindredError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "non_binary" | "nonbinary" | "non-binary" => Ok(Gender::NonBinary),
            "other" => Ok(Gender::Other),
            other => Err(KindredError::Validation(format!("unknown gender: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Where a profile lives: coordinates, a postal code, or both
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl Location {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            coordinates: Some(Coordinates::new(latitude, longitude)),
            postal_code: None,
        }
    }
}

/// A user's dating identity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    pub age: u8,
    #[serde(default)]
    pub location: Location,
    pub gender: Gender,
    /// Genders this profile wants to see. Empty means any.
    #[serde(default)]
    pub seeking: Vec<Gender>,
    #[serde(default)]
    pub interests: Vec<Interest>,
    #[serde(default)]
    pub photo_ids: Vec<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn new(id: impl Into<String>, age: u8, gender: Gender) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            display_name: String::new(),
            age,
            location: Location::default(),
            gender,
            seeking: Vec::new(),
            interests: Vec::new(),
            photo_ids: Vec::new(),
            is_verified: false,
            is_premium: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn has_photo(&self) -> bool {
        !self.photo_ids.is_empty()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.location.coordinates
    }

    /// Check the invariants every stored profile must hold
    pub fn validate(&self) -> Result<(), KindredError> {
        if self.id.trim().is_empty() {
            return Err(KindredError::Validation("profile id must not be empty".into()));
        }
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(KindredError::Validation(format!(
                "age must be between {} and {}, got {}",
                MIN_AGE, MAX_AGE, self.age
            )));
        }
        if let Some(coordinates) = self.location.coordinates {
            if !coordinates.is_valid() {
                return Err(KindredError::Validation(format!(
                    "coordinates out of range: ({}, {})",
                    coordinates.latitude, coordinates.longitude
                )));
            }
        }
        for interest in &self.interests {
            if interest.value.trim().is_empty() {
                return Err(KindredError::Validation(format!(
                    "{} interest value must not be empty",
                    interest.category
                )));
            }
            if !(0.0..=1.0).contains(&interest.weight) {
                return Err(KindredError::Validation(format!(
                    "interest weight for {}:{} must be within [0, 1], got {}",
                    interest.category, interest.value, interest.weight
                )));
            }
        }
        Ok(())
    }
}

/// Partial update to a profile. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub age: Option<u8>,
    pub location: Option<Location>,
    pub gender: Option<Gender>,
    pub seeking: Option<Vec<Gender>>,
    pub interests: Option<Vec<Interest>>,
    pub photo_ids: Option<Vec<String>>,
    pub is_verified: Option<bool>,
    pub is_premium: Option<bool>,
}

impl ProfilePatch {
    pub fn verified() -> Self {
        Self {
            is_verified: Some(true),
            ..Self::default()
        }
    }

    /// Apply the patch to a copy of `profile` and validate the result
    pub fn apply_to(self, profile: &Profile) -> Result<Profile, KindredError> {
        let mut updated = profile.clone();
        if let Some(display_name) = self.display_name {
            updated.display_name = display_name;
        }
        if let Some(age) = self.age {
            updated.age = age;
        }
        if let Some(location) = self.location {
            updated.location = location;
        }
        if let Some(gender) = self.gender {
            updated.gender = gender;
        }
        if let Some(seeking) = self.seeking {
            updated.seeking = seeking;
        }
        if let Some(interests) = self.interests {
            updated.interests = interests;
        }
        if let Some(photo_ids) = self.photo_ids {
            updated.photo_ids = photo_ids;
        }
        if let Some(is_verified) = self.is_verified {
            updated.is_verified = is_verified;
        }
        if let Some(is_premium) = self.is_premium {
            updated.is_premium = is_premium;
        }
        updated.validate()?;
        updated.updated_at = Utc::now();
        Ok(updated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Like,
    Superlike,
    Dislike,
}

impl ActionKind {
    /// Like and superlike count towards a match; dislike does not
    pub fn is_positive(self) -> bool {
        matches!(self, ActionKind::Like | ActionKind::Superlike)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Like => "like",
            ActionKind::Superlike => "superlike",
            ActionKind::Dislike => "dislike",
        }
    }
}

impl FromStr for ActionKind {
    type Err = KindredError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "like" => Ok(ActionKind::Like),
            "superlike" => Ok(ActionKind::Superlike),
            "dislike" => Ok(ActionKind::Dislike),
            other => Err(KindredError::Validation(format!("unknown action kind: {}", other))),
        }
    }
}

/// A directed expression of interest. Only the latest action per
/// (actor, target) is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeAction {
    pub actor_id: String,
    pub target_id: String,
    pub kind: ActionKind,
    pub created_at: DateTime<Utc>,
}

/// Canonical key of an unordered profile pair, `low < high`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    #[serde(rename = "profileA")]
    pub low: String,
    #[serde(rename = "profileB")]
    pub high: String,
}

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self { low: a.to_string(), high: b.to_string() }
        } else {
            Self { low: b.to_string(), high: a.to_string() }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.low == id || self.high == id
    }

    /// The member of the pair that is not `id`
    pub fn other(&self, id: &str) -> Option<&str> {
        if self.low == id {
            Some(&self.high)
        } else if self.high == id {
            Some(&self.low)
        } else {
            None
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    Pending,
    Matched,
    Blocked,
}

impl PairStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PairStatus::Pending => "pending",
            PairStatus::Matched => "matched",
            PairStatus::Blocked => "blocked",
        }
    }
}

/// Per-category overlap ratios in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub music: f64,
    pub sport: f64,
    pub film: f64,
    pub hobby: f64,
}

impl CategoryScores {
    pub fn get(&self, category: InterestCategory) -> f64 {
        match category {
            InterestCategory::Music => self.music,
            InterestCategory::Sport => self.sport,
            InterestCategory::Film => self.film,
            InterestCategory::Hobby => self.hobby,
        }
    }

    pub fn set(&mut self, category: InterestCategory, value: f64) {
        match category {
            InterestCategory::Music => self.music = value,
            InterestCategory::Sport => self.sport = value,
            InterestCategory::Film => self.film = value,
            InterestCategory::Hobby => self.hobby = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedInterest {
    pub category: InterestCategory,
    pub value: String,
    pub combined_weight: f64,
}

/// Scored output of comparing two profiles
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    /// Total score in [0, 100], two-decimal precision
    pub score: f64,
    pub category_scores: CategoryScores,
    pub shared_interests: Vec<SharedInterest>,
}

impl CompatibilityResult {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Mutual relationship state between two profiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPair {
    pub id: Uuid,
    #[serde(flatten)]
    pub key: PairKey,
    pub status: PairStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub matched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub blocked_by: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub category_scores: Option<CategoryScores>,
    #[serde(default)]
    pub shared_interests: Vec<SharedInterest>,
}

impl MatchPair {
    pub fn pending(key: PairKey, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            status: PairStatus::Pending,
            created_at: now,
            updated_at: now,
            matched_at: None,
            blocked_by: None,
            match_score: None,
            category_scores: None,
            shared_interests: Vec::new(),
        }
    }

    pub fn into_matched(mut self, compatibility: CompatibilityResult, now: DateTime<Utc>) -> Self {
        self.status = PairStatus::Matched;
        self.matched_at = Some(now);
        self.updated_at = now;
        self.match_score = Some(compatibility.score);
        self.category_scores = Some(compatibility.category_scores);
        self.shared_interests = compatibility.shared_interests;
        self
    }

    pub fn into_blocked(mut self, blocked_by: &str, now: DateTime<Utc>) -> Self {
        self.status = PairStatus::Blocked;
        self.blocked_by = Some(blocked_by.to_string());
        self.updated_at = now;
        self
    }

    /// The compatibility recorded when the pair matched
    pub fn compatibility(&self) -> Option<CompatibilityResult> {
        let score = self.match_score?;
        Some(CompatibilityResult {
            score,
            category_scores: self.category_scores.unwrap_or_default(),
            shared_interests: self.shared_interests.clone(),
        })
    }
}

/// Outcome of recording an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    /// True only when this action formed the match
    pub matched: bool,
    pub pair_status: PairStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<CompatibilityResult>,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Constraints a candidate must satisfy to enter the pool
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub requester_id: String,
    pub min_age: u8,
    pub max_age: u8,
    pub origin: Option<Coordinates>,
    pub max_distance_km: Option<f64>,
    /// Empty means any gender
    pub genders: Vec<Gender>,
    pub require_verified: bool,
    pub require_photo: bool,
    pub exclude_ids: HashSet<String>,
}

/// Caller-facing candidate search parameters
#[derive(Debug, Clone, Default)]
pub struct CandidateQuery {
    pub age_min: Option<u8>,
    pub age_max: Option<u8>,
    pub max_distance_km: Option<f64>,
    /// Falls back to the requester's `seeking` list when absent
    pub gender_pref: Option<Vec<Gender>>,
    pub verified_only: bool,
    pub with_photo: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub profile: Profile,
    pub preview_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePage {
    pub candidates: Vec<ScoredCandidate>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
}

/// Category weights used to combine per-category overlap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryWeights {
    pub music: f64,
    pub sport: f64,
    pub film: f64,
    pub hobby: f64,
}

impl CategoryWeights {
    pub fn weight(&self, category: InterestCategory) -> f64 {
        match category {
            InterestCategory::Music => self.music,
            InterestCategory::Sport => self.sport,
            InterestCategory::Film => self.film,
            InterestCategory::Hobby => self.hobby,
        }
    }

    /// Weights must be non-negative and sum to 1.0
    pub fn validate(&self) -> Result<(), String> {
        let weights = [self.music, self.sport, self.film, self.hobby];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!("category weights must be non-negative: {:?}", self));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(format!("category weights must sum to 1.0, got {}", sum));
        }
        Ok(())
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            music: 0.30,
            sport: 0.25,
            film: 0.25,
            hobby: 0.20,
        }
    }
}
