use std::collections::HashSet;

use crate::core::distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box};
use crate::error::KindredError;
use crate::models::domain::{MAX_AGE, MIN_AGE};
use crate::models::{CandidateFilter, CandidateQuery, Profile};

/// Check whether a profile may enter the candidate pool
///
/// Stages, cheapest first:
/// 1. Identity and lifecycle (self, excluded ids, soft-deleted)
/// 2. Demographics (age range, gender)
/// 3. Verification and photo requirements
/// 4. Geospatial bounding box, then exact haversine distance
#[inline]
pub fn matches_filter(profile: &Profile, filter: &CandidateFilter) -> bool {
    if profile.is_deleted()
        || profile.id == filter.requester_id
        || filter.exclude_ids.contains(&profile.id)
    {
        return false;
    }

    if profile.age < filter.min_age || profile.age > filter.max_age {
        return false;
    }

    if !filter.genders.is_empty() && !filter.genders.contains(&profile.gender) {
        return false;
    }

    if (filter.require_verified && !profile.is_verified) || (filter.require_photo && !profile.has_photo()) {
        return false;
    }

    within_distance(profile, filter)
}

/// A candidate without coordinates never passes a distance limit
fn within_distance(profile: &Profile, filter: &CandidateFilter) -> bool {
    let (Some(max_km), Some(origin)) = (filter.max_distance_km, filter.origin) else {
        return true;
    };
    let Some(position) = profile.coordinates() else {
        return false;
    };

    let bbox = calculate_bounding_box(&origin, max_km);
    if !is_within_bounding_box(&position, &bbox) {
        return false;
    }

    haversine_distance(&origin, &position) <= max_km
}

/// Build the store-level filter for a requester's candidate query
///
/// Gender preference defaults to the requester's own `seeking` list and the
/// distance origin is the requester's coordinates. A distance limit with no
/// requester coordinates is ignored.
pub fn build_candidate_filter(
    requester: &Profile,
    query: &CandidateQuery,
    exclude_ids: HashSet<String>,
) -> Result<CandidateFilter, KindredError> {
    let min_age = query.age_min.unwrap_or(MIN_AGE).max(MIN_AGE);
    let max_age = query.age_max.unwrap_or(MAX_AGE).min(MAX_AGE);
    if min_age > max_age {
        return Err(KindredError::Validation(format!(
            "ageMin ({}) must not exceed ageMax ({})",
            min_age, max_age
        )));
    }

    if let Some(distance) = query.max_distance_km {
        if !distance.is_finite() || distance < 0.0 {
            return Err(KindredError::Validation(format!(
                "maxDistance must be a non-negative number, got {}",
                distance
            )));
        }
    }

    let origin = requester.coordinates();
    if query.max_distance_km.is_some() && origin.is_none() {
        tracing::debug!(
            "Requester {} has no coordinates, ignoring distance limit",
            requester.id
        );
    }

    Ok(CandidateFilter {
        requester_id: requester.id.clone(),
        min_age,
        max_age,
        origin,
        max_distance_km: origin.and(query.max_distance_km),
        genders: query
            .gender_pref
            .clone()
            .unwrap_or_else(|| requester.seeking.clone()),
        require_verified: query.verified_only,
        require_photo: query.with_photo,
        exclude_ids,
    })
}
