use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{CategoryScores, CategoryWeights, CompatibilityResult, Interest, InterestCategory, Profile, SharedInterest};

type CategoryValues = BTreeMap<String, f64>;

/// Compatibility scoring from weighted interest-category overlap
///
/// Scoring formula:
/// ```text
/// overlap_c = Σ min(w_a, w_b) / Σ max(w_a, w_b)   over values present on both sides of c
/// score     = Σ weight_c * overlap_c * 100        over music, sport, film, hobby
/// ```
///
/// A category missing on either side contributes 0. The total is never
/// renormalized over the categories that happen to be present, so sparse
/// profiles score low.
///
/// The engine is stateless; `score` is a pure function safe to call from any
/// number of tasks at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine {
    weights: CategoryWeights,
}

impl ScoringEngine {
    pub fn new(weights: CategoryWeights) -> Self {
        Self { weights }
    }

    /// Score two profiles. Never fails: profiles without interests score zero.
    pub fn score(&self, a: &Profile, b: &Profile) -> CompatibilityResult {
        if a.interests.is_empty() || b.interests.is_empty() {
            return CompatibilityResult::zero();
        }

        let left = group_by_category(&a.interests);
        let right = group_by_category(&b.interests);

        let mut category_scores = CategoryScores::default();
        let mut shared_interests = Vec::new();
        let mut total = 0.0;

        for category in InterestCategory::ALL {
            let (Some(l), Some(r)) = (left.get(&category), right.get(&category)) else {
                continue;
            };

            let overlap = category_overlap(category, l, r, &mut shared_interests);
            category_scores.set(category, overlap);
            total += self.weights.weight(category) * overlap;
        }

        shared_interests.sort_by(compare_shared);

        CompatibilityResult {
            score: round_to_cents(total * 100.0).clamp(0.0, 100.0),
            category_scores,
            shared_interests,
        }
    }
}

/// Weighted overlap of one category, pushing every matched value into `shared`
fn category_overlap(
    category: InterestCategory,
    left: &CategoryValues,
    right: &CategoryValues,
    shared: &mut Vec<SharedInterest>,
) -> f64 {
    let mut min_sum = 0.0;
    let mut max_sum = 0.0;

    // BTreeMap iteration keeps the summation order independent of argument order
    for (value, &weight_left) in left {
        let Some(&weight_right) = right.get(value) else {
            continue;
        };
        min_sum += weight_left.min(weight_right);
        max_sum += weight_left.max(weight_right);
        shared.push(SharedInterest {
            category,
            value: value.clone(),
            combined_weight: weight_left + weight_right,
        });
    }

    if max_sum > 0.0 {
        min_sum / max_sum
    } else {
        0.0
    }
}

/// Group interests by category, normalizing values and clamping weights.
/// Duplicate values keep the highest weight.
fn group_by_category(interests: &[Interest]) -> BTreeMap<InterestCategory, CategoryValues> {
    let mut grouped: BTreeMap<InterestCategory, CategoryValues> = BTreeMap::new();

    for interest in interests {
        let value = interest.normalized_value();
        if value.is_empty() {
            continue;
        }
        let weight = if interest.weight.is_nan() {
            0.0
        } else {
            interest.weight.clamp(0.0, 1.0)
        };

        let slot = grouped.entry(interest.category).or_default().entry(value).or_insert(weight);
        if weight > *slot {
            *slot = weight;
        }
    }

    grouped
}

/// Descending combined weight, then category priority, then value
fn compare_shared(a: &SharedInterest, b: &SharedInterest) -> Ordering {
    b.combined_weight
        .total_cmp(&a.combined_weight)
        .then_with(|| a.category.cmp(&b.category))
        .then_with(|| a.value.cmp(&b.value))
}

#[inline]
fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
