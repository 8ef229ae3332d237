// Unit tests for Kindred

use kindred::core::{
    distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box},
    filters::{build_candidate_filter, matches_filter},
    ScoringEngine,
};
use kindred::models::{
    CandidateQuery, CategoryWeights, Coordinates, Gender, Interest, InterestCategory, Location, Profile,
};
use std::collections::HashSet;

fn create_test_profile(id: &str, interests: Vec<Interest>) -> Profile {
    let mut profile = Profile::new(id, 30, Gender::Female);
    profile.interests = interests;
    profile
}

fn music(value: &str, weight: f64) -> Interest {
    Interest::new(InterestCategory::Music, value, weight)
}

fn full_coverage(id: &str) -> Profile {
    create_test_profile(
        id,
        vec![
            music("jazz", 0.9),
            Interest::new(InterestCategory::Sport, "tennis", 0.5),
            Interest::new(InterestCategory::Film, "noir", 0.7),
            Interest::new(InterestCategory::Hobby, "chess", 0.2),
        ],
    )
}

#[test]
fn test_haversine_distance_zero() {
    let berlin = Coordinates::new(52.52, 13.405);
    assert!(haversine_distance(&berlin, &berlin) < 0.01);
}

#[test]
fn test_haversine_distance_berlin_to_potsdam() {
    // Roughly 27 km as the crow flies
    let distance = haversine_distance(&Coordinates::new(52.52, 13.405), &Coordinates::new(52.3906, 13.0645));
    assert!(distance > 20.0 && distance < 35.0, "got {}", distance);
}

#[test]
fn test_point_within_bbox() {
    let center = Coordinates::new(52.52, 13.405);
    let bbox = calculate_bounding_box(&center, 10.0);

    assert!(is_within_bounding_box(&center, &bbox));
    assert!(is_within_bounding_box(&Coordinates::new(52.55, 13.42), &bbox));
    assert!(!is_within_bounding_box(&Coordinates::new(48.13, 11.58), &bbox));
}

#[test]
fn test_worked_example_scores_22_5() {
    let a = create_test_profile("a", vec![music("pop", 0.8)]);
    let b = create_test_profile("b", vec![music("pop", 0.6), music("rock", 0.4)]);

    let result = ScoringEngine::default().score(&a, &b);

    assert_eq!(result.score, 22.5);
    assert!((result.category_scores.music - 0.75).abs() < 1e-9);
    assert_eq!(result.category_scores.sport, 0.0);
    assert_eq!(result.shared_interests.len(), 1);
    assert_eq!(result.shared_interests[0].value, "pop");
}

#[test]
fn test_score_is_symmetric() {
    let engine = ScoringEngine::default();
    let a = create_test_profile(
        "a",
        vec![
            music("jazz", 0.9),
            music("rock", 0.3),
            Interest::new(InterestCategory::Film, "anime", 0.6),
            Interest::new(InterestCategory::Hobby, "chess", 0.1),
        ],
    );
    let b = create_test_profile(
        "b",
        vec![
            music("Jazz ", 0.4),
            music("rock", 0.8),
            Interest::new(InterestCategory::Film, "anime", 0.2),
            Interest::new(InterestCategory::Sport, "tennis", 1.0),
        ],
    );

    let ab = engine.score(&a, &b);
    let ba = engine.score(&b, &a);

    assert_eq!(ab.score, ba.score);
    assert_eq!(ab.category_scores, ba.category_scores);
    assert_eq!(ab.shared_interests, ba.shared_interests);
}

#[test]
fn test_self_score_full_coverage_is_100() {
    let a = full_coverage("a");
    assert_eq!(ScoringEngine::default().score(&a, &a).score, 100.0);
}

#[test]
fn test_self_score_is_maximal() {
    let engine = ScoringEngine::default();
    let sparse = create_test_profile(
        "sparse",
        vec![music("jazz", 0.9), Interest::new(InterestCategory::Film, "noir", 0.4)],
    );
    let own = engine.score(&sparse, &sparse).score;

    // Music and film only: 0.30 + 0.25 of the total
    assert_eq!(own, 55.0);
    assert!(engine.score(&sparse, &full_coverage("other")).score <= own);
}

#[test]
fn test_no_interests_scores_zero() {
    let empty = create_test_profile("empty", vec![]);
    let result = ScoringEngine::default().score(&empty, &full_coverage("b"));

    assert_eq!(result.score, 0.0);
    assert!(result.shared_interests.is_empty());
}

#[test]
fn test_custom_weights() {
    let weights = CategoryWeights {
        music: 1.0,
        sport: 0.0,
        film: 0.0,
        hobby: 0.0,
    };
    assert!(weights.validate().is_ok());

    let a = create_test_profile("a", vec![music("jazz", 0.5)]);
    let b = create_test_profile("b", vec![music("jazz", 0.5)]);
    assert_eq!(ScoringEngine::new(weights).score(&a, &b).score, 100.0);
}

#[test]
fn test_shared_interests_order() {
    let a = full_coverage("a");
    let result = ScoringEngine::default().score(&a, &a);

    let values: Vec<_> = result.shared_interests.iter().map(|s| s.value.as_str()).collect();
    assert_eq!(values, vec!["jazz", "noir", "tennis", "chess"]);
}

#[test]
fn test_filter_respects_distance_and_gender() {
    let mut requester = Profile::new("me", 30, Gender::Male);
    requester.location = Location::at(52.52, 13.405);
    requester.seeking = vec![Gender::Female];

    let query = CandidateQuery {
        max_distance_km: Some(15.0),
        ..CandidateQuery::default()
    };
    let filter = build_candidate_filter(&requester, &query, HashSet::new()).unwrap();

    let mut near = Profile::new("near", 28, Gender::Female);
    near.location = Location::at(52.50, 13.42);
    let mut far = Profile::new("far", 28, Gender::Female);
    far.location = Location::at(52.3906, 13.0645);
    let mut wrong_gender = Profile::new("wrong", 28, Gender::Male);
    wrong_gender.location = Location::at(52.50, 13.42);
    let nowhere = Profile::new("nowhere", 28, Gender::Female);

    assert!(matches_filter(&near, &filter));
    assert!(!matches_filter(&far, &filter));
    assert!(!matches_filter(&wrong_gender, &filter));
    assert!(!matches_filter(&nowhere, &filter));
    assert!(!matches_filter(&requester, &filter));
}

#[test]
fn test_filter_rejects_inverted_age_range() {
    let requester = Profile::new("me", 30, Gender::Male);
    let query = CandidateQuery {
        age_min: Some(40),
        age_max: Some(25),
        ..CandidateQuery::default()
    };
    assert!(build_candidate_filter(&requester, &query, HashSet::new()).is_err());
}

#[test]
fn test_filter_keeps_nearby_candidate_across_antimeridian() {
    let mut requester = Profile::new("me", 30, Gender::Male);
    requester.location = Location::at(0.0, 179.9);
    requester.seeking = vec![Gender::Female];

    let query = CandidateQuery {
        max_distance_km: Some(50.0),
        ..CandidateQuery::default()
    };
    let filter = build_candidate_filter(&requester, &query, HashSet::new()).unwrap();

    let mut neighbour = Profile::new("neighbour", 28, Gender::Female);
    neighbour.location = Location::at(0.0, -179.9);
    let mut distant = Profile::new("distant", 28, Gender::Female);
    distant.location = Location::at(0.0, -178.0);

    assert!(haversine_distance(&Coordinates::new(0.0, 179.9), &Coordinates::new(0.0, -179.9)) < 50.0);
    assert!(matches_filter(&neighbour, &filter));
    assert!(!matches_filter(&distant, &filter));
}

#[test]
fn test_filter_keeps_nearby_candidate_over_the_pole() {
    let mut requester = Profile::new("me", 30, Gender::Male);
    requester.location = Location::at(89.0, 0.0);
    requester.seeking = vec![Gender::Female];

    let query = CandidateQuery {
        max_distance_km: Some(200.0),
        ..CandidateQuery::default()
    };
    let filter = build_candidate_filter(&requester, &query, HashSet::new()).unwrap();

    let mut across_pole = Profile::new("across", 28, Gender::Female);
    across_pole.location = Location::at(89.5, 180.0);

    assert!(matches_filter(&across_pole, &filter));
}
