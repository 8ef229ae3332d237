// Criterion benchmarks for Kindred

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kindred::core::distance::{calculate_bounding_box, haversine_distance};
use kindred::core::filters::{build_candidate_filter, matches_filter};
use kindred::core::{Matcher, ScoringEngine};
use kindred::models::{CandidateQuery, Coordinates, Gender, Interest, InterestCategory, Location, Profile};
use std::collections::HashSet;

const VALUES: [&str; 8] = ["jazz", "rock", "tennis", "climbing", "noir", "anime", "chess", "cooking"];

fn create_profile(id: usize, lat: f64, lon: f64) -> Profile {
    let mut profile = Profile::new(
        format!("user-{}", id),
        21 + (id % 20) as u8,
        if id % 2 == 0 { Gender::Female } else { Gender::Male },
    );
    profile.location = Location::at(lat, lon);
    profile.is_verified = id % 3 == 0;
    profile.interests = InterestCategory::ALL
        .iter()
        .enumerate()
        .map(|(i, category)| {
            let value = VALUES[(id + i * 3) % VALUES.len()];
            Interest::new(*category, value, 0.3 + ((id + i) % 7) as f64 / 10.0)
        })
        .collect();
    profile
}

fn create_pool(count: usize) -> Vec<Profile> {
    (0..count)
        .map(|i| {
            let lat_offset = (i as f64 * 0.001) % 0.5;
            let lon_offset = (i as f64 * 0.001) % 0.5;
            create_profile(i + 1, 52.52 + lat_offset, 13.405 + lon_offset)
        })
        .collect()
}

fn bench_haversine_distance(c: &mut Criterion) {
    let from = Coordinates::new(52.52, 13.405);
    let to = Coordinates::new(52.53, 13.39);

    c.bench_function("haversine_distance", |b| {
        b.iter(|| haversine_distance(black_box(&from), black_box(&to)));
    });
}

fn bench_bounding_box(c: &mut Criterion) {
    let center = Coordinates::new(52.52, 13.405);

    c.bench_function("bounding_box_calculation", |b| {
        b.iter(|| calculate_bounding_box(black_box(&center), black_box(50.0)));
    });
}

fn bench_scoring(c: &mut Criterion) {
    let engine = ScoringEngine::default();
    let a = create_profile(1, 52.52, 13.405);
    let b = create_profile(2, 52.53, 13.39);

    c.bench_function("score_pair", |bench| {
        bench.iter(|| engine.score(black_box(&a), black_box(&b)));
    });
}

fn bench_ranking(c: &mut Criterion) {
    let matcher = Matcher::default();
    let requester = create_profile(0, 52.52, 13.405);

    let mut group = c.benchmark_group("ranking");

    for candidate_count in [10, 50, 100, 500, 1000].iter() {
        let pool = create_pool(*candidate_count);

        group.bench_with_input(BenchmarkId::new("rank", candidate_count), candidate_count, |b, _| {
            b.iter(|| matcher.rank(black_box(&requester), black_box(pool.clone()), Some(1), Some(20)));
        });
    }

    group.finish();
}

fn bench_filtering_pipeline(c: &mut Criterion) {
    let requester = create_profile(0, 52.52, 13.405);
    let pool = create_pool(100);
    let query = CandidateQuery {
        age_min: Some(21),
        age_max: Some(35),
        max_distance_km: Some(25.0),
        gender_pref: Some(vec![Gender::Female]),
        ..CandidateQuery::default()
    };

    c.bench_function("filtering_pipeline_100_candidates", |b| {
        b.iter(|| {
            let filter = build_candidate_filter(&requester, &query, HashSet::new()).unwrap();
            let filtered: Vec<_> = pool.iter().filter(|p| matches_filter(p, &filter)).collect();
            black_box(filtered)
        });
    });
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_bounding_box,
    bench_scoring,
    bench_ranking,
    bench_filtering_pipeline
);

criterion_main!(benches);
