//! Benchmarks for health scoring
//!
//! Run with: cargo bench --package scoring
//!
//! Scores a report built from a few hundred synthetic analysis texts, the
//! upper end of what the social sources return.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scoring::{RecommendationEngine, ScoreCalculator, ScoringContext};
use sources::FeatureMetrics;

fn sample_texts(n: usize) -> Vec<String> {
    let phrases = [
        "users love the new checkout, great work",
        "a concern about the price page being slow",
        "would like an export button",
        "crash on login since the last release, a real problem",
        "nothing special to report",
    ];
    (0..n)
        .map(|i| format!("comment {}: {}", i, phrases[i % phrases.len()]))
        .collect()
}

fn sample_metrics() -> FeatureMetrics {
    FeatureMetrics {
        feature_id: "checkout_v2".to_string(),
        purchase_count: 640,
        login_count: 3200,
        avg_session_minutes: 11.5,
        dataset_description: None,
    }
}

fn bench_health_score(c: &mut Criterion) {
    let calculator = ScoreCalculator::default();
    let metrics = sample_metrics();
    let texts = sample_texts(300);

    c.bench_function("health_score_300_texts", |b| {
        b.iter(|| calculator.health_score(black_box(Some(&metrics)), black_box(texts.as_slice())))
    });
}

fn bench_recommendations(c: &mut Criterion) {
    let calculator = ScoreCalculator::default();
    let engine = RecommendationEngine::standard();
    let metrics = sample_metrics();
    let texts = sample_texts(300);
    let summary = texts.join("\n");
    let score = calculator.health_score(Some(&metrics), &texts);

    c.bench_function("recommendations_300_texts", |b| {
        b.iter(|| {
            let context = ScoringContext::new(score, &metrics, black_box(texts.as_slice()));
            black_box(engine.generate(&context, &summary, &metrics.summary()))
        })
    });
}

criterion_group!(benches, bench_health_score, bench_recommendations);
criterion_main!(benches);
