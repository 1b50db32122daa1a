//! Benchmark suite for danci-srs
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use danci_srs::{
    bounded_edit_distance, EngineConfig, ItemStats, Rating, RetentionPredictor, ReviewRequest,
    SchedulingEngine, StudyAction, FEATURE_DIMENSION,
};

fn bench_edit_distance(c: &mut Criterion) {
    c.bench_function("bounded_edit_distance/close", |b| {
        b.iter(|| bounded_edit_distance(black_box("recieve"), black_box("receive"), 2))
    });
    c.bench_function("bounded_edit_distance/early_exit", |b| {
        b.iter(|| {
            bounded_edit_distance(
                black_box("internationalization"),
                black_box("antidisestablishment"),
                2,
            )
        })
    });
}

fn bench_predictor_update(c: &mut Criterion) {
    let mut predictor = RetentionPredictor::default();
    let x = [0.5; FEATURE_DIMENSION];
    c.bench_function("RetentionPredictor::update_online", |b| {
        b.iter(|| predictor.update_online(black_box(&x), 1.0))
    });
}

fn bench_engine_review(c: &mut Criterion) {
    let mut config = EngineConfig::default();
    config.ml.enabled = true;
    let engine = match SchedulingEngine::new(config) {
        Ok(engine) => engine,
        Err(err) => panic!("default config rejected: {err}"),
    };
    c.bench_function("SchedulingEngine::review", |b| {
        b.iter(|| {
            engine.review(ReviewRequest {
                previous: None,
                action: StudyAction::Rating {
                    rating: Rating::Good,
                },
                stats: ItemStats {
                    response_time_ms: Some(2500),
                    ..Default::default()
                },
                now_ms: 1_700_000_000_000,
            })
        })
    });
}

criterion_group!(
    benches,
    bench_edit_distance,
    bench_predictor_update,
    bench_engine_review
);
criterion_main!(benches);
