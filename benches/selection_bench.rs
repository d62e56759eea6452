//! Benchmark suite for practice-engine
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

#[path = "../tests/common/mod.rs"]
mod common;

use common::{push_attempts, FixtureGenerator, WED_NOON};
use practice_engine::classifier::AnswerEvent;
use practice_engine::clock::ManualClock;
use practice_engine::{AdaptiveEngine, EngineConfig, LearnerProfile, SelectionConstraints, SkillId};

fn seasoned_profile() -> LearnerProfile {
    let mut profile = LearnerProfile::with_difficulty(7.0);
    let pattern: Vec<bool> = (0..200).map(|i| i % 7 != 0).collect();
    push_attempts(&mut profile, SkillId::Addition, 7, &pattern, WED_NOON);
    profile
}

fn engine() -> AdaptiveEngine {
    AdaptiveEngine::new(EngineConfig::default(), Box::new(FixtureGenerator))
        .with_seed(7)
        .with_clock(Box::new(ManualClock::new(WED_NOON)))
}

fn bench_next_problem(c: &mut Criterion) {
    let mut engine = engine();
    let mut profile = seasoned_profile();
    let constraints = SelectionConstraints::default();
    c.bench_function("AdaptiveEngine::next_problem", |b| {
        b.iter(|| engine.next_problem(black_box(&mut profile), &constraints))
    });
}

fn bench_answer_cycle(c: &mut Criterion) {
    let mut engine = engine();
    let mut profile = seasoned_profile();
    let constraints = SelectionConstraints::default();
    c.bench_function("AdaptiveEngine::answer_cycle", |b| {
        b.iter(|| {
            if let Ok(problem) = engine.next_problem(&mut profile, &constraints) {
                let answer = problem.result;
                engine.submit_answer(&mut profile, &problem, AnswerEvent::new(answer, 9.0));
            }
        })
    });
}

criterion_group!(benches, bench_next_problem, bench_answer_cycle);
criterion_main!(benches);
