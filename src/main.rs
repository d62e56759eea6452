use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use practice_engine::classifier::AnswerEvent;
use practice_engine::clock::{ManualClock, DAY_MS};
use practice_engine::collaborators::ProblemGenerator;
use practice_engine::logging::{init_tracing, LogSettings};
use practice_engine::profile::peek_ability;
use practice_engine::types::{
    Magnitude, ProblemDifficulty, ProblemMetadata, ProgressionMode, ResolvedConstraints,
};
use practice_engine::{
    AdaptiveEngine, EngineConfig, LearnerProfile, Problem, SelectionConstraints, SkillId,
};

const SECOND_MS: i64 = 1000;
// 2026-01-05, a Monday, 08:00 UTC
const SIM_EPOCH_MS: i64 = 1_767_600_000_000;

struct SimConfig {
    seed: u64,
    turns: u32,
    turns_per_day: u32,
    accuracy: f64,
    true_level: f64,
    start_difficulty: f64,
    mode: ProgressionMode,
    log_level: String,
}

impl SimConfig {
    fn from_env() -> Self {
        Self {
            seed: env_or("SIM_SEED", 42),
            turns: env_or("SIM_TURNS", 300),
            turns_per_day: env_or::<u32>("SIM_TURNS_PER_DAY", 40).max(1),
            accuracy: env_or("SIM_ACCURACY", 0.85_f64).clamp(0.0, 1.0),
            true_level: env_or("SIM_TRUE_LEVEL", 6.0),
            start_difficulty: env_or("SIM_START_DIFFICULTY", 2.0),
            mode: std::env::var("SIM_MODE")
                .map(|v| ProgressionMode::parse_or(&v, ProgressionMode::Challenge))
                .unwrap_or_default(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Plain arithmetic items whose operand size grows with the level.
struct ArithmeticGenerator {
    rng: RefCell<ChaCha8Rng>,
    counter: RefCell<u64>,
}

impl ArithmeticGenerator {
    fn new(seed: u64) -> Self {
        Self {
            rng: RefCell::new(ChaCha8Rng::seed_from_u64(seed)),
            counter: RefCell::new(0),
        }
    }
}

impl ProblemGenerator for ArithmeticGenerator {
    fn generate(&self, skill: SkillId, level: i32, constraints: &ResolvedConstraints) -> Problem {
        let mut rng = self.rng.borrow_mut();
        let digits = (1 + (level - 1) / 3).clamp(1, 4) as u32;
        let upper = 10_i64.pow(digits);
        let (template, a, b, result) = match skill {
            SkillId::Subtraction => {
                let a = rng.gen_range(1..upper);
                let b = rng.gen_range(0..=a);
                ("sub_basic", a, b, a - b)
            }
            SkillId::Multiplication => {
                let a = if constraints.table_set.is_empty() {
                    rng.gen_range(2..=(level as i64 + 2).min(12))
                } else {
                    i64::from(constraints.table_set[rng.gen_range(0..constraints.table_set.len())])
                };
                let b = rng.gen_range(2..=10);
                ("mul_table", a, b, a * b)
            }
            SkillId::Division => {
                let b = rng.gen_range(2..=(level as i64 + 2).min(12));
                let quotient = rng.gen_range(1..=10);
                ("div_exact", quotient * b, b, quotient)
            }
            _ => {
                let a = rng.gen_range(1..upper);
                let b = rng.gen_range(1..upper);
                ("add_basic", a, b, a + b)
            }
        };

        let mut counter = self.counter.borrow_mut();
        *counter += 1;
        Problem {
            id: format!("sim-{}", *counter),
            template: template.to_string(),
            skill,
            values: BTreeMap::from([("a".to_string(), a as f64), ("b".to_string(), b as f64)]),
            result: result as f64,
            difficulty: ProblemDifficulty {
                conceptual_level: level,
                magnitude: Some(Magnitude {
                    a_digits: a.max(1).ilog10() + 1,
                    b_digits: b.max(1).ilog10() + 1,
                }),
            },
            metadata: ProblemMetadata {
                estimated_time: Some(6.0 + 2.0 * f64::from(level)),
                ..ProblemMetadata::default()
            },
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimSummary {
    seed: u64,
    turns: u32,
    correct: u32,
    progression_mode: ProgressionMode,
    current_difficulty: f64,
    highest_difficulty: f64,
    abilities: BTreeMap<SkillId, f64>,
    reasons: BTreeMap<String, u32>,
    levels: BTreeMap<i32, u32>,
    breaks_suggested: u32,
    advance_offers: u32,
    excluded_times: u32,
    mastered: BTreeMap<SkillId, Vec<i32>>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let sim = SimConfig::from_env();
    let _log_guard = init_tracing(&LogSettings::from_env(&sim.log_level));

    let clock = Arc::new(ManualClock::new(SIM_EPOCH_MS));
    let mut engine = AdaptiveEngine::new(
        EngineConfig::from_env(),
        Box::new(ArithmeticGenerator::new(sim.seed ^ 0x5eed)),
    )
    .with_seed(sim.seed)
    .with_clock(Box::new(Arc::clone(&clock)));
    let mut learner_rng = ChaCha8Rng::seed_from_u64(sim.seed.wrapping_add(1));

    let mut profile = LearnerProfile::with_difficulty(sim.start_difficulty);
    engine.prepare_profile(&mut profile);
    let constraints = SelectionConstraints::for_mode(sim.mode);

    let mut summary = SimSummary {
        seed: sim.seed,
        turns: sim.turns,
        progression_mode: sim.mode,
        ..SimSummary::default()
    };
    let mut session_count: u32 = 0;
    let mut session_outcomes: Vec<bool> = Vec::new();

    tracing::info!(
        seed = sim.seed,
        turns = sim.turns,
        mode = sim.mode.as_str(),
        "simulation started"
    );

    for turn in 0..sim.turns {
        if turn > 0 && turn % sim.turns_per_day == 0 {
            clock.advance(DAY_MS);
            session_count = 0;
            session_outcomes.clear();
        }

        let problem = engine.next_problem(&mut profile, &constraints)?;
        if let Some(reason) = problem.metadata.selection_reason.as_ref() {
            *summary.reasons.entry(reason.to_string()).or_default() += 1;
        }
        *summary.levels.entry(problem.level()).or_default() += 1;

        let gap = f64::from(problem.level()) - sim.true_level;
        let p_correct = (sim.accuracy - 0.06 * gap).clamp(0.05, 0.98);
        let answer = if learner_rng.gen_bool(p_correct) {
            problem.result
        } else if learner_rng.gen_bool(0.7) {
            problem.result + f64::from(learner_rng.gen_range(1..=3_i32))
        } else {
            problem.result * 3.0 + 17.0
        };
        let elapsed = if learner_rng.gen_bool(0.02) {
            240.0
        } else {
            learner_rng.gen_range(3.0..25.0)
        };
        clock.advance((elapsed * 1000.0) as i64 + 2 * SECOND_MS);

        let outcome =
            engine.submit_answer(&mut profile, &problem, AnswerEvent::new(answer, elapsed));
        if outcome.classified.correct {
            summary.correct += 1;
        }
        if outcome.classified.excluded_from_speed {
            summary.excluded_times += 1;
        }
        if outcome.advance_offer.is_some() {
            summary.advance_offers += 1;
            if learner_rng.gen_bool(0.5) {
                engine.accept_advance(&mut profile);
            } else {
                engine.decline_advance(&mut profile);
            }
        }

        session_count += 1;
        session_outcomes.push(outcome.classified.correct);
        let advice = engine.break_advice(session_count, &session_outcomes, Some(&problem), false);
        if advice.suggest {
            summary.breaks_suggested += 1;
            clock.advance(i64::from(advice.recommended_break_minutes) * 60 * SECOND_MS);
            session_count = 0;
            session_outcomes.clear();
        }
    }

    summary.current_difficulty = profile.current_difficulty;
    summary.highest_difficulty = profile.highest_difficulty;
    summary.abilities = SkillId::ARITHMETIC
        .iter()
        .map(|skill| (*skill, peek_ability(&profile, *skill)))
        .collect();
    summary.mastered = engine.mastery_overview(&profile);

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
