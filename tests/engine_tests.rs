//! Answer cycle through the engine facade: collaborators, timing exclusion, mastery and
//! break advice.

mod common;

use common::{push_attempts, FixtureBank, FixtureGenerator, WED_NOON};
use practice_engine::breaks::BreakTrigger;
use practice_engine::classifier::{AnswerEvent, ErrorAnalysis, InterruptionSignal};
use practice_engine::clock::{start_of_week, ManualClock, DAY_MS};
use practice_engine::collaborators::ErrorAnalyzer;
use practice_engine::config::MasteryParams;
use practice_engine::mastery::{
    estimate_skill_level, lowest_unmastered_level, lowest_unmastered_level_since,
    weekly_level_status,
};
use practice_engine::types::{
    CuratedFilter, ErrorCategory, ExclusionReason, Problem, ProgressionMode, SelectionReason,
};
use practice_engine::{AdaptiveEngine, EngineConfig, LearnerProfile, SelectionConstraints, SkillId};

struct MisconceptionSpotter;

impl ErrorAnalyzer for MisconceptionSpotter {
    fn analyze_error(&self, problem: &Problem, student_answer: f64) -> Option<ErrorAnalysis> {
        (student_answer == problem.result * 10.0).then(|| ErrorAnalysis {
            category: "misconception".into(),
            patterns: vec!["place_value_shift".into()],
            detail: "answer is ten times too large".into(),
        })
    }
}

fn engine(seed: u64) -> AdaptiveEngine {
    AdaptiveEngine::new(EngineConfig::default(), Box::new(FixtureGenerator))
        .with_seed(seed)
        .with_clock(Box::new(ManualClock::new(WED_NOON)))
}

fn addition_only() -> SelectionConstraints {
    SelectionConstraints::only(SkillId::Addition, ProgressionMode::Challenge)
}

#[test]
fn analyzer_category_is_used_for_wrong_answers() {
    let mut engine = engine(1).with_analyzer(Box::new(MisconceptionSpotter));
    let mut profile = LearnerProfile::with_difficulty(4.0);

    let problem = engine.next_problem(&mut profile, &addition_only()).unwrap();
    let outcome = engine.submit_answer(
        &mut profile,
        &problem,
        AnswerEvent::new(problem.result * 10.0, 8.0),
    );
    assert!(!outcome.classified.correct);
    assert_eq!(outcome.classified.error_category, ErrorCategory::Misconception);

    let problem = engine.next_problem(&mut profile, &addition_only()).unwrap();
    let outcome =
        engine.submit_answer(&mut profile, &problem, AnswerEvent::new(problem.result + 1.0, 8.0));
    assert_eq!(outcome.classified.error_category, ErrorCategory::Knowledge);
    assert_eq!(
        profile.history.latest().map(|r| r.error_category),
        Some(ErrorCategory::Knowledge)
    );
}

#[test]
fn caller_supplied_analysis_is_kept() {
    let mut engine = engine(2).with_analyzer(Box::new(MisconceptionSpotter));
    let mut profile = LearnerProfile::with_difficulty(4.0);
    let problem = engine.next_problem(&mut profile, &addition_only()).unwrap();

    let event = AnswerEvent {
        error_analysis: Some(ErrorAnalysis {
            category: "inattention".into(),
            ..ErrorAnalysis::default()
        }),
        ..AnswerEvent::new(problem.result * 10.0, 8.0)
    };
    let outcome = engine.submit_answer(&mut profile, &problem, event);
    assert_eq!(outcome.classified.error_category, ErrorCategory::Inattention);
}

#[test]
fn interrupted_answers_do_not_feed_speed_statistics() {
    let mut engine = engine(3);
    let mut profile = LearnerProfile::with_difficulty(4.0);
    let problem = engine.next_problem(&mut profile, &addition_only()).unwrap();

    let event = AnswerEvent {
        interruption: Some(InterruptionSignal {
            hidden_duration_sec: 35.0,
            blur_count: 1,
        }),
        ..AnswerEvent::new(problem.result, 50.0)
    };
    let outcome = engine.submit_answer(&mut profile, &problem, event);
    assert!(outcome.classified.correct);
    assert!(outcome.classified.excluded_from_speed);
    assert_eq!(
        outcome.classified.exclusion_reason,
        Some(ExclusionReason::Interruption)
    );

    let record = profile.history.latest().unwrap();
    assert_eq!(record.raw_time_sec, 50.0);
    assert_eq!(record.speed_time_sec, None);
    let state = profile.item_skill_states.get(&record.skill_tag).unwrap();
    assert_eq!(state.attempts, 1);
    assert_eq!(state.avg_time, 0.0);
}

#[test]
fn curated_items_flow_through_the_facade() {
    let mut engine = engine(4).with_bank(Box::new(FixtureBank::new(&[("AS1", 3)])));
    let mut profile = LearnerProfile::with_difficulty(6.0);
    let constraints = SelectionConstraints {
        ncm_filter: Some(CuratedFilter {
            codes: vec!["AS1".into()],
            ability_tags: Vec::new(),
        }),
        ..SelectionConstraints::default()
    };

    let mut tags = Vec::new();
    for _ in 0..3 {
        let problem = engine.next_problem(&mut profile, &constraints).unwrap();
        assert_eq!(problem.metadata.selection_reason, Some(SelectionReason::NcmAssignment));
        assert_eq!(problem.level(), 6);
        engine.submit_answer(&mut profile, &problem, AnswerEvent::new(problem.result, 20.0));
        tags.push(problem.skill_tag().to_string());
    }
    tags.sort();
    assert_eq!(
        tags,
        vec!["ncm_as1_item_1", "ncm_as1_item_2", "ncm_as1_item_3"]
    );
    assert_eq!(profile.history.len(), 3);
}

#[test]
fn weekly_mastery_only_counts_this_week() {
    let engine = engine(5);
    let mut profile = LearnerProfile::with_difficulty(3.0);
    let last_week = WED_NOON - 7 * DAY_MS;
    push_attempts(&mut profile, SkillId::Addition, 1, &[true; 5], last_week - 60 * 60_000);
    push_attempts(&mut profile, SkillId::Addition, 2, &[true; 5], last_week);
    push_attempts(&mut profile, SkillId::Addition, 3, &[true; 5], WED_NOON);

    let all_time = engine.mastery_overview(&profile);
    assert_eq!(all_time.get(&SkillId::Addition), Some(&vec![1, 2, 3]));
    let weekly = engine.weekly_mastery_overview(&profile);
    assert_eq!(weekly.get(&SkillId::Addition), Some(&vec![3]));

    let params = MasteryParams::default();
    let status = weekly_level_status(&profile.history, SkillId::Addition, 2, WED_NOON, &params);
    assert_eq!(status.attempts, 0);
    assert!(!status.is_mastered);

    assert_eq!(lowest_unmastered_level(&profile.history, SkillId::Addition, &params), 4);
    let this_week = start_of_week(WED_NOON);
    assert_eq!(
        lowest_unmastered_level_since(&profile.history, SkillId::Addition, this_week, &params),
        1
    );
    assert!((estimate_skill_level(&profile, SkillId::Addition) - 2.0).abs() < 1e-9);
    assert_eq!(estimate_skill_level(&profile, SkillId::Division), 1.0);
}

#[test]
fn break_advice_follows_the_problem_on_screen() {
    let mut engine = engine(6);
    let mut profile = LearnerProfile::with_difficulty(2.0);
    let problem = engine.next_problem(&mut profile, &addition_only()).unwrap();

    // fixture items at low levels are single-digit additions
    let advice = engine.break_advice(15, &[true; 15], Some(&problem), false);
    assert!(!advice.suggest);
    let advice = engine.break_advice(20, &[true; 20], Some(&problem), false);
    assert!(advice.suggest);
    assert_eq!(advice.trigger, Some(BreakTrigger::SessionLength));
    assert_eq!(advice.recommended_break_minutes, 2);

    let burst = [true, false, false, true, false, false, true, false, true, true];
    let advice = engine.break_advice(10, &burst, None, false);
    assert_eq!(advice.trigger, Some(BreakTrigger::ErrorBurst));
    assert_eq!(advice.recommended_break_minutes, 1);

    let advice = engine.break_advice(40, &burst, None, true);
    assert!(!advice.suggest);
}

#[test]
fn declined_offer_leaves_ability_alone() {
    let mut engine = engine(7);
    let mut profile = LearnerProfile::with_difficulty(3.0);
    push_attempts(&mut profile, SkillId::Addition, 3, &[true; 8], WED_NOON);

    let constraints = SelectionConstraints {
        forced_level: Some(3),
        ..SelectionConstraints::only(SkillId::Addition, ProgressionMode::Steady)
    };
    let problem = engine.next_problem(&mut profile, &constraints).unwrap();
    let outcome =
        engine.submit_answer(&mut profile, &problem, AnswerEvent::new(problem.result, 20.0));
    assert!(outcome.advance_offer.is_some());

    let before = profile.current_difficulty;
    let record = engine.decline_advance(&mut profile).unwrap();
    assert_eq!(record.accepted, Some(false));
    assert_eq!(profile.current_difficulty, before);
    assert!(engine.decline_advance(&mut profile).is_none());

    // the same offer is not repeated inside the cooldown
    let problem = engine.next_problem(&mut profile, &constraints).unwrap();
    let outcome =
        engine.submit_answer(&mut profile, &problem, AnswerEvent::new(problem.result, 20.0));
    assert!(outcome.advance_offer.is_none());
}
