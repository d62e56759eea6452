//! Facade running the answer cycle against one learner profile at a time.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::advance::{self, AdvanceOffer, AdvanceOfferRecord};
use crate::breaks::{advise_break, BreakAdvice, BreakPolicy};
use crate::classifier::{classify_answer, AnswerEvent, ClassifiedAnswer};
use crate::clock::{Clock, SystemClock};
use crate::collaborators::{CuratedItemBank, EmptyBank, ErrorAnalyzer, NoAnalysis, ProblemGenerator};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::mastery::{mastery_overview, weekly_mastery_overview, OverviewOptions};
use crate::profile::{AttemptRecord, LearnerProfile};
use crate::selection::{select_next_problem, SelectionContext};
use crate::types::{Problem, ProgressionMode, SelectionConstraints, SelectionReason, SkillId};
use crate::updater::{
    adjust_difficulty, update_skill_state_after_answer, AdjustOptions, DifficultyAdjustment,
    SkillStateUpdate,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub classified: ClassifiedAnswer,
    pub adjustment: DifficultyAdjustment,
    pub skill_state: Option<SkillStateUpdate>,
    pub advance_offer: Option<AdvanceOffer>,
}

pub struct AdaptiveEngine {
    config: EngineConfig,
    rng: ChaCha8Rng,
    clock: Box<dyn Clock>,
    generator: Box<dyn ProblemGenerator>,
    bank: Box<dyn CuratedItemBank>,
    analyzer: Box<dyn ErrorAnalyzer>,
}

impl AdaptiveEngine {
    pub fn new(config: EngineConfig, generator: Box<dyn ProblemGenerator>) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::from_entropy(),
            clock: Box::new(SystemClock),
            generator,
            bank: Box::new(EmptyBank),
            analyzer: Box::new(NoAnalysis),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_bank(mut self, bank: Box<dyn CuratedItemBank>) -> Self {
        self.bank = bank;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Box<dyn ErrorAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Brings a freshly loaded profile up to date. Safe to call on every load.
    pub fn prepare_profile(&self, profile: &mut LearnerProfile) {
        profile.ensure_adaptive_state();
        profile.migrate_legacy_history();
    }

    pub fn next_problem(
        &mut self,
        profile: &mut LearnerProfile,
        constraints: &SelectionConstraints,
    ) -> Result<Problem> {
        let mut ctx = SelectionContext {
            config: &self.config,
            rng: &mut self.rng,
            now_ms: self.clock.now_ms(),
            generator: self.generator.as_ref(),
            bank: self.bank.as_ref(),
        };
        select_next_problem(profile, constraints, &mut ctx)
    }

    /// Classifies the answer, records the attempt and updates every estimate that depends
    /// on it. Steady-mode learners may receive an advance offer in the outcome.
    pub fn submit_answer(
        &mut self,
        profile: &mut LearnerProfile,
        problem: &Problem,
        mut event: AnswerEvent,
    ) -> AnswerOutcome {
        profile.ensure_adaptive_state();
        let now_ms = self.clock.now_ms();
        let mode = problem
            .metadata
            .progression_mode
            .unwrap_or(self.config.default_progression_mode);

        if event.error_analysis.is_none() {
            event.error_analysis = self.analyzer.analyze_error(problem, event.student_answer);
        }
        let classified = classify_answer(profile, problem, &event, &self.config.timing);

        profile.push_attempt(
            attempt_from(problem, &classified, mode, now_ms),
            &self.config.limits,
        );

        let adjustment = adjust_difficulty(
            profile,
            classified.correct,
            &AdjustOptions {
                error_category: classified.error_category,
                elapsed_sec: Some(classified.raw_time_sec),
                estimated_time_sec: problem.estimated_time(),
                progression_mode: mode,
            },
            &self.config,
        );
        let skill_state = update_skill_state_after_answer(profile, &self.config);

        let advance_offer = if mode == ProgressionMode::Steady {
            advance::offer_steady_advance(
                profile,
                adjustment.skill,
                mode,
                now_ms,
                &self.config.advance,
            )
        } else {
            None
        };

        AnswerOutcome {
            classified,
            adjustment,
            skill_state,
            advance_offer,
        }
    }

    pub fn break_advice(
        &self,
        session_attempt_count: u32,
        recent_correctness: &[bool],
        problem: Option<&Problem>,
        table_drill: bool,
    ) -> BreakAdvice {
        let policy = BreakPolicy::for_problem(problem, table_drill);
        advise_break(session_attempt_count, recent_correctness, &policy)
    }

    pub fn accept_advance(&self, profile: &mut LearnerProfile) -> Option<AdvanceOfferRecord> {
        advance::accept_advance(profile)
    }

    pub fn decline_advance(&self, profile: &mut LearnerProfile) -> Option<AdvanceOfferRecord> {
        advance::decline_advance(profile)
    }

    pub fn mastery_overview(&self, profile: &LearnerProfile) -> BTreeMap<SkillId, Vec<i32>> {
        mastery_overview(
            &profile.history,
            &OverviewOptions {
                params: self.config.mastery.clone(),
                since_ms: None,
            },
        )
    }

    pub fn weekly_mastery_overview(&self, profile: &LearnerProfile) -> BTreeMap<SkillId, Vec<i32>> {
        weekly_mastery_overview(&profile.history, self.clock.now_ms(), &self.config.mastery)
    }
}

fn attempt_from(
    problem: &Problem,
    classified: &ClassifiedAnswer,
    mode: ProgressionMode,
    now_ms: i64,
) -> AttemptRecord {
    let metadata = &problem.metadata;
    AttemptRecord {
        skill_tag: problem.skill_tag().to_string(),
        skill: Some(problem.skill),
        level: problem.level(),
        correct: classified.correct,
        error_category: classified.error_category,
        is_reasonable: classified.is_reasonable,
        raw_time_sec: classified.raw_time_sec,
        speed_time_sec: classified.speed_time_sec,
        excluded_from_speed: classified.excluded_from_speed,
        exclusion_reason: classified.exclusion_reason,
        estimated_time_sec: problem.estimated_time(),
        timestamp: now_ms,
        selection_reason: metadata
            .selection_reason
            .clone()
            .unwrap_or(SelectionReason::WeightedMix),
        difficulty_bucket: metadata.difficulty_bucket.unwrap_or_default(),
        target_level: metadata.target_level.unwrap_or_else(|| problem.level()),
        ability_before: metadata.ability_before.unwrap_or(1.0),
        ability_after: None,
        progression_mode: mode,
    }
}
