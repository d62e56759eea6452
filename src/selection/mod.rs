//! Selection policy: skill, level and concrete problem for the next turn.
//!
//! Branches are tried in a fixed order and the first one that applies decides the level:
//! curated assignment, forced level, warmup after a break, recovery after an error run,
//! high-success push, low-success relief, bootstrap off level 1 and finally the weighted
//! bucket mix around the learner's floor level.

pub mod bucket;
pub mod skill;
pub mod warmup;

use rand::Rng;

use crate::collaborators::{CuratedItemBank, MaterializeOptions, ProblemGenerator};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::mastery::struggle_floor;
use crate::profile::stats::{attempt_count, consecutive_errors, last_attempt, last_n, success_rate};
use crate::profile::{ability, peek_ability, AttemptRecord, LearnerProfile, SelectionRecord};
use crate::rotation::{pick_next, recent_curated_tags};
use crate::types::{
    clamp_level, round_level, CuratedFilter, DifficultyBucket, Problem, ProgressionMode,
    ResolvedConstraints, SelectionConstraints, SelectionReason, SkillId, MAX_LEVEL, MIN_LEVEL,
};

pub use skill::{choose_skill, SkillChoice};

const BOOTSTRAP_SUCCESS_WINDOW: usize = 5;

/// Everything a selection needs besides the profile and the constraints.
pub struct SelectionContext<'a, R: Rng + ?Sized> {
    pub config: &'a EngineConfig,
    pub rng: &'a mut R,
    pub now_ms: i64,
    pub generator: &'a dyn ProblemGenerator,
    pub bank: &'a dyn CuratedItemBank,
}

#[derive(Debug, Clone, PartialEq)]
struct LevelDecision {
    level: i32,
    reason: SelectionReason,
    bucket: DifficultyBucket,
}

impl LevelDecision {
    fn new(level: i32, reason: SelectionReason, bucket: DifficultyBucket) -> Self {
        Self {
            level,
            reason,
            bucket,
        }
    }
}

/// Cleans caller constraints. Nothing here fails: unknown values are dropped and numbers
/// are clamped into range.
pub fn normalize_constraints(raw: &SelectionConstraints) -> ResolvedConstraints {
    let mut allowed_types: Vec<SkillId> = Vec::new();
    for name in &raw.allowed_types {
        match SkillId::parse(name) {
            Some(skill) if !allowed_types.contains(&skill) => allowed_types.push(skill),
            Some(_) => {}
            None => tracing::warn!(skill = %name, "ignoring unknown skill in allowed types"),
        }
    }

    let mut table_set: Vec<i32> = raw
        .table_set
        .iter()
        .copied()
        .filter(|table| (2..=12).contains(table))
        .collect();
    table_set.sort_unstable();
    table_set.dedup();

    let level_range = raw.level_range.map(|(a, b)| {
        let (a, b) = (clamp_level(a), clamp_level(b));
        (a.min(b), a.max(b))
    });

    let forced_type = raw.forced_type.as_deref().and_then(|name| {
        let parsed = SkillId::parse(name);
        if parsed.is_none() {
            tracing::warn!(skill = %name, "ignoring unknown forced skill");
        }
        parsed
    });

    ResolvedConstraints {
        allowed_types,
        level_range,
        table_set,
        forced_level: raw.forced_level.map(clamp_level),
        forced_type,
        force_reason: non_empty(raw.force_reason.as_deref()),
        force_bucket: raw.force_bucket.as_deref().and_then(DifficultyBucket::parse),
        ncm_filter: raw.ncm_filter.as_ref().and_then(normalize_filter),
        preferred_skill_tag: non_empty(raw.preferred_skill_tag.as_deref()),
        progression_mode: raw.progression_mode,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn normalize_filter(raw: &CuratedFilter) -> Option<CuratedFilter> {
    let mut codes: Vec<String> = Vec::new();
    for code in &raw.codes {
        let cleaned: String = code
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .collect();
        if !cleaned.is_empty() && !codes.contains(&cleaned) {
            codes.push(cleaned);
        }
    }
    let mut ability_tags: Vec<String> = Vec::new();
    for tag in &raw.ability_tags {
        let trimmed = tag.trim();
        if !trimmed.is_empty() && !ability_tags.iter().any(|t| t == trimmed) {
            ability_tags.push(trimmed.to_string());
        }
    }
    let filter = CuratedFilter {
        codes,
        ability_tags,
    };
    (!filter.is_empty()).then_some(filter)
}

/// Picks, generates and annotates the next problem, recording the selection on the
/// profile.
pub fn select_next_problem<R: Rng + ?Sized>(
    profile: &mut LearnerProfile,
    constraints: &SelectionConstraints,
    ctx: &mut SelectionContext<'_, R>,
) -> Result<Problem> {
    profile.ensure_adaptive_state();
    let resolved = normalize_constraints(constraints);

    if let Some(filter) = resolved.ncm_filter.as_ref() {
        return select_curated(profile, filter, &resolved, ctx);
    }

    let choice = choose_skill(profile, &resolved, ctx.config, ctx.rng);
    let skill = choice.skill;
    let ability_before = ability(profile, skill);
    // a skill the chooser picked is not a deliberate return to it
    let warmup_scope = (!choice.from_chooser).then_some(skill);
    let decision = decide_level(profile, skill, ability_before, warmup_scope, &resolved, ctx);

    let mut level = decision.level;
    let forced = resolved.forced_level.is_some();
    if choice.from_chooser && !forced {
        if let Some(cap) = skill::unlock_cap(profile, skill, &ctx.config.selection) {
            level = level.min(cap);
        }
    }
    let level = resolved.clamp_to_range(clamp_level(level));

    tracing::debug!(
        skill = skill.as_str(),
        level,
        reason = %decision.reason,
        bucket = decision.bucket.as_str(),
        "selected next problem"
    );

    let problem = ctx.generator.generate(skill, level, &resolved);
    Ok(annotate(
        profile,
        problem,
        Annotation {
            reason: decision.reason,
            bucket: decision.bucket,
            target_level: level,
            ability_before,
            mode: resolved.progression_mode,
            skill_tag: None,
        },
        ctx,
    ))
}

fn decide_level<R: Rng + ?Sized>(
    profile: &LearnerProfile,
    skill: SkillId,
    skill_ability: f64,
    warmup_scope: Option<SkillId>,
    constraints: &ResolvedConstraints,
    ctx: &mut SelectionContext<'_, R>,
) -> LevelDecision {
    let config = ctx.config;
    let mode = config.mode(constraints.progression_mode);
    let base = round_level(skill_ability);

    if let Some(level) = constraints.forced_level {
        let reason = constraints
            .force_reason
            .clone()
            .map(SelectionReason::from)
            .unwrap_or(SelectionReason::ForcedLevel);
        let bucket = constraints.force_bucket.unwrap_or(DifficultyBucket::Easy);
        return LevelDecision::new(level, reason, bucket);
    }

    if let Some(plan) = warmup::warmup_plan(profile, warmup_scope, ctx.now_ms, &config.warmup) {
        let level = warmup::warmup_level(base, &plan, &config.warmup, ctx.rng);
        return LevelDecision::new(level, SelectionReason::WarmupAfterBreak, DifficultyBucket::Easy);
    }

    if consecutive_errors(profile, Some(skill)) >= config.selection.recovery_error_streak {
        let last_level = last_attempt(profile, Some(skill))
            .map(|record| record.resolved_level())
            .unwrap_or(base);
        let level = (base.min(last_level) - 1).max(MIN_LEVEL);
        return LevelDecision::new(level, SelectionReason::RecoveryEasy, DifficultyBucket::Easy);
    }

    let push_window = last_n(profile, Some(skill), mode.push_min_samples);
    if push_window.len() >= mode.push_min_samples.max(1)
        && window_success(&push_window) > mode.push_threshold
    {
        let level = (base + 1).min(MAX_LEVEL);
        return LevelDecision::new(level, SelectionReason::HighSuccessPush, DifficultyBucket::Hard);
    }

    let relief_window = last_n(profile, Some(skill), mode.relief_min_samples);
    if relief_window.len() >= mode.relief_min_samples.max(1)
        && window_success(&relief_window) < mode.relief_threshold
    {
        let level = (base - 1).max(MIN_LEVEL);
        return LevelDecision::new(level, SelectionReason::LowSuccessRelief, DifficultyBucket::Easy);
    }

    if base == MIN_LEVEL
        && success_rate(profile, Some(skill), BOOTSTRAP_SUCCESS_WINDOW) >= config.selection.bootstrap_min_success
        && attempt_count(profile, Some(skill)) >= config.selection.bootstrap_min_attempts
        && ctx.rng.gen_bool(mode.bootstrap_probability.clamp(0.0, 1.0))
    {
        return LevelDecision::new(2, SelectionReason::BootstrapFromLevel1, DifficultyBucket::Hard);
    }

    let floor = struggle_floor(&profile.history, skill, base, &config.mastery)
        .map_or(base, |struggling| struggling.min(base));
    let bucket = constraints.force_bucket.unwrap_or_else(|| {
        bucket::select_bucket(
            mode,
            success_rate(profile, Some(skill), config.selection.bucket_success_window),
            consecutive_errors(profile, Some(skill)),
            &config.selection,
            ctx.rng,
        )
    });
    LevelDecision::new(floor + bucket.offset(), SelectionReason::WeightedMix, bucket)
}

fn window_success(window: &[&AttemptRecord]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().filter(|record| record.correct).count() as f64 / window.len() as f64
}

fn select_curated<R: Rng + ?Sized>(
    profile: &mut LearnerProfile,
    filter: &CuratedFilter,
    constraints: &ResolvedConstraints,
    ctx: &mut SelectionContext<'_, R>,
) -> Result<Problem> {
    let candidates: Vec<String> = ctx
        .bank
        .filter(filter)
        .into_iter()
        .map(|item| item.skill_tag)
        .collect();

    let Some(skill_tag) = pick_next(
        profile,
        filter,
        &candidates,
        constraints.preferred_skill_tag.as_deref(),
        ctx.rng,
        ctx.now_ms,
        &ctx.config.limits,
    ) else {
        tracing::warn!(signature = %filter.signature(), "curated filter matched no items");
        return Err(EngineError::NoCandidates {
            signature: filter.signature(),
        });
    };

    let exclude_skill_tags: Vec<String> =
        recent_curated_tags(profile, ctx.config.limits.recent_curated_exclude)
            .into_iter()
            .filter(|tag| *tag != skill_tag)
            .collect();
    let options = MaterializeOptions {
        level_hint: round_level(profile.current_difficulty),
        preferred_skill_tag: Some(skill_tag.clone()),
        exclude_skill_tags,
    };

    let Some(problem) = ctx.bank.materialize(filter, &options) else {
        tracing::warn!(skill_tag = %skill_tag, "curated bank returned no item");
        return Err(EngineError::CuratedItemUnavailable { skill_tag });
    };

    let ability_before = peek_ability(profile, problem.skill);
    let target_level = problem.level();
    tracing::debug!(
        skill_tag = %skill_tag,
        level = target_level,
        reason = SelectionReason::NcmAssignment.as_str(),
        "selected curated item"
    );
    Ok(annotate(
        profile,
        problem,
        Annotation {
            reason: SelectionReason::NcmAssignment,
            bucket: DifficultyBucket::Core,
            target_level,
            ability_before,
            mode: constraints.progression_mode,
            skill_tag: Some(skill_tag),
        },
        ctx,
    ))
}

struct Annotation {
    reason: SelectionReason,
    bucket: DifficultyBucket,
    target_level: i32,
    ability_before: f64,
    mode: ProgressionMode,
    /// Tag to stamp when the item does not carry one.
    skill_tag: Option<String>,
}

fn annotate<R: Rng + ?Sized>(
    profile: &mut LearnerProfile,
    mut problem: Problem,
    annotation: Annotation,
    ctx: &SelectionContext<'_, R>,
) -> Problem {
    let has_tag = problem
        .metadata
        .skill_tag
        .as_deref()
        .is_some_and(|tag| !tag.trim().is_empty());
    if !has_tag {
        problem.metadata.skill_tag =
            Some(annotation.skill_tag.unwrap_or_else(|| problem.template.clone()));
    }
    problem.metadata.selection_reason = Some(annotation.reason.clone());
    problem.metadata.difficulty_bucket = Some(annotation.bucket);
    problem.metadata.target_level = Some(annotation.target_level);
    problem.metadata.ability_before = Some(annotation.ability_before);
    problem.metadata.progression_mode = Some(annotation.mode);

    profile.push_selection(
        SelectionRecord {
            timestamp: ctx.now_ms,
            skill_tag: problem.skill_tag().to_string(),
            skill: problem.skill,
            selection_reason: annotation.reason,
            difficulty_bucket: annotation.bucket,
            target_level: annotation.target_level,
            ability_before: annotation.ability_before,
            progression_mode: annotation.mode,
        },
        &ctx.config.limits,
    );
    problem
}
