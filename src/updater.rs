//! Ability updates after each answer.
//!
//! Two estimates move per answer: the per-skill ability (and half of its delta on the global
//! difficulty) and the fine-grained state of the item template that was answered.

use serde::Serialize;

use crate::classifier::is_fast_correct;
use crate::config::EngineConfig;
use crate::profile::stats::{consecutive_errors, current_streak, success_rate};
use crate::profile::{ability, set_ability, LearnerProfile};
use crate::types::{clamp_ability, ErrorCategory, ProgressionMode, SkillId};

#[derive(Debug, Clone, Default)]
pub struct AdjustOptions {
    pub error_category: ErrorCategory,
    pub elapsed_sec: Option<f64>,
    pub estimated_time_sec: Option<f64>,
    pub progression_mode: ProgressionMode,
}

/// Which rule produced the base delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaRule {
    InattentionSlip,
    StrongStreak,
    Streak,
    PositiveTrend,
    LowLevelNudge,
    SevereStruggle,
    DoubleError,
    NegativeTrend,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyAdjustment {
    pub skill: SkillId,
    pub rule: DeltaRule,
    pub comeback_bonus: bool,
    pub speed_bonus: bool,
    pub delta: f64,
    pub skill_before: f64,
    pub skill_after: f64,
    pub global_before: f64,
    pub global_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillStateUpdate {
    pub skill_tag: String,
    pub before: f64,
    pub after: f64,
}

/// Applies the answer to the ability of the skill behind the most recent attempt.
///
/// The attempt must already be appended to the profile history.
pub fn adjust_difficulty(
    profile: &mut LearnerProfile,
    was_correct: bool,
    options: &AdjustOptions,
    config: &EngineConfig,
) -> DifficultyAdjustment {
    let params = &config.ability;
    let skill = profile
        .history
        .latest()
        .map(|record| record.resolved_skill())
        .unwrap_or(SkillId::Addition);

    let skill_before = ability(profile, skill);
    let global_before = profile.current_difficulty;
    let recent_success = success_rate(profile, Some(skill), params.success_window);

    let mut comeback_bonus = false;
    let mut speed_bonus = false;

    let (rule, mut delta) = if !was_correct && options.error_category == ErrorCategory::Inattention {
        (DeltaRule::InattentionSlip, -params.inattention_penalty)
    } else if was_correct {
        let streak = current_streak(profile, Some(skill));
        let (rule, mut delta) = if streak >= 3 && recent_success >= 0.9 {
            (DeltaRule::StrongStreak, params.strong_streak_delta)
        } else if streak >= 2 {
            (DeltaRule::Streak, params.streak_delta)
        } else if recent_success >= 0.55 {
            (DeltaRule::PositiveTrend, params.trend_correct_delta)
        } else if skill_before <= 2.0 {
            (DeltaRule::LowLevelNudge, params.low_level_delta)
        } else {
            (DeltaRule::Unchanged, 0.0)
        };

        if profile.highest_difficulty - profile.current_difficulty > params.comeback_gap
            && streak >= 3
            && recent_success >= params.comeback_min_success
        {
            comeback_bonus = true;
            delta += params.comeback_bonus;
        }
        if options
            .elapsed_sec
            .is_some_and(|elapsed| is_fast_correct(elapsed, options.estimated_time_sec, &config.timing))
        {
            speed_bonus = true;
            delta += params.speed_bonus;
        }
        (rule, delta)
    } else {
        let errors = consecutive_errors(profile, Some(skill));
        if errors >= 3 && recent_success < 0.5 {
            (DeltaRule::SevereStruggle, -params.severe_wrong_delta)
        } else if errors >= 2 {
            (DeltaRule::DoubleError, -params.double_wrong_delta)
        } else if recent_success < 0.55 {
            (DeltaRule::NegativeTrend, -params.trend_wrong_delta)
        } else {
            (DeltaRule::Unchanged, 0.0)
        }
    };

    delta *= config.mode(options.progression_mode).delta_scale;

    set_ability(profile, skill, skill_before + delta);
    let skill_after = ability(profile, skill);

    profile.current_difficulty = clamp_ability(global_before + delta * params.global_share);
    if profile.current_difficulty > profile.highest_difficulty {
        profile.highest_difficulty = profile.current_difficulty;
    }

    tracing::debug!(
        skill = skill.as_str(),
        rule = ?rule,
        delta,
        skill_after,
        global_after = profile.current_difficulty,
        "ability adjusted"
    );

    DifficultyAdjustment {
        skill,
        rule,
        comeback_bonus,
        speed_bonus,
        delta,
        skill_before,
        skill_after,
        global_before,
        global_after: profile.current_difficulty,
    }
}

/// Moves the item-template state of the latest attempt and stamps `ability_after` on it.
/// Returns `None` when there is no attempt to apply.
pub fn update_skill_state_after_answer(
    profile: &mut LearnerProfile,
    config: &EngineConfig,
) -> Option<SkillStateUpdate> {
    let params = &config.ability;
    let latest = profile.history.latest()?.clone();

    let effective_time = latest
        .speed_time_sec
        .filter(|t| t.is_finite() && *t > 0.0)
        .or_else(|| Some(latest.raw_time_sec).filter(|t| t.is_finite() && *t > 0.0));

    let mut delta = match (latest.correct, latest.is_reasonable) {
        (true, true) => params.item_correct_reasonable,
        (true, false) => params.item_correct_unreasonable,
        (false, true) => params.item_wrong_reasonable,
        (false, false) => params.item_wrong_unreasonable,
    };
    if !latest.correct && latest.error_category == ErrorCategory::Inattention {
        delta = params.item_inattention;
    }
    if latest.correct
        && effective_time.is_some_and(|t| t < config.timing.skill_state_fast_sec)
    {
        delta += params.item_fast_bonus;
    }

    let state = profile.skill_state_mut(&latest.skill_tag);
    let before = state.ability;
    state.ability = clamp_ability(before + delta);
    state.attempts += 1;
    if latest.correct {
        state.correct += 1;
    }
    if latest.is_reasonable {
        state.reasonable += 1;
    }
    if let Some(time) = effective_time.filter(|_| !latest.excluded_from_speed) {
        state.avg_time += (time - state.avg_time) / f64::from(state.attempts);
    }
    state.last_seen = Some(latest.timestamp);
    let after = state.ability;

    if let Some(record) = profile.history.latest_mut() {
        record.ability_after = Some(after);
    }
    if let Some(record) = profile.history.log.back_mut() {
        if record.timestamp == latest.timestamp && record.skill_tag == latest.skill_tag {
            record.ability_after = Some(after);
        }
    }

    Some(SkillStateUpdate {
        skill_tag: latest.skill_tag,
        before,
        after,
    })
}
