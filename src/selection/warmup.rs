//! Gentle re-entry after days away from a skill.

use rand::Rng;

use crate::clock::{start_of_day, DAY_MS};
use crate::config::WarmupParams;
use crate::profile::stats::attempts_since;
use crate::profile::LearnerProfile;
use crate::types::{SkillId, MIN_LEVEL};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarmupPlan {
    pub days_away: f64,
    /// Easier problems to serve today before normal selection resumes.
    pub quota: u32,
    pub served_today: u32,
    pub drop: i32,
}

/// A warmup applies when the last practice before today is at least `min_days_away` old
/// and today's quota is not used up yet. With `skill` set only that skill's practice
/// counts; otherwise the learner's whole history does.
pub fn warmup_plan(
    profile: &LearnerProfile,
    skill: Option<SkillId>,
    now_ms: i64,
    params: &WarmupParams,
) -> Option<WarmupPlan> {
    let today = start_of_day(now_ms);
    let last_before_today = profile
        .history
        .recent
        .iter()
        .rev()
        .filter(|record| skill.map_or(true, |s| record.resolved_skill() == s))
        .find(|record| record.timestamp < today)?;

    let days_away = now_ms.saturating_sub(last_before_today.timestamp) as f64 / DAY_MS as f64;
    if days_away < params.min_days_away {
        return None;
    }

    let quota = (days_away.ceil() as u32).clamp(params.min_length, params.max_length);
    let served_today = u32::try_from(attempts_since(profile, skill, today)).unwrap_or(u32::MAX);
    if served_today >= quota {
        return None;
    }

    let drop = if days_away >= params.long_break_days { 2 } else { 1 };
    Some(WarmupPlan {
        days_away,
        quota,
        served_today,
        drop,
    })
}

pub fn warmup_level<R: Rng + ?Sized>(
    base_level: i32,
    plan: &WarmupPlan,
    params: &WarmupParams,
    rng: &mut R,
) -> i32 {
    let mut level = base_level - plan.drop;
    if rng.gen_bool(params.extra_drop_probability.clamp(0.0, 1.0)) {
        level -= 1;
    }
    level.max(MIN_LEVEL)
}
