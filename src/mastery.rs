//! Level mastery derived from the attempt log.
//!
//! A level counts as mastered once it has at least `min_attempts` attempts with a success
//! rate of at least `min_success_rate`. Everything here is read-only over the history.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::start_of_week;
use crate::config::MasteryParams;
use crate::profile::{AttemptHistory, AttemptRecord, LearnerProfile};
use crate::types::{SkillId, MAX_LEVEL, MIN_LEVEL};

const RATE_EPSILON: f64 = 1e-9;
const LEVEL_ESTIMATE_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStatus {
    pub attempts: usize,
    pub correct: usize,
    pub success_rate: f64,
    pub is_mastered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OverviewOptions {
    pub params: MasteryParams,
    pub since_ms: Option<i64>,
}

fn status_from_counts(attempts: usize, correct: usize, params: &MasteryParams) -> LevelStatus {
    let success_rate = if attempts > 0 {
        correct as f64 / attempts as f64
    } else {
        0.0
    };
    LevelStatus {
        attempts,
        correct,
        success_rate,
        is_mastered: attempts >= params.min_attempts
            && success_rate + RATE_EPSILON >= params.min_success_rate,
    }
}

fn level_status_filtered<'a>(
    records: impl Iterator<Item = &'a AttemptRecord>,
    skill: SkillId,
    level: i32,
    params: &MasteryParams,
) -> LevelStatus {
    let (attempts, correct) = records
        .filter(|record| record.resolved_skill() == skill && record.resolved_level() == level)
        .fold((0usize, 0usize), |(attempts, correct), record| {
            (attempts + 1, correct + usize::from(record.correct))
        });
    status_from_counts(attempts, correct, params)
}

pub fn level_status(
    history: &AttemptHistory,
    skill: SkillId,
    level: i32,
    params: &MasteryParams,
) -> LevelStatus {
    level_status_filtered(history.log.iter(), skill, level, params)
}

pub fn level_status_since(
    history: &AttemptHistory,
    skill: SkillId,
    level: i32,
    since_ms: i64,
    params: &MasteryParams,
) -> LevelStatus {
    level_status_filtered(
        history.log.iter().filter(|r| r.timestamp >= since_ms),
        skill,
        level,
        params,
    )
}

pub fn weekly_level_status(
    history: &AttemptHistory,
    skill: SkillId,
    level: i32,
    now_ms: i64,
    params: &MasteryParams,
) -> LevelStatus {
    level_status_since(history, skill, level, start_of_week(now_ms), params)
}

pub fn is_level_mastered(
    history: &AttemptHistory,
    skill: SkillId,
    level: i32,
    params: &MasteryParams,
) -> bool {
    level_status(history, skill, level, params).is_mastered
}

/// First level in 1..=12 that is not mastered; 12 when every level is.
pub fn lowest_unmastered_level(history: &AttemptHistory, skill: SkillId, params: &MasteryParams) -> i32 {
    (MIN_LEVEL..=MAX_LEVEL)
        .find(|level| !is_level_mastered(history, skill, *level, params))
        .unwrap_or(MAX_LEVEL)
}

pub fn lowest_unmastered_level_since(
    history: &AttemptHistory,
    skill: SkillId,
    since_ms: i64,
    params: &MasteryParams,
) -> i32 {
    (MIN_LEVEL..=MAX_LEVEL)
        .find(|level| !level_status_since(history, skill, *level, since_ms, params).is_mastered)
        .unwrap_or(MAX_LEVEL)
}

/// Lowest level at or below `up_to` that has been practised but not mastered. A level with
/// fewer than `min_attempts` answers is unmastered; levels the learner never saw do not
/// count as struggling.
pub fn struggle_floor(
    history: &AttemptHistory,
    skill: SkillId,
    up_to: i32,
    params: &MasteryParams,
) -> Option<i32> {
    (MIN_LEVEL..=up_to.min(MAX_LEVEL)).find(|level| {
        let status = level_status(history, skill, *level, params);
        status.attempts > 0 && !status.is_mastered
    })
}

/// Mastered levels per skill, ascending.
pub fn mastery_overview(history: &AttemptHistory, options: &OverviewOptions) -> BTreeMap<SkillId, Vec<i32>> {
    let mut buckets: BTreeMap<(SkillId, i32), (usize, usize)> = BTreeMap::new();
    for record in history.log.iter() {
        if options.since_ms.is_some_and(|since| record.timestamp < since) {
            continue;
        }
        let entry = buckets
            .entry((record.resolved_skill(), record.resolved_level()))
            .or_insert((0, 0));
        entry.0 += 1;
        entry.1 += usize::from(record.correct);
    }

    let mut mastery: BTreeMap<SkillId, Vec<i32>> = BTreeMap::new();
    for ((skill, level), (attempts, correct)) in buckets {
        if status_from_counts(attempts, correct, &options.params).is_mastered {
            mastery.entry(skill).or_default().push(level);
        }
    }
    mastery
}

pub fn weekly_mastery_overview(
    history: &AttemptHistory,
    now_ms: i64,
    params: &MasteryParams,
) -> BTreeMap<SkillId, Vec<i32>> {
    mastery_overview(
        history,
        &OverviewOptions {
            params: params.clone(),
            since_ms: Some(start_of_week(now_ms)),
        },
    )
}

/// Mean level of the last 20 attempts on a skill, 1 when there are none.
pub fn estimate_skill_level(profile: &LearnerProfile, skill: SkillId) -> f64 {
    let levels: Vec<i32> = profile
        .history
        .recent
        .iter()
        .rev()
        .filter(|record| record.resolved_skill() == skill)
        .take(LEVEL_ESTIMATE_WINDOW)
        .map(AttemptRecord::resolved_level)
        .collect();
    if levels.is_empty() {
        return 1.0;
    }
    levels.iter().sum::<i32>() as f64 / levels.len() as f64
}
