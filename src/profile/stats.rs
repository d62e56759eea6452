//! Rolling statistics over the recent attempt window.

use crate::profile::{AttemptRecord, LearnerProfile};
use crate::types::SkillId;

/// Success rate assumed when there is nothing to measure.
pub const NEUTRAL_SUCCESS_RATE: f64 = 0.5;

fn matches(record: &AttemptRecord, skill: Option<SkillId>) -> bool {
    skill.map_or(true, |skill| record.resolved_skill() == skill)
}

pub fn attempt_count(profile: &LearnerProfile, skill: Option<SkillId>) -> usize {
    profile
        .history
        .recent
        .iter()
        .filter(|record| matches(record, skill))
        .count()
}

/// Success rate over the last `count` attempts (0.5 when there are none).
pub fn success_rate(profile: &LearnerProfile, skill: Option<SkillId>, count: usize) -> f64 {
    let recent = last_n(profile, skill, count);
    if recent.is_empty() {
        return NEUTRAL_SUCCESS_RATE;
    }
    recent.iter().filter(|record| record.correct).count() as f64 / recent.len() as f64
}

/// The last `count` matching attempts, oldest first.
pub fn last_n(profile: &LearnerProfile, skill: Option<SkillId>, count: usize) -> Vec<&AttemptRecord> {
    let mut picked: Vec<&AttemptRecord> = profile
        .history
        .recent
        .iter()
        .rev()
        .filter(|record| matches(record, skill))
        .take(count)
        .collect();
    picked.reverse();
    picked
}

pub fn consecutive_errors(profile: &LearnerProfile, skill: Option<SkillId>) -> usize {
    profile
        .history
        .recent
        .iter()
        .rev()
        .filter(|record| matches(record, skill))
        .take_while(|record| !record.correct)
        .count()
}

pub fn current_streak(profile: &LearnerProfile, skill: Option<SkillId>) -> usize {
    profile
        .history
        .recent
        .iter()
        .rev()
        .filter(|record| matches(record, skill))
        .take_while(|record| record.correct)
        .count()
}

pub fn last_attempt(profile: &LearnerProfile, skill: Option<SkillId>) -> Option<&AttemptRecord> {
    profile
        .history
        .recent
        .iter()
        .rev()
        .find(|record| matches(record, skill))
}

pub fn attempts_since(profile: &LearnerProfile, skill: Option<SkillId>, since_ms: i64) -> usize {
    profile
        .history
        .recent
        .iter()
        .filter(|record| record.timestamp >= since_ms && matches(record, skill))
        .count()
}

/// Median of the positive finite values.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut clean: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    if clean.is_empty() {
        return None;
    }
    clean.sort_by(|a, b| a.total_cmp(b));
    let middle = clean.len() / 2;
    if clean.len() % 2 == 0 {
        Some((clean[middle - 1] + clean[middle]) / 2.0)
    } else {
        Some(clean[middle])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsParams;

    fn push(profile: &mut LearnerProfile, tag: &str, skill: SkillId, correct: bool) {
        let ts = profile.history.len() as i64;
        profile.push_attempt(
            AttemptRecord::new(tag, skill, 3, correct, ts),
            &LimitsParams::default(),
        );
    }

    #[test]
    fn success_rate_is_per_skill() {
        let mut profile = LearnerProfile::with_difficulty(6.0);
        push(&mut profile, "add_basic", SkillId::Addition, true);
        push(&mut profile, "add_basic", SkillId::Addition, true);
        push(&mut profile, "sub_basic", SkillId::Subtraction, false);
        push(&mut profile, "sub_basic", SkillId::Subtraction, false);
        assert_eq!(success_rate(&profile, Some(SkillId::Addition), 5), 1.0);
        assert_eq!(success_rate(&profile, Some(SkillId::Subtraction), 5), 0.0);
        assert_eq!(success_rate(&profile, Some(SkillId::Division), 5), 0.5);
        assert_eq!(success_rate(&profile, None, 4), 0.5);
    }

    #[test]
    fn consecutive_errors_skip_other_skills() {
        let mut profile = LearnerProfile::with_difficulty(6.0);
        push(&mut profile, "sub_basic", SkillId::Subtraction, true);
        push(&mut profile, "add_basic", SkillId::Addition, true);
        push(&mut profile, "sub_basic", SkillId::Subtraction, false);
        push(&mut profile, "sub_basic", SkillId::Subtraction, false);
        assert_eq!(consecutive_errors(&profile, Some(SkillId::Subtraction)), 2);
        assert_eq!(consecutive_errors(&profile, Some(SkillId::Addition)), 0);
        assert_eq!(consecutive_errors(&profile, None), 2);
        assert_eq!(current_streak(&profile, Some(SkillId::Addition)), 1);
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[0.0, -1.0, f64::NAN]), None);
    }
}
