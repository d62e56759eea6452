//! Explicit level-up offers for learners practising in steady mode.
//!
//! Steady mode moves ability slowly on purpose, so a learner who is clearly comfortable at
//! their level gets asked whether they want to move on instead of waiting for the drift.

use serde::{Deserialize, Serialize};

use crate::config::AdvanceParams;
use crate::profile::{ability, set_ability, AttemptRecord, LearnerProfile};
use crate::types::{round_level, ErrorCategory, ProgressionMode, SkillId, MAX_LEVEL};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceOfferRecord {
    pub skill: SkillId,
    pub from_level: i32,
    pub next_level: i32,
    /// `None` while the learner has not answered.
    #[serde(default)]
    pub accepted: Option<bool>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceOffer {
    pub skill: SkillId,
    pub from_level: i32,
    pub next_level: i32,
    pub success_rate: f64,
    pub sample_size: usize,
}

fn counts_toward_advance(record: &AttemptRecord) -> bool {
    record.correct || record.error_category != ErrorCategory::Inattention
}

/// Evaluates and records an advance offer for `skill`. Only steady mode makes offers.
pub fn offer_steady_advance(
    profile: &mut LearnerProfile,
    skill: SkillId,
    mode: ProgressionMode,
    now_ms: i64,
    params: &AdvanceParams,
) -> Option<AdvanceOffer> {
    if mode != ProgressionMode::Steady {
        return None;
    }

    let from_level = round_level(ability(profile, skill));
    if from_level >= MAX_LEVEL {
        return None;
    }
    let next_level = from_level + 1;

    let mut window: Vec<&AttemptRecord> = profile
        .history
        .recent
        .iter()
        .rev()
        .filter(|record| record.resolved_skill() == skill)
        .take(params.window)
        .filter(|record| record.resolved_level() == from_level && counts_toward_advance(record))
        .collect();
    window.reverse();

    let sample_size = window.len();
    if sample_size < params.min_samples.max(1) {
        return None;
    }
    let correct = window.iter().filter(|record| record.correct).count();
    let reasonable = window
        .iter()
        .filter(|record| record.correct || record.is_reasonable)
        .count();
    let success_rate = correct as f64 / sample_size as f64;
    let reasonable_rate = reasonable as f64 / sample_size as f64;
    if success_rate < params.min_success_rate || reasonable_rate < params.min_reasonable_rate {
        return None;
    }

    if let Some(last) = profile.last_advance_offer.as_ref() {
        let same_offer =
            last.skill == skill && last.from_level == from_level && last.next_level == next_level;
        if same_offer && now_ms.saturating_sub(last.timestamp) < params.cooldown_ms {
            return None;
        }
    }

    profile.last_advance_offer = Some(AdvanceOfferRecord {
        skill,
        from_level,
        next_level,
        accepted: None,
        timestamp: now_ms,
    });
    tracing::info!(
        skill = skill.as_str(),
        from_level,
        next_level,
        success_rate,
        sample_size,
        "steady advance offered"
    );

    Some(AdvanceOffer {
        skill,
        from_level,
        next_level,
        success_rate,
        sample_size,
    })
}

/// Raises the global and skill ability to at least the offered level. Returns the updated
/// record, or `None` when no offer is pending.
pub fn accept_advance(profile: &mut LearnerProfile) -> Option<AdvanceOfferRecord> {
    let offer = pending_offer(profile)?;
    let target = f64::from(offer.next_level);

    let current_skill = ability(profile, offer.skill);
    if current_skill < target {
        set_ability(profile, offer.skill, target);
    }
    if profile.current_difficulty < target {
        profile.current_difficulty = target;
    }
    if profile.highest_difficulty < profile.current_difficulty {
        profile.highest_difficulty = profile.current_difficulty;
    }

    tracing::info!(
        skill = offer.skill.as_str(),
        next_level = offer.next_level,
        "steady advance accepted"
    );
    resolve_offer(profile, true)
}

pub fn decline_advance(profile: &mut LearnerProfile) -> Option<AdvanceOfferRecord> {
    let offer = pending_offer(profile)?;
    tracing::debug!(skill = offer.skill.as_str(), "steady advance declined");
    resolve_offer(profile, false)
}

fn pending_offer(profile: &LearnerProfile) -> Option<AdvanceOfferRecord> {
    profile
        .last_advance_offer
        .clone()
        .filter(|offer| offer.accepted.is_none())
}

fn resolve_offer(profile: &mut LearnerProfile, accepted: bool) -> Option<AdvanceOfferRecord> {
    let record = profile.last_advance_offer.as_mut()?;
    record.accepted = Some(accepted);
    Some(record.clone())
}
