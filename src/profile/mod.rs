//! Learner profile aggregate.
//!
//! The profile is owned by exactly one session at a time. The engine mutates it in place and
//! never performs I/O; loading and storing it is the caller's concern.

pub mod ability;
pub mod stats;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::advance::AdvanceOfferRecord;
use crate::config::LimitsParams;
use crate::rotation::RotationBucket;
use crate::types::{
    clamp_ability, clamp_level, DifficultyBucket, ErrorCategory, ExclusionReason,
    ProgressionMode, SelectionReason, SkillId, MIN_ABILITY,
};

pub use ability::{ability, peek_ability, seed_ability, set_ability};

/// Fine-grained ability for one item template (skill tag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillState {
    pub ability: f64,
    pub attempts: u32,
    pub correct: u32,
    pub reasonable: u32,
    pub avg_time: f64,
    pub last_seen: Option<i64>,
}

impl SkillState {
    pub fn new(ability: f64) -> Self {
        Self {
            ability: clamp_ability(ability),
            attempts: 0,
            correct: 0,
            reasonable: 0,
            avg_time: 0.0,
            last_seen: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub skill_tag: String,
    #[serde(default)]
    pub skill: Option<SkillId>,
    #[serde(default)]
    pub level: i32,
    pub correct: bool,
    #[serde(default)]
    pub error_category: ErrorCategory,
    #[serde(default)]
    pub is_reasonable: bool,
    #[serde(default)]
    pub raw_time_sec: f64,
    #[serde(default)]
    pub speed_time_sec: Option<f64>,
    #[serde(default)]
    pub excluded_from_speed: bool,
    #[serde(default)]
    pub exclusion_reason: Option<ExclusionReason>,
    #[serde(default)]
    pub estimated_time_sec: Option<f64>,
    pub timestamp: i64,
    #[serde(default = "default_reason")]
    pub selection_reason: SelectionReason,
    #[serde(default)]
    pub difficulty_bucket: DifficultyBucket,
    #[serde(default)]
    pub target_level: i32,
    #[serde(default = "default_ability")]
    pub ability_before: f64,
    #[serde(default)]
    pub ability_after: Option<f64>,
    #[serde(default)]
    pub progression_mode: ProgressionMode,
}

fn default_reason() -> SelectionReason {
    SelectionReason::WeightedMix
}

fn default_ability() -> f64 {
    MIN_ABILITY
}

impl AttemptRecord {
    /// Minimal record; timing and annotation fields get neutral defaults.
    pub fn new(skill_tag: &str, skill: SkillId, level: i32, correct: bool, timestamp: i64) -> Self {
        Self {
            skill_tag: skill_tag.to_string(),
            skill: Some(skill),
            level: clamp_level(level),
            correct,
            error_category: if correct {
                ErrorCategory::None
            } else {
                ErrorCategory::Knowledge
            },
            is_reasonable: correct,
            raw_time_sec: 0.0,
            speed_time_sec: None,
            excluded_from_speed: false,
            exclusion_reason: None,
            estimated_time_sec: None,
            timestamp,
            selection_reason: default_reason(),
            difficulty_bucket: DifficultyBucket::Core,
            target_level: clamp_level(level),
            ability_before: MIN_ABILITY,
            ability_after: None,
            progression_mode: ProgressionMode::Challenge,
        }
    }

    pub fn with_speed_time(mut self, seconds: f64) -> Self {
        self.raw_time_sec = seconds;
        self.speed_time_sec = Some(seconds);
        self
    }

    pub fn resolved_skill(&self) -> SkillId {
        self.skill
            .or_else(|| SkillId::from_skill_tag(&self.skill_tag))
            .unwrap_or(SkillId::Addition)
    }

    pub fn resolved_level(&self) -> i32 {
        if self.level > 0 {
            clamp_level(self.level)
        } else if self.target_level > 0 {
            clamp_level(self.target_level)
        } else {
            1
        }
    }

    /// Time usable for speed statistics: the speed time, else the raw time unless it was
    /// excluded.
    pub fn usable_time(&self) -> Option<f64> {
        if let Some(speed) = self.speed_time_sec.filter(|t| t.is_finite() && *t > 0.0) {
            return Some(speed);
        }
        if self.excluded_from_speed {
            return None;
        }
        Some(self.raw_time_sec).filter(|t| t.is_finite() && *t > 0.0)
    }
}

/// Two bounded views over the answer stream: a short `recent` window for rolling
/// statistics and a long `log` for mastery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptHistory {
    #[serde(default)]
    pub recent: VecDeque<AttemptRecord>,
    #[serde(default)]
    pub log: VecDeque<AttemptRecord>,
}

impl AttemptHistory {
    pub fn push(&mut self, record: AttemptRecord, limits: &LimitsParams) {
        self.recent.push_back(record.clone());
        while self.recent.len() > limits.recent_history.max(1) {
            self.recent.pop_front();
        }
        self.log.push_back(record);
        while self.log.len() > limits.attempt_log.max(1) {
            self.log.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&AttemptRecord> {
        self.recent.back()
    }

    pub fn latest_mut(&mut self) -> Option<&mut AttemptRecord> {
        self.recent.back_mut()
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRecord {
    pub timestamp: i64,
    pub skill_tag: String,
    pub skill: SkillId,
    pub selection_reason: SelectionReason,
    pub difficulty_bucket: DifficultyBucket,
    pub target_level: i32,
    pub ability_before: f64,
    pub progression_mode: ProgressionMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfile {
    pub current_difficulty: f64,
    pub highest_difficulty: f64,
    #[serde(default)]
    pub ability_by_skill: Option<BTreeMap<SkillId, f64>>,
    #[serde(default)]
    pub item_skill_states: HashMap<String, SkillState>,
    #[serde(default)]
    pub recent_selections: VecDeque<SelectionRecord>,
    #[serde(default)]
    pub rotation_index: HashMap<String, RotationBucket>,
    #[serde(default)]
    pub history: AttemptHistory,
    #[serde(default)]
    pub last_advance_offer: Option<AdvanceOfferRecord>,
}

impl Default for LearnerProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl LearnerProfile {
    pub fn new() -> Self {
        Self::with_difficulty(MIN_ABILITY)
    }

    pub fn with_difficulty(difficulty: f64) -> Self {
        let difficulty = clamp_ability(difficulty);
        Self {
            current_difficulty: difficulty,
            highest_difficulty: difficulty,
            ability_by_skill: None,
            item_skill_states: HashMap::new(),
            recent_selections: VecDeque::new(),
            rotation_index: HashMap::new(),
            history: AttemptHistory::default(),
            last_advance_offer: None,
        }
    }

    /// Repairs and seeds adaptive state. Existing valid values are never overwritten, so
    /// calling this repeatedly is harmless.
    pub fn ensure_adaptive_state(&mut self) {
        if !self.current_difficulty.is_finite() {
            self.current_difficulty = MIN_ABILITY;
        }
        self.current_difficulty = clamp_ability(self.current_difficulty);
        if !self.highest_difficulty.is_finite() || self.highest_difficulty < MIN_ABILITY {
            self.highest_difficulty = self.current_difficulty;
        }

        let global = self.current_difficulty;
        let abilities = self.ability_by_skill.get_or_insert_with(BTreeMap::new);
        for skill in SkillId::ALL {
            match abilities.get(&skill) {
                Some(value) if value.is_finite() => {}
                _ => {
                    abilities.insert(skill, seed_ability(skill, global));
                }
            }
        }
    }

    /// Fills in skill and level on legacy attempt records. Returns whether anything changed.
    pub fn migrate_legacy_history(&mut self) -> bool {
        let mut changed = false;
        for record in self
            .history
            .recent
            .iter_mut()
            .chain(self.history.log.iter_mut())
        {
            if record.skill.is_none() {
                record.skill = Some(record.resolved_skill());
                changed = true;
            }
            let level = record.resolved_level();
            if record.level != level {
                record.level = level;
                changed = true;
            }
        }
        if changed {
            tracing::debug!(
                recent = self.history.recent.len(),
                log = self.history.log.len(),
                "migrated legacy attempt records"
            );
        }
        changed
    }

    pub fn push_attempt(&mut self, record: AttemptRecord, limits: &LimitsParams) {
        self.history.push(record, limits);
    }

    pub fn push_selection(&mut self, record: SelectionRecord, limits: &LimitsParams) {
        self.recent_selections.push_back(record);
        while self.recent_selections.len() > limits.recent_selections.max(1) {
            self.recent_selections.pop_front();
        }
    }

    /// Item skill state for a tag, created from the global estimate on first use.
    pub fn skill_state_mut(&mut self, skill_tag: &str) -> &mut SkillState {
        let seed = self.current_difficulty;
        self.item_skill_states
            .entry(skill_tag.to_string())
            .or_insert_with(|| SkillState::new(seed))
    }
}
