use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const MIN_LEVEL: i32 = 1;
pub const MAX_LEVEL: i32 = 12;
pub const MIN_ABILITY: f64 = 1.0;
pub const MAX_ABILITY: f64 = 12.0;

pub fn clamp_level(level: i32) -> i32 {
    level.clamp(MIN_LEVEL, MAX_LEVEL)
}

/// Clamps an ability estimate into [1, 12]. Non-finite values collapse to the floor.
pub fn clamp_ability(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(MIN_ABILITY, MAX_ABILITY)
    } else {
        MIN_ABILITY
    }
}

pub fn round_level(ability: f64) -> i32 {
    clamp_level(clamp_ability(ability).round() as i32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillId {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    AlgebraEvaluate,
    AlgebraSimplify,
    ArithmeticExpressions,
    Fractions,
    Percentage,
}

impl SkillId {
    pub const ALL: [SkillId; 9] = [
        Self::Addition,
        Self::Subtraction,
        Self::Multiplication,
        Self::Division,
        Self::AlgebraEvaluate,
        Self::AlgebraSimplify,
        Self::ArithmeticExpressions,
        Self::Fractions,
        Self::Percentage,
    ];

    pub const ARITHMETIC: [SkillId; 4] = [
        Self::Addition,
        Self::Subtraction,
        Self::Multiplication,
        Self::Division,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Addition => "addition",
            Self::Subtraction => "subtraction",
            Self::Multiplication => "multiplication",
            Self::Division => "division",
            Self::AlgebraEvaluate => "algebra_evaluate",
            Self::AlgebraSimplify => "algebra_simplify",
            Self::ArithmeticExpressions => "arithmetic_expressions",
            Self::Fractions => "fractions",
            Self::Percentage => "percentage",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|skill| skill.as_str() == normalized)
    }

    /// Infers the skill behind an item template / skill tag such as `sub_borrow_2d`.
    pub fn from_skill_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        if tag.starts_with("add_") {
            return Some(Self::Addition);
        }
        if tag.starts_with("sub_") {
            return Some(Self::Subtraction);
        }
        if tag.starts_with("mul_") {
            return Some(Self::Multiplication);
        }
        if tag.starts_with("div_") {
            return Some(Self::Division);
        }
        if let Some(skill) = Self::parse(tag) {
            return Some(skill);
        }
        // multi-word skill ids contain underscores themselves
        Self::ALL
            .iter()
            .copied()
            .filter(|skill| tag.starts_with(&format!("{}_", skill.as_str())))
            .max_by_key(|skill| skill.as_str().len())
            .or_else(|| tag.split('_').next().and_then(Self::parse))
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProgressionMode {
    #[default]
    Challenge,
    Steady,
}

impl ProgressionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Challenge => "challenge",
            Self::Steady => "steady",
        }
    }

    pub fn parse_or(s: &str, fallback: Self) -> Self {
        match s.trim().to_lowercase().as_str() {
            "challenge" => Self::Challenge,
            "steady" => Self::Steady,
            _ => fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    #[default]
    None,
    Inattention,
    Knowledge,
    Misconception,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Inattention => "inattention",
            Self::Knowledge => "knowledge",
            Self::Misconception => "misconception",
        }
    }

    /// Only the three error classes; `none` and unknown strings yield `None`.
    pub fn parse_error_class(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "inattention" => Some(Self::Inattention),
            "knowledge" => Some(Self::Knowledge),
            "misconception" => Some(Self::Misconception),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    InvalidTime,
    HardCap,
    Interruption,
    PersonalOutlier,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTime => "invalid_time",
            Self::HardCap => "hard_cap",
            Self::Interruption => "interruption",
            Self::PersonalOutlier => "personal_outlier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyBucket {
    VeryEasy,
    Easy,
    #[default]
    Core,
    Hard,
    Challenge,
}

impl DifficultyBucket {
    pub const ALL: [DifficultyBucket; 5] = [
        Self::VeryEasy,
        Self::Easy,
        Self::Core,
        Self::Hard,
        Self::Challenge,
    ];

    pub fn offset(&self) -> i32 {
        match self {
            Self::VeryEasy => -2,
            Self::Easy => -1,
            Self::Core => 0,
            Self::Hard => 1,
            Self::Challenge => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryEasy => "very_easy",
            Self::Easy => "easy",
            Self::Core => "core",
            Self::Hard => "hard",
            Self::Challenge => "challenge",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|bucket| bucket.as_str() == normalized)
    }
}

/// Why the selection policy picked a level. Caller-supplied reasons for forced levels are
/// carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SelectionReason {
    NcmAssignment,
    ForcedLevel,
    WarmupAfterBreak,
    RecoveryEasy,
    HighSuccessPush,
    LowSuccessRelief,
    BootstrapFromLevel1,
    WeightedMix,
    Other(String),
}

impl SelectionReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::NcmAssignment => "ncm_assignment",
            Self::ForcedLevel => "forced_level",
            Self::WarmupAfterBreak => "warmup_after_break",
            Self::RecoveryEasy => "recovery_easy",
            Self::HighSuccessPush => "high_success_push",
            Self::LowSuccessRelief => "low_success_relief",
            Self::BootstrapFromLevel1 => "bootstrap_from_level1",
            Self::WeightedMix => "weighted_mix",
            Self::Other(reason) => reason.as_str(),
        }
    }
}

impl From<String> for SelectionReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ncm_assignment" => Self::NcmAssignment,
            "forced_level" => Self::ForcedLevel,
            "warmup_after_break" => Self::WarmupAfterBreak,
            "recovery_easy" => Self::RecoveryEasy,
            "high_success_push" => Self::HighSuccessPush,
            "low_success_relief" => Self::LowSuccessRelief,
            "bootstrap_from_level1" => Self::BootstrapFromLevel1,
            "weighted_mix" => Self::WeightedMix,
            _ => Self::Other(value),
        }
    }
}

impl From<SelectionReason> for String {
    fn from(value: SelectionReason) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Magnitude {
    pub a_digits: u32,
    pub b_digits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDifficulty {
    pub conceptual_level: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<Magnitude>,
}

impl Default for ProblemDifficulty {
    fn default() -> Self {
        Self {
            conceptual_level: MIN_LEVEL,
            magnitude: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemMetadata {
    #[serde(rename = "estimated_time", default)]
    pub estimated_time: Option<f64>,
    #[serde(default)]
    pub skill_tag: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub selection_reason: Option<SelectionReason>,
    #[serde(default)]
    pub difficulty_bucket: Option<DifficultyBucket>,
    #[serde(default)]
    pub target_level: Option<i32>,
    #[serde(default)]
    pub ability_before: Option<f64>,
    #[serde(default)]
    pub progression_mode: Option<ProgressionMode>,
}

/// A concrete item produced by the problem generator or the curated bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub template: String,
    #[serde(rename = "type")]
    pub skill: SkillId,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
    pub result: f64,
    #[serde(default)]
    pub difficulty: ProblemDifficulty,
    #[serde(default)]
    pub metadata: ProblemMetadata,
}

impl Problem {
    pub fn skill_tag(&self) -> &str {
        match self.metadata.skill_tag.as_deref() {
            Some(tag) if !tag.trim().is_empty() => tag,
            _ => &self.template,
        }
    }

    pub fn level(&self) -> i32 {
        clamp_level(self.difficulty.conceptual_level)
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied().filter(|v| v.is_finite())
    }

    pub fn estimated_time(&self) -> Option<f64> {
        self.metadata
            .estimated_time
            .filter(|t| t.is_finite() && *t > 0.0)
    }
}

/// Curated-bank filter: national-test item codes and ability tags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuratedFilter {
    #[serde(default)]
    pub codes: Vec<String>,
    #[serde(default)]
    pub ability_tags: Vec<String>,
}

impl CuratedFilter {
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty() && self.ability_tags.is_empty()
    }

    /// Order-insensitive key identifying this filter in the rotation index.
    pub fn signature(&self) -> String {
        let mut codes = self.codes.clone();
        codes.sort();
        let mut abilities = self.ability_tags.clone();
        abilities.sort();
        format!("codes:{}|abilities:{}", codes.join(","), abilities.join(","))
    }
}

/// Per-turn constraints as the caller hands them in. Values are untrusted and normalized
/// by the selection policy before use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionConstraints {
    #[serde(default)]
    pub allowed_types: Vec<String>,
    #[serde(default)]
    pub level_range: Option<(i32, i32)>,
    #[serde(default)]
    pub table_set: Vec<i32>,
    #[serde(default)]
    pub forced_level: Option<i32>,
    #[serde(default)]
    pub forced_type: Option<String>,
    #[serde(default)]
    pub force_reason: Option<String>,
    #[serde(default)]
    pub force_bucket: Option<String>,
    #[serde(default)]
    pub ncm_filter: Option<CuratedFilter>,
    #[serde(default)]
    pub preferred_skill_tag: Option<String>,
    #[serde(default)]
    pub progression_mode: ProgressionMode,
}

impl SelectionConstraints {
    pub fn for_mode(progression_mode: ProgressionMode) -> Self {
        Self {
            progression_mode,
            ..Self::default()
        }
    }

    pub fn only(skill: SkillId, progression_mode: ProgressionMode) -> Self {
        Self {
            allowed_types: vec![skill.as_str().to_string()],
            progression_mode,
            ..Self::default()
        }
    }
}

/// Constraints after fail-soft normalization; this is what collaborators receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConstraints {
    pub allowed_types: Vec<SkillId>,
    pub level_range: Option<(i32, i32)>,
    pub table_set: Vec<i32>,
    pub forced_level: Option<i32>,
    pub forced_type: Option<SkillId>,
    pub force_reason: Option<String>,
    pub force_bucket: Option<DifficultyBucket>,
    pub ncm_filter: Option<CuratedFilter>,
    pub preferred_skill_tag: Option<String>,
    pub progression_mode: ProgressionMode,
}

impl ResolvedConstraints {
    pub fn clamp_to_range(&self, level: i32) -> i32 {
        match self.level_range {
            Some((min, max)) => level.clamp(min, max),
            None => clamp_level(level),
        }
    }
}
