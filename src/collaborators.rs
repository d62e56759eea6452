//! Seams to the parts of the application the engine does not own.

use serde::{Deserialize, Serialize};

use crate::classifier::ErrorAnalysis;
use crate::types::{CuratedFilter, Problem, ResolvedConstraints, SkillId};

/// Produces a concrete problem for a skill at a conceptual level.
pub trait ProblemGenerator {
    fn generate(&self, skill: SkillId, level: i32, constraints: &ResolvedConstraints) -> Problem;
}

/// A curated item as listed by the bank, before materialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateItem {
    pub skill_tag: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub ability_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializeOptions {
    pub level_hint: i32,
    pub preferred_skill_tag: Option<String>,
    pub exclude_skill_tags: Vec<String>,
}

/// Read-only access to the curated item bank.
pub trait CuratedItemBank {
    fn filter(&self, filter: &CuratedFilter) -> Vec<CandidateItem>;

    fn materialize(&self, filter: &CuratedFilter, options: &MaterializeOptions) -> Option<Problem>;
}

/// Domain-specific explanation of a wrong answer.
pub trait ErrorAnalyzer {
    fn analyze_error(&self, problem: &Problem, student_answer: f64) -> Option<ErrorAnalysis>;
}

/// Bank with no items; every curated request reports no candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBank;

impl CuratedItemBank for EmptyBank {
    fn filter(&self, _filter: &CuratedFilter) -> Vec<CandidateItem> {
        Vec::new()
    }

    fn materialize(&self, _filter: &CuratedFilter, _options: &MaterializeOptions) -> Option<Problem> {
        None
    }
}

/// Analyzer that never has an opinion, leaving classification to the built-in rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnalysis;

impl ErrorAnalyzer for NoAnalysis {
    fn analyze_error(&self, _problem: &Problem, _student_answer: f64) -> Option<ErrorAnalysis> {
        None
    }
}
