#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;

use practice_engine::collaborators::{
    CandidateItem, CuratedItemBank, MaterializeOptions, ProblemGenerator,
};
use practice_engine::config::LimitsParams;
use practice_engine::profile::{AttemptRecord, LearnerProfile};
use practice_engine::types::{
    CuratedFilter, Problem, ProblemDifficulty, ProblemMetadata, ResolvedConstraints, SkillId,
};

/// 2026-10-14 12:00 UTC, a Wednesday.
pub const WED_NOON: i64 = 1_791_979_200_000;
pub const MINUTE: i64 = 60_000;

/// Deterministic generator: `a = level`, `b = 1`.
pub struct FixtureGenerator;

impl ProblemGenerator for FixtureGenerator {
    fn generate(&self, skill: SkillId, level: i32, _constraints: &ResolvedConstraints) -> Problem {
        let a = f64::from(level);
        let result = match skill {
            SkillId::Subtraction => a - 1.0,
            SkillId::Multiplication | SkillId::Division => a,
            _ => a + 1.0,
        };
        Problem {
            id: format!("{skill}-{level}"),
            template: format!("{}_fixture", skill.as_str()),
            skill,
            values: BTreeMap::from([("a".to_string(), a), ("b".to_string(), 1.0)]),
            result,
            difficulty: ProblemDifficulty {
                conceptual_level: level,
                magnitude: None,
            },
            metadata: ProblemMetadata::default(),
        }
    }
}

/// In-memory curated bank. Items are `ncm_<code>_item_<n>` for each code.
pub struct FixtureBank {
    items: Vec<CandidateItem>,
    pub fail_materialize: bool,
    pub requests: RefCell<Vec<MaterializeOptions>>,
}

impl FixtureBank {
    pub fn new(codes: &[(&str, usize)]) -> Self {
        let items = codes
            .iter()
            .flat_map(|(code, count)| {
                (1..=*count).map(move |n| CandidateItem {
                    skill_tag: format!("ncm_{}_item_{n}", code.to_lowercase()),
                    code: Some(code.to_string()),
                    ability_tags: vec!["reasoning".to_string()],
                })
            })
            .collect();
        Self {
            items,
            fail_materialize: false,
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl CuratedItemBank for FixtureBank {
    fn filter(&self, filter: &CuratedFilter) -> Vec<CandidateItem> {
        self.items
            .iter()
            .filter(|item| {
                let code_ok = filter.codes.is_empty()
                    || item.code.as_ref().is_some_and(|code| filter.codes.contains(code));
                let ability_ok = filter.ability_tags.is_empty()
                    || item.ability_tags.iter().any(|tag| filter.ability_tags.contains(tag));
                code_ok && ability_ok
            })
            .cloned()
            .collect()
    }

    fn materialize(&self, _filter: &CuratedFilter, options: &MaterializeOptions) -> Option<Problem> {
        self.requests.borrow_mut().push(options.clone());
        if self.fail_materialize {
            return None;
        }
        let tag = options.preferred_skill_tag.clone()?;
        Some(Problem {
            id: tag.clone(),
            template: "ncm".to_string(),
            skill: SkillId::Addition,
            values: BTreeMap::new(),
            result: 42.0,
            difficulty: ProblemDifficulty {
                conceptual_level: options.level_hint,
                magnitude: None,
            },
            metadata: ProblemMetadata {
                skill_tag: Some(tag),
                ..ProblemMetadata::default()
            },
        })
    }
}

/// Appends attempts on `skill` at `level`, one minute apart, ending just before `end_ms`.
pub fn push_attempts(
    profile: &mut LearnerProfile,
    skill: SkillId,
    level: i32,
    results: &[bool],
    end_ms: i64,
) {
    let limits = LimitsParams::default();
    let tag = format!("{}_fixture", skill.as_str());
    let start = end_ms - MINUTE * results.len() as i64;
    for (i, correct) in results.iter().enumerate() {
        profile.push_attempt(
            AttemptRecord::new(&tag, skill, level, *correct, start + MINUTE * i as i64),
            &limits,
        );
    }
}
