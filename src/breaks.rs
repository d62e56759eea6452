use serde::{Deserialize, Serialize};

use crate::types::{Problem, SkillId};

pub const DEFAULT_BREAK_MINUTES: u32 = 1;
pub const SINGLE_DIGIT_BREAK_MINUTES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakPolicy {
    pub enabled: bool,
    /// `None` disables the session-length trigger.
    pub question_threshold: Option<u32>,
    pub recent_window: usize,
    pub error_threshold: usize,
    pub recommended_break_minutes: u32,
}

impl Default for BreakPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            question_threshold: Some(15),
            recent_window: 10,
            error_threshold: 5,
            recommended_break_minutes: DEFAULT_BREAK_MINUTES,
        }
    }
}

impl BreakPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            question_threshold: None,
            ..Self::default()
        }
    }

    /// Policy for the problem on screen. Table drills never prompt; single-digit
    /// addition and subtraction run longer before the first prompt.
    pub fn for_problem(problem: Option<&Problem>, table_drill: bool) -> Self {
        if table_drill {
            return Self::disabled();
        }
        if problem.is_some_and(is_single_digit_add_or_sub) {
            return Self {
                question_threshold: Some(20),
                recommended_break_minutes: SINGLE_DIGIT_BREAK_MINUTES,
                ..Self::default()
            };
        }
        Self::default()
    }
}

fn is_single_digit_add_or_sub(problem: &Problem) -> bool {
    if !matches!(problem.skill, SkillId::Addition | SkillId::Subtraction) {
        return false;
    }
    if let Some(magnitude) = problem.difficulty.magnitude {
        return magnitude.a_digits <= 1 && magnitude.b_digits <= 1;
    }
    match (problem.value("a"), problem.value("b")) {
        (Some(a), Some(b)) => a.abs() < 10.0 && b.abs() < 10.0,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakTrigger {
    SessionLength,
    ErrorBurst,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakAdvice {
    pub suggest: bool,
    pub trigger: Option<BreakTrigger>,
    pub recommended_break_minutes: u32,
}

fn break_trigger(
    session_attempt_count: u32,
    recent_correctness: &[bool],
    policy: &BreakPolicy,
) -> Option<BreakTrigger> {
    if !policy.enabled {
        return None;
    }
    if policy
        .question_threshold
        .is_some_and(|threshold| session_attempt_count >= threshold)
    {
        return Some(BreakTrigger::SessionLength);
    }
    let window = policy.recent_window.max(1);
    if recent_correctness.len() >= window {
        let errors = recent_correctness[recent_correctness.len() - window..]
            .iter()
            .filter(|correct| !**correct)
            .count();
        if errors >= policy.error_threshold {
            return Some(BreakTrigger::ErrorBurst);
        }
    }
    None
}

/// `recent_correctness` is the session's answer outcomes, oldest first.
pub fn should_suggest_break(
    session_attempt_count: u32,
    recent_correctness: &[bool],
    policy: &BreakPolicy,
) -> bool {
    break_trigger(session_attempt_count, recent_correctness, policy).is_some()
}

pub fn advise_break(
    session_attempt_count: u32,
    recent_correctness: &[bool],
    policy: &BreakPolicy,
) -> BreakAdvice {
    let trigger = break_trigger(session_attempt_count, recent_correctness, policy);
    BreakAdvice {
        suggest: trigger.is_some(),
        trigger,
        recommended_break_minutes: policy.recommended_break_minutes,
    }
}
