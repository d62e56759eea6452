//! Turns a raw answer event into a classified outcome: correctness, error class, answer
//! plausibility and a speed time that is safe to feed into statistics.

use serde::{Deserialize, Serialize};

use crate::config::TimingParams;
use crate::profile::stats::median;
use crate::profile::{AttemptRecord, LearnerProfile};
use crate::types::{ErrorCategory, ExclusionReason, Problem, SkillId};

const ANSWER_EPSILON: f64 = 1e-4;
const SKILL_TAG_BASELINE_WINDOW: usize = 20;
const WIDE_BASELINE_WINDOW: usize = 25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterruptionSignal {
    pub hidden_duration_sec: f64,
    pub blur_count: u32,
}

/// Output of a domain-specific analyzer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAnalysis {
    pub category: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    pub student_answer: f64,
    pub elapsed_sec: f64,
    #[serde(default)]
    pub interruption: Option<InterruptionSignal>,
    #[serde(default)]
    pub error_analysis: Option<ErrorAnalysis>,
    /// Session mixes operations, which makes operation slips likely.
    #[serde(default)]
    pub mixed_session: bool,
}

impl AnswerEvent {
    pub fn new(student_answer: f64, elapsed_sec: f64) -> Self {
        Self {
            student_answer,
            elapsed_sec,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerQuality {
    pub is_reasonable: bool,
    pub abs_error: f64,
    pub relative_error: f64,
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingMetrics {
    pub raw_time_sec: f64,
    pub speed_time_sec: Option<f64>,
    pub excluded_from_speed: bool,
    pub exclusion_reason: Option<ExclusionReason>,
    pub interruption_suspected: bool,
    pub personal_median_sec: Option<f64>,
    pub personal_baseline_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedAnswer {
    pub correct: bool,
    pub error_category: ErrorCategory,
    pub raw_time_sec: f64,
    pub speed_time_sec: Option<f64>,
    pub excluded_from_speed: bool,
    pub exclusion_reason: Option<ExclusionReason>,
    pub interruption_suspected: bool,
    pub personal_median_sec: Option<f64>,
    pub personal_baseline_count: usize,
    pub is_reasonable: bool,
    pub abs_error: f64,
    pub relative_error: f64,
    pub tolerance: f64,
}

pub fn is_answer_correct(student_answer: f64, expected: f64) -> bool {
    student_answer.is_finite()
        && expected.is_finite()
        && (student_answer - expected).abs() < ANSWER_EPSILON
}

fn has_decimal(value: Option<f64>) -> bool {
    value.is_some_and(|v| v.is_finite() && v.fract() != 0.0)
}

/// Whether a wrong answer is still in the right ballpark.
pub fn evaluate_answer_quality(problem: &Problem, student_answer: f64) -> AnswerQuality {
    let expected = problem.result;
    if !expected.is_finite() || !student_answer.is_finite() {
        return AnswerQuality {
            is_reasonable: false,
            abs_error: f64::INFINITY,
            relative_error: f64::INFINITY,
            tolerance: 0.0,
        };
    }

    let product_like = matches!(problem.skill, SkillId::Multiplication | SkillId::Division);
    let uses_decimals = has_decimal(Some(expected))
        || has_decimal(problem.value("a"))
        || has_decimal(problem.value("b"));

    let base = if product_like { 0.16 } else { 0.12 };
    let level_bonus = (f64::from(problem.level() - 5).max(0.0) * 0.01).min(0.08);
    let decimal_bonus = if uses_decimals { 0.04 } else { 0.0 };
    let relative_tolerance = base + level_bonus + decimal_bonus;

    let absolute_floor: f64 = if uses_decimals {
        0.5
    } else if product_like {
        5.0
    } else {
        2.0
    };

    let abs_error = (student_answer - expected).abs();
    let relative_error = abs_error / expected.abs().max(1.0);
    let tolerance = absolute_floor.max(expected.abs() * relative_tolerance);

    AnswerQuality {
        is_reasonable: abs_error <= tolerance,
        abs_error,
        relative_error,
        tolerance,
    }
}

pub fn classify_error_category(
    problem: &Problem,
    student_answer: f64,
    correct: bool,
    mixed_session: bool,
    analysis: Option<&ErrorAnalysis>,
) -> ErrorCategory {
    if correct {
        return ErrorCategory::None;
    }

    if let Some(category) = analysis.and_then(|a| ErrorCategory::parse_error_class(&a.category)) {
        return category;
    }

    if !mixed_session {
        return ErrorCategory::Knowledge;
    }

    let (Some(a), Some(b)) = (problem.value("a"), problem.value("b")) else {
        return ErrorCategory::Knowledge;
    };

    // added instead of subtracted
    if problem.skill == SkillId::Subtraction && is_answer_correct(student_answer, a + b) {
        return ErrorCategory::Inattention;
    }

    ErrorCategory::Knowledge
}

fn personal_baseline_times(profile: &LearnerProfile, problem: &Problem, params: &TimingParams) -> Vec<f64> {
    let valid: Vec<&AttemptRecord> = profile
        .history
        .recent
        .iter()
        .filter(|record| record.usable_time().is_some())
        .collect();
    if valid.is_empty() {
        return Vec::new();
    }

    let skill_tag = problem.skill_tag();
    let level = problem.level();
    let tail = |records: Vec<&AttemptRecord>, window: usize| -> Vec<f64> {
        let skip = records.len().saturating_sub(window);
        records
            .into_iter()
            .skip(skip)
            .filter_map(AttemptRecord::usable_time)
            .collect()
    };

    let by_tag: Vec<&AttemptRecord> = valid
        .iter()
        .copied()
        .filter(|r| r.skill_tag == skill_tag && r.resolved_level() == level)
        .collect();
    if by_tag.len() >= params.skill_tag_baseline_min {
        return tail(by_tag, SKILL_TAG_BASELINE_WINDOW);
    }

    let by_skill_level: Vec<&AttemptRecord> = valid
        .iter()
        .copied()
        .filter(|r| r.resolved_skill() == problem.skill && r.resolved_level() == level)
        .collect();
    if !by_skill_level.is_empty() {
        return tail(by_skill_level, WIDE_BASELINE_WINDOW);
    }

    tail(valid, WIDE_BASELINE_WINDOW)
}

pub fn derive_timing(
    profile: &LearnerProfile,
    problem: &Problem,
    elapsed_sec: f64,
    interruption: Option<&InterruptionSignal>,
    params: &TimingParams,
) -> TimingMetrics {
    let raw_time_sec = if elapsed_sec.is_finite() {
        elapsed_sec.max(0.0)
    } else {
        0.0
    };
    let hidden = interruption
        .map(|i| i.hidden_duration_sec)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
        .max(0.0);
    let blur_count = interruption.map(|i| i.blur_count).unwrap_or(0);
    let interruption_suspected = hidden >= params.interruption_hidden_sec
        || (blur_count > 0 && raw_time_sec >= params.interruption_blur_min_sec);

    let baseline = personal_baseline_times(profile, problem, params);
    let personal_median_sec = median(&baseline);
    let personal_baseline_count = baseline.len();

    let exclusion_reason = if raw_time_sec <= 0.0 {
        Some(ExclusionReason::InvalidTime)
    } else if raw_time_sec > params.hard_cap_sec {
        Some(ExclusionReason::HardCap)
    } else if interruption_suspected {
        Some(ExclusionReason::Interruption)
    } else if personal_baseline_count >= params.min_baseline_samples
        && personal_median_sec.is_some_and(|median| {
            raw_time_sec > params.outlier_floor_sec.max(median * params.outlier_factor)
        })
    {
        Some(ExclusionReason::PersonalOutlier)
    } else {
        None
    };

    let excluded_from_speed = exclusion_reason.is_some();
    TimingMetrics {
        raw_time_sec,
        speed_time_sec: (!excluded_from_speed).then_some(raw_time_sec),
        excluded_from_speed,
        exclusion_reason,
        interruption_suspected,
        personal_median_sec,
        personal_baseline_count,
    }
}

/// Fast enough to earn a speed bonus: within 75% of the estimated time, or 12 s when the
/// item carries no estimate.
pub fn is_fast_correct(elapsed_sec: f64, estimated_time: Option<f64>, params: &TimingParams) -> bool {
    if !elapsed_sec.is_finite() || elapsed_sec <= 0.0 {
        return false;
    }
    match estimated_time.filter(|t| t.is_finite() && *t > 0.0) {
        Some(estimated) => elapsed_sec <= estimated * params.fast_ratio,
        None => elapsed_sec <= params.fast_fallback_sec,
    }
}

pub fn classify_answer(
    profile: &LearnerProfile,
    problem: &Problem,
    event: &AnswerEvent,
    params: &TimingParams,
) -> ClassifiedAnswer {
    let correct = is_answer_correct(event.student_answer, problem.result);
    let quality = evaluate_answer_quality(problem, event.student_answer);
    let error_category = classify_error_category(
        problem,
        event.student_answer,
        correct,
        event.mixed_session,
        event.error_analysis.as_ref(),
    );
    let timing = derive_timing(
        profile,
        problem,
        event.elapsed_sec,
        event.interruption.as_ref(),
        params,
    );

    if let Some(reason) = timing.exclusion_reason {
        tracing::debug!(
            skill_tag = problem.skill_tag(),
            raw_time_sec = timing.raw_time_sec,
            reason = reason.as_str(),
            "answer time excluded from speed statistics"
        );
    }

    ClassifiedAnswer {
        correct,
        error_category,
        raw_time_sec: timing.raw_time_sec,
        speed_time_sec: timing.speed_time_sec,
        excluded_from_speed: timing.excluded_from_speed,
        exclusion_reason: timing.exclusion_reason,
        interruption_suspected: timing.interruption_suspected,
        personal_median_sec: timing.personal_median_sec,
        personal_baseline_count: timing.personal_baseline_count,
        is_reasonable: quality.is_reasonable,
        abs_error: quality.abs_error,
        relative_error: quality.relative_error,
        tolerance: quality.tolerance,
    }
}
