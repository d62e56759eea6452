//! Which skill to practise next.

use rand::Rng;

use crate::config::{EngineConfig, SelectionParams};
use crate::profile::stats::{attempt_count, consecutive_errors, success_rate};
use crate::profile::LearnerProfile;
use crate::selection::bucket::weighted_pick;
use crate::types::{ProgressionMode, ResolvedConstraints, SkillId};

const GLOBAL_SUCCESS_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillChoice {
    pub skill: SkillId,
    /// Picked by the weighted chooser rather than dictated by the constraints.
    pub from_chooser: bool,
}

pub fn choose_skill<R: Rng + ?Sized>(
    profile: &LearnerProfile,
    constraints: &ResolvedConstraints,
    config: &EngineConfig,
    rng: &mut R,
) -> SkillChoice {
    if let Some(skill) = constraints.forced_type {
        return SkillChoice {
            skill,
            from_chooser: false,
        };
    }
    if let [skill] = constraints.allowed_types.as_slice() {
        return SkillChoice {
            skill: *skill,
            from_chooser: false,
        };
    }

    let options = unlocked_options(profile, config, constraints.progression_mode);
    let skill = if constraints.allowed_types.is_empty() {
        weighted_pick(&options, config.selection.min_bucket_weight, rng).unwrap_or(SkillId::Addition)
    } else {
        let allowed: Vec<(SkillId, f64)> = options
            .iter()
            .copied()
            .filter(|(skill, _)| constraints.allowed_types.contains(skill))
            .collect();
        match weighted_pick(&allowed, config.selection.min_bucket_weight, rng) {
            Some(skill) => skill,
            None => {
                let index = rng.gen_range(0..constraints.allowed_types.len());
                constraints.allowed_types[index]
            }
        }
    };

    SkillChoice {
        skill,
        from_chooser: true,
    }
}

/// Arithmetic skills unlocked by the global estimate and practice volume, with their raw
/// weights. Struggling learners stay on addition.
pub fn unlocked_options(
    profile: &LearnerProfile,
    config: &EngineConfig,
    mode: ProgressionMode,
) -> Vec<(SkillId, f64)> {
    let attempts = profile.history.len();
    let difficulty = profile.current_difficulty;
    let recent_success = success_rate(profile, None, GLOBAL_SUCCESS_WINDOW);
    let errors = consecutive_errors(profile, None);

    if errors >= 2 || recent_success < 0.65 || attempts < 10 || difficulty < 3.5 {
        return vec![(SkillId::Addition, 1.0)];
    }

    let mut addition = config.mode(mode).addition_base_weight;
    let mut options = Vec::with_capacity(4);

    if difficulty >= 4.0 && attempts >= 12 {
        let mut weight = if difficulty >= 7.0 { 0.3 } else { 0.25 };
        if recent_success >= 0.85 {
            weight += 0.05;
        }
        options.push((SkillId::Subtraction, weight));
        addition -= 0.15;
    }
    if difficulty >= 5.0 && attempts >= 16 {
        let mut weight = if difficulty >= 8.0 { 0.2 } else { 0.15 };
        if recent_success >= 0.85 {
            weight += 0.05;
        }
        options.push((SkillId::Multiplication, weight));
        addition -= 0.1;
    }
    if difficulty >= 7.0 && attempts >= 22 {
        let mut weight = if difficulty >= 10.0 { 0.14 } else { 0.1 };
        if recent_success >= 0.88 {
            weight += 0.04;
        }
        options.push((SkillId::Division, weight));
        addition -= 0.08;
    }

    options.insert(0, (SkillId::Addition, addition));
    options
}

/// Highest level a freshly unlocked skill may be served at, based on how often the learner
/// has practised it. `None` once the ramp is complete.
pub fn unlock_cap(profile: &LearnerProfile, skill: SkillId, params: &SelectionParams) -> Option<i32> {
    if skill == SkillId::Addition {
        return None;
    }
    let attempts = attempt_count(profile, Some(skill));
    params
        .unlock_ramp
        .iter()
        .find(|(below, _)| attempts < *below)
        .map(|(_, cap)| *cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsParams;
    use crate::profile::AttemptRecord;
    use crate::selection::normalize_constraints;
    use crate::types::SelectionConstraints;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn seasoned(difficulty: f64, attempts: usize) -> LearnerProfile {
        let mut profile = LearnerProfile::with_difficulty(difficulty);
        for i in 0..attempts {
            profile.push_attempt(
                AttemptRecord::new("add_basic", SkillId::Addition, 3, true, i as i64),
                &LimitsParams::default(),
            );
        }
        profile
    }

    #[test]
    fn test_low_difficulty_only_addition() {
        let profile = seasoned(3.0, 30);
        let config = EngineConfig::default();
        assert_eq!(
            unlocked_options(&profile, &config, ProgressionMode::Challenge),
            vec![(SkillId::Addition, 1.0)]
        );
    }

    #[test]
    fn test_unlock_thresholds() {
        let config = EngineConfig::default();
        let options = unlocked_options(&seasoned(5.0, 16), &config, ProgressionMode::Challenge);
        let skills: Vec<SkillId> = options.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            skills,
            vec![SkillId::Addition, SkillId::Subtraction, SkillId::Multiplication]
        );

        let options = unlocked_options(&seasoned(7.5, 25), &config, ProgressionMode::Steady);
        assert_eq!(options.len(), 4);
    }

    #[test]
    fn test_forced_and_single_allowed_skip_chooser() {
        let profile = seasoned(8.0, 30);
        let config = EngineConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let forced = normalize_constraints(&SelectionConstraints {
            forced_type: Some("division".into()),
            ..SelectionConstraints::default()
        });
        let choice = choose_skill(&profile, &forced, &config, &mut rng);
        assert_eq!(choice.skill, SkillId::Division);
        assert!(!choice.from_chooser);

        let single = normalize_constraints(&SelectionConstraints::only(
            SkillId::Fractions,
            ProgressionMode::Steady,
        ));
        let choice = choose_skill(&profile, &single, &config, &mut rng);
        assert_eq!(choice.skill, SkillId::Fractions);
        assert!(!choice.from_chooser);
    }

    #[test]
    fn test_allowed_types_restrict_chooser() {
        let profile = seasoned(2.0, 3);
        let config = EngineConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let constraints = normalize_constraints(&SelectionConstraints {
            allowed_types: vec!["fractions".into(), "percentage".into()],
            ..SelectionConstraints::default()
        });
        for _ in 0..20 {
            let choice = choose_skill(&profile, &constraints, &config, &mut rng);
            assert!(matches!(choice.skill, SkillId::Fractions | SkillId::Percentage));
        }
    }

    #[test]
    fn test_unlock_ramp_caps() {
        let params = SelectionParams::default();
        let mut profile = LearnerProfile::with_difficulty(8.0);
        assert_eq!(unlock_cap(&profile, SkillId::Subtraction, &params), Some(1));
        for i in 0..6 {
            profile.push_attempt(
                AttemptRecord::new("sub_basic", SkillId::Subtraction, 1, true, i),
                &LimitsParams::default(),
            );
        }
        assert_eq!(unlock_cap(&profile, SkillId::Subtraction, &params), Some(3));
        assert_eq!(unlock_cap(&profile, SkillId::Addition, &params), None);
    }
}
