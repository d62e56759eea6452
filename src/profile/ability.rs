use crate::profile::LearnerProfile;
use crate::types::{clamp_ability, SkillId};

/// Entry ability of a skill for a learner whose global estimate is `global`.
pub fn seed_ability(skill: SkillId, global: f64) -> f64 {
    let global = clamp_ability(global);
    let seeded = match skill {
        SkillId::Addition => global,
        SkillId::Subtraction => (global - 2.0).max(1.0),
        SkillId::Multiplication => (global - 3.0).max(1.0),
        // division problems start out harder, so the floor sits above level 1
        SkillId::Division => (global - 4.0).max(3.0),
        SkillId::AlgebraEvaluate
        | SkillId::AlgebraSimplify
        | SkillId::ArithmeticExpressions
        | SkillId::Fractions
        | SkillId::Percentage => 1.0,
    };
    clamp_ability(seeded)
}

/// Per-skill ability, seeding the whole map on first access.
pub fn ability(profile: &mut LearnerProfile, skill: SkillId) -> f64 {
    profile.ensure_adaptive_state();
    peek_ability(profile, skill)
}

/// Read without seeding; missing entries report what seeding would produce.
pub fn peek_ability(profile: &LearnerProfile, skill: SkillId) -> f64 {
    profile
        .ability_by_skill
        .as_ref()
        .and_then(|abilities| abilities.get(&skill))
        .copied()
        .filter(|value| value.is_finite())
        .map(clamp_ability)
        .unwrap_or_else(|| seed_ability(skill, profile.current_difficulty))
}

pub fn set_ability(profile: &mut LearnerProfile, skill: SkillId, value: f64) {
    profile.ensure_adaptive_state();
    if let Some(abilities) = profile.ability_by_skill.as_mut() {
        abilities.insert(skill, clamp_ability(value));
    }
}
