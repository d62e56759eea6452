use rand::Rng;

use crate::config::{ModeParams, SelectionParams};
use crate::types::DifficultyBucket;

/// Draws one item proportionally to its weight. Weights are floored at `min_weight` and
/// normalized first. `None` only for an empty slice.
pub fn weighted_pick<T: Copy, R: Rng + ?Sized>(
    items: &[(T, f64)],
    min_weight: f64,
    rng: &mut R,
) -> Option<T> {
    let first = items.first()?.0;
    let floored: Vec<(T, f64)> = items
        .iter()
        .map(|(item, weight)| {
            let weight = if weight.is_finite() { *weight } else { 0.0 };
            (*item, weight.max(min_weight))
        })
        .collect();
    let total: f64 = floored.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return Some(first);
    }

    let roll: f64 = rng.gen();
    let mut acc = 0.0;
    for (item, weight) in &floored {
        acc += weight / total;
        if roll <= acc {
            return Some(*item);
        }
    }
    Some(first)
}

/// Mode weights reshaped by how the learner is doing on the skill.
pub fn adjusted_weights(
    mode: &ModeParams,
    recent_success: f64,
    consecutive_errors: usize,
    params: &SelectionParams,
) -> Vec<(DifficultyBucket, f64)> {
    let struggling = consecutive_errors >= 2 || recent_success < params.struggle_success;
    let thriving = !struggling && recent_success > params.thriving_success;

    DifficultyBucket::ALL
        .iter()
        .map(|bucket| {
            let base = mode.buckets.weight(*bucket);
            let factor = match (bucket, struggling, thriving) {
                (DifficultyBucket::VeryEasy, true, _) => 1.7,
                (DifficultyBucket::Easy, true, _) => 1.5,
                (DifficultyBucket::Hard, true, _) => 0.65,
                (DifficultyBucket::Challenge, true, _) => 0.4,
                (DifficultyBucket::Hard, _, true) => 1.35,
                (DifficultyBucket::Challenge, _, true) => 1.45,
                (DifficultyBucket::VeryEasy, _, true) => 0.8,
                _ => 1.0,
            };
            (*bucket, base * factor)
        })
        .collect()
}

pub fn select_bucket<R: Rng + ?Sized>(
    mode: &ModeParams,
    recent_success: f64,
    consecutive_errors: usize,
    params: &SelectionParams,
    rng: &mut R,
) -> DifficultyBucket {
    let weights = adjusted_weights(mode, recent_success, consecutive_errors, params);
    weighted_pick(&weights, params.min_bucket_weight, rng).unwrap_or(DifficultyBucket::Core)
}
