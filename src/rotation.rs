//! Shuffled rotation through curated items so that every item of a filter is seen once
//! before any repeats.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::LimitsParams;
use crate::profile::LearnerProfile;
use crate::types::CuratedFilter;

pub const CURATED_TAG_PREFIX: &str = "ncm_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationBucket {
    /// Sorted, deduplicated candidate tags the queue was built from.
    pub skill_tags: Vec<String>,
    pub queue: Vec<String>,
    #[serde(default)]
    pub last_skill_tag: Option<String>,
    #[serde(default)]
    pub updated_at: i64,
}

impl RotationBucket {
    fn fresh(skill_tags: Vec<String>) -> Self {
        Self {
            skill_tags,
            ..Self::default()
        }
    }

    /// The stored tag set still describes the current candidates and the queue only holds
    /// known tags.
    fn matches(&self, skill_tags: &[String]) -> bool {
        let mut stored = self.skill_tags.clone();
        stored.sort();
        stored.dedup();
        stored == skill_tags && self.queue.iter().all(|tag| skill_tags.contains(tag))
    }

    fn refill<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut queue = self.skill_tags.clone();
        shuffle(&mut queue, rng);
        if queue.len() > 1 {
            if let Some(last) = self.last_skill_tag.as_deref() {
                if queue[0] == last {
                    if let Some(index) = queue.iter().position(|tag| tag != last) {
                        queue.swap(0, index);
                    }
                }
            }
        }
        self.queue = queue;
    }
}

/// Fisher–Yates.
fn shuffle<T, R: Rng + ?Sized>(values: &mut [T], rng: &mut R) {
    for i in (1..values.len()).rev() {
        let j = rng.gen_range(0..=i);
        values.swap(i, j);
    }
}

fn normalized_tags(candidates: &[String]) -> Vec<String> {
    candidates
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Next curated tag for `filter`. A preferred tag that is among the candidates is served
/// directly and removed from the pending queue. `None` when there are no candidates.
pub fn pick_next<R: Rng + ?Sized>(
    profile: &mut LearnerProfile,
    filter: &CuratedFilter,
    candidates: &[String],
    preferred: Option<&str>,
    rng: &mut R,
    now_ms: i64,
    limits: &LimitsParams,
) -> Option<String> {
    let skill_tags = normalized_tags(candidates);
    if skill_tags.is_empty() {
        return None;
    }

    let signature = filter.signature();
    let mut bucket = match profile.rotation_index.remove(&signature) {
        Some(existing) if existing.matches(&skill_tags) => existing,
        Some(_) => {
            tracing::info!(
                signature = %signature,
                candidates = skill_tags.len(),
                "curated candidate set changed, rotation reset"
            );
            RotationBucket::fresh(skill_tags.clone())
        }
        None => RotationBucket::fresh(skill_tags.clone()),
    };
    bucket.skill_tags = skill_tags;

    let preferred = preferred
        .map(str::trim)
        .filter(|tag| bucket.skill_tags.iter().any(|known| known.as_str() == *tag));

    let next = match preferred {
        Some(tag) => {
            // a new cycle starts with the preferred tag already served
            if bucket.queue.is_empty() {
                bucket.refill(rng);
            }
            bucket.queue.retain(|queued| queued != tag);
            Some(tag.to_string())
        }
        None => {
            if bucket.queue.is_empty() {
                bucket.refill(rng);
            }
            if bucket.queue.is_empty() {
                None
            } else {
                Some(bucket.queue.remove(0))
            }
        }
    };

    if let Some(tag) = next.as_ref() {
        bucket.last_skill_tag = Some(tag.clone());
    }
    bucket.updated_at = now_ms;
    profile.rotation_index.insert(signature, bucket);
    prune(profile, limits.rotation_signatures);
    next
}

fn prune(profile: &mut LearnerProfile, max_signatures: usize) {
    let excess = profile.rotation_index.len().saturating_sub(max_signatures.max(1));
    if excess == 0 {
        return;
    }
    let mut by_age: Vec<(i64, String)> = profile
        .rotation_index
        .iter()
        .map(|(signature, bucket)| (bucket.updated_at, signature.clone()))
        .collect();
    by_age.sort();
    for (_, signature) in by_age.into_iter().take(excess) {
        profile.rotation_index.remove(&signature);
    }
}

/// Distinct curated tags among the last `2 * count` attempts, keeping only the last `count`
/// of them in order of appearance.
pub fn recent_curated_tags(profile: &LearnerProfile, count: usize) -> Vec<String> {
    let window = count.max(1) * 2;
    let skip = profile.history.recent.len().saturating_sub(window);
    let tags: Vec<&str> = profile
        .history
        .recent
        .iter()
        .skip(skip)
        .map(|record| record.skill_tag.trim())
        .filter(|tag| tag.starts_with(CURATED_TAG_PREFIX))
        .collect();

    let tail = &tags[tags.len().saturating_sub(count)..];
    let mut distinct: Vec<String> = Vec::with_capacity(tail.len());
    for tag in tail {
        if !distinct.iter().any(|seen| seen == tag) {
            distinct.push((*tag).to_string());
        }
    }
    distinct
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::AttemptRecord;
    use crate::types::SkillId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn filter(code: &str) -> CuratedFilter {
        CuratedFilter {
            codes: vec![code.to_string()],
            ability_tags: Vec::new(),
        }
    }

    fn tags(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("ncm_as1_item_{i}")).collect()
    }

    #[test]
    fn test_full_cycle_before_repeat() {
        let mut profile = LearnerProfile::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let limits = LimitsParams::default();
        let candidates = tags(5);
        let picked: BTreeSet<String> = (0..5)
            .filter_map(|i| pick_next(&mut profile, &filter("AS1"), &candidates, None, &mut rng, i, &limits))
            .collect();
        assert_eq!(picked.len(), 5);
    }

    #[test]
    fn test_no_immediate_repeat_across_reshuffles() {
        let mut profile = LearnerProfile::new();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let limits = LimitsParams::default();
        let candidates = tags(3);
        let mut previous: Option<String> = None;
        for i in 0..60 {
            let next = pick_next(&mut profile, &filter("AS1"), &candidates, None, &mut rng, i, &limits);
            assert!(next.is_some());
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn test_candidate_change_resets_bucket() {
        let mut profile = LearnerProfile::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let limits = LimitsParams::default();
        pick_next(&mut profile, &filter("AS1"), &tags(4), None, &mut rng, 1, &limits);
        let widened = tags(6);
        pick_next(&mut profile, &filter("AS1"), &widened, None, &mut rng, 2, &limits);
        let bucket = &profile.rotation_index[&filter("AS1").signature()];
        assert_eq!(bucket.skill_tags.len(), 6);
        assert_eq!(bucket.queue.len(), 5);
        assert_eq!(bucket.updated_at, 2);
    }

    #[test]
    fn test_preferred_tag_is_served() {
        let mut profile = LearnerProfile::new();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let limits = LimitsParams::default();
        let picked = pick_next(
            &mut profile,
            &filter("SA2"),
            &tags(5),
            Some("ncm_as1_item_4"),
            &mut rng,
            1,
            &limits,
        );
        assert_eq!(picked.as_deref(), Some("ncm_as1_item_4"));
        let bucket = &profile.rotation_index[&filter("SA2").signature()];
        assert_eq!(bucket.queue.len(), 4);
        assert!(!bucket.queue.iter().any(|tag| tag == "ncm_as1_item_4"));
        let unknown = pick_next(&mut profile, &filter("SA2"), &tags(5), Some("nope"), &mut rng, 2, &limits);
        assert_ne!(unknown.as_deref(), Some("nope"));
    }

    #[test]
    fn test_prunes_oldest_signatures() {
        let mut profile = LearnerProfile::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let limits = LimitsParams {
            rotation_signatures: 2,
            ..LimitsParams::default()
        };
        for (i, code) in ["AS1", "AS2", "AS3"].iter().enumerate() {
            pick_next(&mut profile, &filter(code), &tags(2), None, &mut rng, i as i64, &limits);
        }
        assert_eq!(profile.rotation_index.len(), 2);
        assert!(!profile.rotation_index.contains_key(&filter("AS1").signature()));
    }

    #[test]
    fn test_empty_candidates_yield_none() {
        let mut profile = LearnerProfile::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let picked = pick_next(
            &mut profile,
            &filter("AS1"),
            &[" ".to_string()],
            None,
            &mut rng,
            0,
            &LimitsParams::default(),
        );
        assert!(picked.is_none());
        assert!(profile.rotation_index.is_empty());
    }

    #[test]
    fn test_recent_curated_tags_window() {
        let mut profile = LearnerProfile::new();
        let limits = LimitsParams::default();
        let sequence = ["ncm_a", "add_basic", "ncm_b", "ncm_a", "ncm_c", "sub_basic"];
        for (i, tag) in sequence.iter().enumerate() {
            profile.push_attempt(AttemptRecord::new(tag, SkillId::Addition, 1, true, i as i64), &limits);
        }
        assert_eq!(recent_curated_tags(&profile, 2), vec!["ncm_a", "ncm_c"]);
        assert_eq!(recent_curated_tags(&profile, 6), vec!["ncm_a", "ncm_b", "ncm_c"]);
    }
}
