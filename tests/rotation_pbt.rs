//! Property-based tests for curated item rotation
//!
//! Invariants:
//! - Coverage: every window of `n` picks aligned to a refill contains all `n` tags
//! - No immediate repeats once more than one tag is available
//! - A preferred tag served on a fresh rotation counts toward that cycle
//! - The pending queue only ever holds tags from the stored candidate set
//! - A changed candidate set resets the rotation instead of serving stale tags

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

use practice_engine::config::LimitsParams;
use practice_engine::rotation::pick_next;
use practice_engine::types::CuratedFilter;
use practice_engine::LearnerProfile;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_tags() -> impl Strategy<Value = Vec<String>> {
    (1usize..=12).prop_map(|n| (1..=n).map(|i| format!("ncm_as1_item_{i}")).collect())
}

fn arb_filter() -> impl Strategy<Value = CuratedFilter> {
    prop::sample::select(vec!["AS1", "SA2", "NP3"]).prop_map(|code| CuratedFilter {
        codes: vec![code.to_string()],
        ability_tags: Vec::new(),
    })
}

fn draw(
    profile: &mut LearnerProfile,
    filter: &CuratedFilter,
    tags: &[String],
    rng: &mut ChaCha8Rng,
    count: usize,
) -> Vec<String> {
    let limits = LimitsParams::default();
    (0..count)
        .filter_map(|i| pick_next(profile, filter, tags, None, rng, i as i64, &limits))
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_each_cycle_covers_all_tags(tags in arb_tags(), filter in arb_filter(), seed in any::<u64>()) {
        let mut profile = LearnerProfile::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = tags.len();
        let picks = draw(&mut profile, &filter, &tags, &mut rng, n * 3);
        prop_assert_eq!(picks.len(), n * 3);
        for cycle in picks.chunks(n) {
            let distinct: HashSet<&String> = cycle.iter().collect();
            prop_assert_eq!(distinct.len(), n);
        }
    }

    #[test]
    fn prop_no_immediate_repeats(tags in arb_tags(), filter in arb_filter(), seed in any::<u64>()) {
        prop_assume!(tags.len() > 1);
        let mut profile = LearnerProfile::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let picks = draw(&mut profile, &filter, &tags, &mut rng, tags.len() * 4);
        for pair in picks.windows(2) {
            prop_assert_ne!(&pair[0], &pair[1]);
        }
    }

    #[test]
    fn prop_preferred_opening_pick_counts_toward_cycle(
        tags in arb_tags(),
        filter in arb_filter(),
        seed in any::<u64>(),
        index in any::<prop::sample::Index>(),
    ) {
        let mut profile = LearnerProfile::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let limits = LimitsParams::default();
        let preferred = index.get(&tags).clone();

        let first = pick_next(&mut profile, &filter, &tags, Some(preferred.as_str()), &mut rng, 0, &limits);
        prop_assert_eq!(first.as_ref(), Some(&preferred));

        let mut cycle = vec![preferred];
        cycle.extend(draw(&mut profile, &filter, &tags, &mut rng, tags.len() - 1));
        let distinct: HashSet<&String> = cycle.iter().collect();
        prop_assert_eq!(distinct.len(), tags.len());
    }

    #[test]
    fn prop_queue_is_subset_of_candidates(
        tags in arb_tags(),
        filter in arb_filter(),
        seed in any::<u64>(),
        steps in 1usize..30,
    ) {
        let mut profile = LearnerProfile::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        draw(&mut profile, &filter, &tags, &mut rng, steps);
        let bucket = profile.rotation_index.get(&filter.signature()).unwrap();
        prop_assert!(bucket.queue.len() < tags.len());
        for queued in &bucket.queue {
            prop_assert!(bucket.skill_tags.contains(queued));
        }
    }

    #[test]
    fn prop_shrunk_candidate_set_never_serves_removed_tags(
        tags in arb_tags(),
        filter in arb_filter(),
        seed in any::<u64>(),
        keep in 1usize..=12,
    ) {
        let keep = keep.min(tags.len());
        let mut profile = LearnerProfile::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        draw(&mut profile, &filter, &tags, &mut rng, 1);

        let remaining = &tags[..keep];
        let picks = draw(&mut profile, &filter, remaining, &mut rng, keep * 2);
        for pick in &picks {
            prop_assert!(remaining.contains(pick));
        }
    }
}
