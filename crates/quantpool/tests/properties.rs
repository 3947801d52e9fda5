//! Property-based tests for packing, ordering and category codes.

use std::sync::Arc;

use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

use quantpool::data::{group_ranges, DocumentOrder, PackedBins, PerfectHashIndexer, PoolBuilder, PoolMetaInfo};
use quantpool::PoolBuilderConfig;

// =============================================================================
// Strategies
// =============================================================================

/// A bin count together with indices drawn from `[0, bin_count)`.
fn arb_bins() -> impl Strategy<Value = (u32, Vec<u32>)> {
    (1u32..=70_000).prop_flat_map(|bin_count| (Just(bin_count), prop_vec(0..bin_count, 0..300)))
}

/// Group ids made of contiguous runs, one distinct id per run.
fn arb_groups() -> impl Strategy<Value = Vec<u64>> {
    prop_vec(1usize..6, 1..20).prop_map(|sizes| {
        sizes
            .iter()
            .enumerate()
            .flat_map(|(group, &size)| std::iter::repeat(group as u64 * 10).take(size))
            .collect()
    })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn pack_round_trips((bin_count, indices) in arb_bins()) {
        let packed = PackedBins::pack(&indices, bin_count).unwrap();
        prop_assert_eq!(packed.len(), indices.len());
        prop_assert_eq!(packed.unpack(), indices);
    }

    #[test]
    fn shuffle_is_a_permutation(n in 0usize..500, seed in any::<u64>()) {
        let order = DocumentOrder::shuffled(n, seed);
        prop_assert_eq!(order.len(), n);
        prop_assert!(order.is_permutation());
    }

    #[test]
    fn timestamp_order_is_sorted_and_stable(timestamps in prop_vec(0u64..5, 0..200)) {
        let order = DocumentOrder::by_timestamp(&timestamps);
        prop_assert!(order.is_permutation());
        let sorted = order.gather(&timestamps);
        prop_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
        // Equal timestamps keep ingestion order.
        for pair in order.as_slice().windows(2) {
            if timestamps[pair[0] as usize] == timestamps[pair[1] as usize] {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }

    #[test]
    fn group_shuffle_keeps_groups_contiguous(groups in arb_groups(), seed in any::<u64>()) {
        let order = DocumentOrder::group_shuffled(&groups, seed);
        prop_assert!(order.is_permutation());

        let shuffled = order.gather(&groups);
        prop_assert_eq!(group_ranges(&shuffled).len(), group_ranges(&groups).len());
        for range in group_ranges(&shuffled) {
            let rows = &order.as_slice()[range];
            prop_assert!(rows.windows(2).all(|w| w[0] + 1 == w[1]));
        }
    }

    #[test]
    fn category_codes_never_change(first in prop_vec(0u32..50, 1..100), second in prop_vec(0u32..50, 1..100)) {
        let indexer = PerfectHashIndexer::new();
        let first_codes = indexer.update_and_binarize(0, &first);
        let known = indexer.unique_value_count(0);

        let second_codes = indexer.update_and_binarize(0, &second);
        for (key, code) in first.iter().zip(&first_codes) {
            prop_assert_eq!(indexer.code_of(0, *key), Some(*code));
        }
        // New keys are numbered densely from the previous distinct count, in
        // order of first appearance; repeats reuse their code.
        let mut fresh: Vec<u32> = Vec::new();
        for (key, code) in second.iter().zip(&second_codes) {
            if first.contains(key) {
                prop_assert!(*code < known);
                continue;
            }
            let rank = match fresh.iter().position(|k| k == key) {
                Some(rank) => rank,
                None => {
                    fresh.push(*key);
                    fresh.len() - 1
                }
            };
            prop_assert_eq!(*code, known + rank as u32);
        }
        prop_assert_eq!(indexer.unique_value_count(0), known + fresh.len() as u32);
    }

    #[test]
    fn finish_orders_by_timestamp_regardless_of_shuffle(
        timestamps in prop_vec(0u64..4, 2..50),
        seed in any::<u64>(),
    ) {
        let build = |shuffle: bool| {
            let config = PoolBuilderConfig::builder().shuffle(shuffle).seed(seed).build();
            let mut b = PoolBuilder::new(config, Arc::default(), Arc::default());
            b.start(PoolMetaInfo::new(0), timestamps.len(), &[]).unwrap();
            b.start_next_block(timestamps.len()).unwrap();
            for (row, &timestamp) in timestamps.iter().enumerate() {
                b.write_timestamp(row, timestamp).unwrap();
                b.write_target(row, (row % 2) as f32).unwrap();
            }
            b.finish().unwrap()
        };

        let plain = build(false);
        let shuffled = build(true);
        prop_assert!(plain.order().is_permutation());
        prop_assert!(shuffled.order().is_permutation());
        if timestamps.iter().any(|&t| t != 0) {
            prop_assert_eq!(plain.order(), shuffled.order());
            prop_assert!(plain.timestamps().windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
