// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Property tests: the warp derivations and filter backends hold their
//! invariants on randomly shaped corpora, not just the fixture.

use std::collections::BTreeSet;

use proptest::prelude::*;

use fabric::warp::compute::{self, Shape};

/// A random corpus skeleton: `slot_count` slots plus containers, each an
/// ascending duplicate-free slot subset.
fn skeleton_strategy() -> impl Strategy<Value = (u32, Vec<Vec<u32>>)> {
    (2u32..8).prop_flat_map(|slot_count| {
        let container = proptest::collection::btree_set(1..=slot_count, 1..=slot_count as usize)
            .prop_map(|set| set.into_iter().collect::<Vec<u32>>());
        proptest::collection::vec(container, 1..5)
            .prop_map(move |containers| (slot_count, containers))
    })
}

struct Skeleton {
    otype: Vec<u16>,
    oslots: Vec<Vec<u32>>,
    type_levels: Vec<u32>,
    slot_count: u32,
}

impl Skeleton {
    fn new(slot_count: u32, oslots: Vec<Vec<u32>>) -> Skeleton {
        let mut otype = vec![1u16; slot_count as usize];
        otype.extend(std::iter::repeat(0u16).take(oslots.len()));
        Skeleton {
            otype,
            oslots,
            type_levels: vec![0, 1],
            slot_count,
        }
    }

    fn shape(&self) -> Shape<'_> {
        Shape {
            node_count: self.otype.len() as u32,
            slot_count: self.slot_count,
            otype: &self.otype,
            oslots: &self.oslots,
            type_levels: &self.type_levels,
        }
    }
}

fn slots_of(skel: &Skeleton, node: u32) -> Vec<u32> {
    if node <= skel.slot_count {
        vec![node]
    } else {
        skel.oslots[(node - skel.slot_count - 1) as usize].clone()
    }
}

fn is_subset(a: &[u32], b: &[u32]) -> bool {
    let b: BTreeSet<u32> = b.iter().copied().collect();
    a.iter().all(|x| b.contains(x))
}

proptest! {
    #[test]
    fn rank_is_the_inverse_permutation((slot_count, containers) in skeleton_strategy()) {
        let skel = Skeleton::new(slot_count, containers);
        let shape = skel.shape();
        let (first, _) = compute::boundary(&shape);
        let order = compute::canonical_order(&shape, &first);
        let rank = compute::rank_from_order(&order);

        // rank is a permutation of [1..N] and order is its inverse.
        let mut sorted = rank.clone();
        sorted.sort_unstable();
        let expected: Vec<u32> = (1..=shape.node_count).collect();
        prop_assert_eq!(sorted, expected);
        for (i, &node) in order.iter().enumerate() {
            prop_assert_eq!(rank[(node - 1) as usize] as usize, i + 1);
        }
    }

    #[test]
    fn boundary_is_min_and_max((slot_count, containers) in skeleton_strategy()) {
        let skel = Skeleton::new(slot_count, containers);
        let shape = skel.shape();
        let (first, last) = compute::boundary(&shape);
        for node in 1..=shape.node_count {
            let slots = slots_of(&skel, node);
            prop_assert_eq!(first[(node - 1) as usize], *slots.first().unwrap());
            prop_assert_eq!(last[(node - 1) as usize], *slots.last().unwrap());
        }
    }

    #[test]
    fn lev_up_matches_brute_force((slot_count, containers) in skeleton_strategy()) {
        let skel = Skeleton::new(slot_count, containers);
        let shape = skel.shape();
        let (first, last) = compute::boundary(&shape);
        let order = compute::canonical_order(&shape, &first);
        let rank = compute::rank_from_order(&order);
        let up = compute::lev_up(&shape, &first, &last, &rank);

        for node in 1..=shape.node_count {
            let mine = slots_of(&skel, node);
            let mut expected: Vec<u32> = (skel.slot_count + 1..=shape.node_count)
                .filter(|&m| m != node && is_subset(&mine, &slots_of(&skel, m)))
                .collect();
            // Decreasing span, ties by ascending rank.
            expected.sort_by_key(|&m| {
                (
                    std::cmp::Reverse(slots_of(&skel, m).len()),
                    rank[(m - 1) as usize],
                )
            });
            prop_assert_eq!(&up[(node - 1) as usize], &expected, "levUp({})", node);
        }
    }

    #[test]
    fn lev_down_is_the_inverse((slot_count, containers) in skeleton_strategy()) {
        let skel = Skeleton::new(slot_count, containers);
        let shape = skel.shape();
        let (first, last) = compute::boundary(&shape);
        let order = compute::canonical_order(&shape, &first);
        let rank = compute::rank_from_order(&order);
        let up = compute::lev_up(&shape, &first, &last, &rank);
        let down = compute::lev_down(&up, &rank);

        // n in down(m) iff m in up(n); rows ascend by rank.
        for m in 1..=shape.node_count {
            let row = &down[(m - 1) as usize];
            for pair in row.windows(2) {
                prop_assert!(rank[(pair[0] - 1) as usize] < rank[(pair[1] - 1) as usize]);
            }
            for &n in row {
                prop_assert!(up[(n - 1) as usize].contains(&m));
            }
        }
        for n in 1..=shape.node_count {
            for &m in &up[(n - 1) as usize] {
                prop_assert!(down[(m - 1) as usize].contains(&n));
            }
        }

        // Slots embed nothing.
        for s in 1..=skel.slot_count {
            prop_assert!(down[(s - 1) as usize].is_empty());
        }
    }

    #[test]
    fn canonical_order_keys_are_sorted((slot_count, containers) in skeleton_strategy()) {
        let skel = Skeleton::new(slot_count, containers);
        let shape = skel.shape();
        let (first, _) = compute::boundary(&shape);
        let order = compute::canonical_order(&shape, &first);

        let key = |n: u32| {
            (
                first[(n - 1) as usize],
                std::cmp::Reverse(slots_of(&skel, n).len()),
                skel.type_levels[skel.otype[(n - 1) as usize] as usize],
                n,
            )
        };
        for pair in order.windows(2) {
            prop_assert!(key(pair[0]) < key(pair[1]));
        }
    }
}

// ============================================================================
// FILTER EQUIVALENCE (invariant: bulk == scalar, as sets)
// ============================================================================

proptest! {
    #[test]
    fn bulk_filters_equal_scalar_semantics(
        cells in proptest::collection::vec(
            prop_oneof![Just(i32::MIN), -3i32..4],
            1..24,
        ),
        value in -3i32..4,
    ) {
        use fabric::store::bytes::write_i32_array;
        use fabric::IntFeature;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("f.bin");
        write_i32_array(&bin, &cells).unwrap();
        let feature = IntFeature::open("f", &bin).unwrap();

        let nodes: Vec<u32> = (0..=cells.len() as u32 + 2).collect();
        let scalar = |pred: &dyn Fn(Option<i32>) -> bool| -> Vec<u32> {
            nodes.iter().copied().filter(|&n| pred(feature.value(n))).collect()
        };

        prop_assert_eq!(
            feature.filter_eq(&nodes, value),
            scalar(&|v| v == Some(value))
        );
        prop_assert_eq!(
            feature.filter_ne(&nodes, value),
            scalar(&|v| v.is_some() && v != Some(value))
        );
        prop_assert_eq!(feature.filter_present(&nodes), scalar(&|v| v.is_some()));
        prop_assert_eq!(feature.filter_absent(&nodes), scalar(&|v| v.is_none()));
    }
}
