// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Compile-time derivation of the warps.
//!
//! Given `otype` and `oslots`, everything else is arithmetic: slot
//! boundaries, the canonical order and its inverse, per-type ranges, and
//! the two embedding relations. This runs once per corpus version; the
//! results are what make every later query cheap.
//!
//! # Embedding derivation
//!
//! `levUp(n)` is found by interval containment on `(first_slot, last_slot)`
//! with a prefix-maximum prune, then confirmed against the full slot sets
//! whenever either side has gaps. A container covering `[first, last]`
//! contiguously embeds everything inside that interval, so confirmation is
//! only paid for the non-contiguous minority.
//!
//! Ordering invariants produced here:
//! - `levUp(n)`: decreasing span, ties by ascending rank.
//! - `levDown(m)`: ascending rank.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// In-memory shape of a corpus during compilation.
///
/// `otype[i]` is the type of node `i + 1`; `oslots[j]` is the ascending
/// slot list of node `slot_count + j + 1`; `type_levels[t]` is the level
/// order of type `t` (lower = more embedding).
pub struct Shape<'a> {
    pub node_count: u32,
    pub slot_count: u32,
    pub otype: &'a [u16],
    pub oslots: &'a [Vec<u32>],
    pub type_levels: &'a [u32],
}

impl Shape<'_> {
    #[inline]
    fn is_slot(&self, node: u32) -> bool {
        node <= self.slot_count
    }

    /// Number of slots covered by a node.
    #[inline]
    pub fn span(&self, node: u32) -> u32 {
        if self.is_slot(node) {
            1
        } else {
            self.oslots[(node - self.slot_count - 1) as usize].len() as u32
        }
    }

    /// The sorted slot list of a node. Slots own themselves.
    pub fn slots(&self, node: u32) -> std::borrow::Cow<'_, [u32]> {
        if self.is_slot(node) {
            std::borrow::Cow::Owned(vec![node])
        } else {
            std::borrow::Cow::Borrowed(&self.oslots[(node - self.slot_count - 1) as usize])
        }
    }

    #[inline]
    fn level_of_node(&self, node: u32) -> u32 {
        self.type_levels[self.otype[(node - 1) as usize] as usize]
    }
}

// ============================================================================
// BOUNDARY
// ============================================================================

/// `(first_slot, last_slot)` per node; for slots both equal the node.
pub fn boundary(shape: &Shape) -> (Vec<u32>, Vec<u32>) {
    let n = shape.node_count as usize;
    let mut first = vec![0u32; n];
    let mut last = vec![0u32; n];
    for node in 1..=shape.node_count {
        if shape.is_slot(node) {
            first[(node - 1) as usize] = node;
            last[(node - 1) as usize] = node;
        } else {
            let slots = &shape.oslots[(node - shape.slot_count - 1) as usize];
            first[(node - 1) as usize] = slots[0];
            last[(node - 1) as usize] = *slots.last().unwrap();
        }
    }
    (first, last)
}

// ============================================================================
// CANONICAL ORDER
// ============================================================================

/// Canonical order: stable sort of `[1..N]` by
/// `(first_slot, -span, type level, node)`.
///
/// Outer containers precede their contents; same-start nodes go largest
/// span first; same-span nodes follow the type hierarchy.
pub fn canonical_order(shape: &Shape, first: &[u32]) -> Vec<u32> {
    let mut order: Vec<u32> = (1..=shape.node_count).collect();
    order.sort_by_key(|&n| {
        (
            first[(n - 1) as usize],
            std::cmp::Reverse(shape.span(n)),
            shape.level_of_node(n),
            n,
        )
    });
    order
}

/// Inverse permutation: `rank[n - 1]` is the 1-based position of `n`.
pub fn rank_from_order(order: &[u32]) -> Vec<u32> {
    let mut rank = vec![0u32; order.len()];
    for (pos, &node) in order.iter().enumerate() {
        rank[(node - 1) as usize] = pos as u32 + 1;
    }
    rank
}

// ============================================================================
// LEVELS
// ============================================================================

/// `(min_node, max_node, count)` per type.
///
/// Node numbering must put every type in one contiguous block (the
/// numbering the canonical importer produces); a scattered type is
/// reported so the compiler can refuse the corpus.
pub fn levels(shape: &Shape, type_count: usize) -> Result<Vec<(u32, u32, u32)>, String> {
    let mut ranges: Vec<Option<(u32, u32, u32)>> = vec![None; type_count];
    for node in 1..=shape.node_count {
        let t = shape.otype[(node - 1) as usize] as usize;
        if t >= type_count {
            return Err(format!("node {} has type id {} out of range", node, t));
        }
        match &mut ranges[t] {
            None => ranges[t] = Some((node, node, 1)),
            Some((_, max, count)) => {
                if node != *max + 1 {
                    return Err(format!(
                        "type {} is not contiguous: node {} follows block ending at {}",
                        t, node, max
                    ));
                }
                *max = node;
                *count += 1;
            }
        }
    }
    ranges
        .into_iter()
        .enumerate()
        .map(|(t, r)| r.ok_or_else(|| format!("type {} has no nodes", t)))
        .collect()
}

// ============================================================================
// EMBEDDING
// ============================================================================

/// Sorted-list subset test: every element of `needle` present in `hay`.
fn is_subset_sorted(needle: &[u32], hay: &[u32]) -> bool {
    let mut it = hay.iter();
    'outer: for &want in needle {
        for &have in it.by_ref() {
            match have.cmp(&want) {
                std::cmp::Ordering::Less => {}
                std::cmp::Ordering::Equal => continue 'outer,
                std::cmp::Ordering::Greater => return false,
            }
        }
        return false;
    }
    true
}

struct Container {
    node: u32,
    first: u32,
    last: u32,
    contiguous: bool,
}

/// `levUp` per node: all `m` with `slots(n) ⊆ slots(m)`, `m ≠ n`, ordered
/// by decreasing span, ties by ascending rank.
pub fn lev_up(shape: &Shape, first: &[u32], last: &[u32], rank: &[u32]) -> Vec<Vec<u32>> {
    // Candidate containers, sorted by first slot, with a prefix maximum of
    // last slots for pruning the backwards walk.
    let mut containers: Vec<Container> = (shape.slot_count + 1..=shape.node_count)
        .map(|m| {
            let f = first[(m - 1) as usize];
            let l = last[(m - 1) as usize];
            Container {
                node: m,
                first: f,
                last: l,
                contiguous: shape.span(m) == l - f + 1,
            }
        })
        .collect();
    containers.sort_by_key(|c| (c.first, c.node));

    let mut max_last = vec![0u32; containers.len()];
    let mut running = 0u32;
    for (i, c) in containers.iter().enumerate() {
        running = running.max(c.last);
        max_last[i] = running;
    }

    let embedders_of = |node: u32| -> Vec<u32> {
        let nf = first[(node - 1) as usize];
        let nl = last[(node - 1) as usize];
        let node_slots = shape.slots(node);

        // Containers with first > nf cannot embed node.
        let cut = containers.partition_point(|c| c.first <= nf);
        let mut found: Vec<u32> = Vec::new();
        for i in (0..cut).rev() {
            // Nothing at or before i reaches nl anymore.
            if max_last[i] < nl {
                break;
            }
            let c = &containers[i];
            if c.node == node || c.last < nl {
                continue;
            }
            // A solid container owns every slot in its interval, and the
            // interval check already passed. Only gapped containers need
            // confirmation against the full slot set.
            let contained = if c.contiguous {
                true
            } else {
                is_subset_sorted(&node_slots, &shape.slots(c.node))
            };
            if contained {
                found.push(c.node);
            }
        }

        found.sort_by_key(|&m| {
            (
                std::cmp::Reverse(shape.span(m)),
                rank[(m - 1) as usize],
            )
        });
        found
    };

    #[cfg(feature = "parallel")]
    {
        (1..=shape.node_count)
            .into_par_iter()
            .map(embedders_of)
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (1..=shape.node_count).map(embedders_of).collect()
    }
}

/// `levDown` as the inverse of `levUp`, each row ascending by rank.
pub fn lev_down(lev_up: &[Vec<u32>], rank: &[u32]) -> Vec<Vec<u32>> {
    let mut down: Vec<Vec<u32>> = vec![Vec::new(); lev_up.len()];
    for (i, ups) in lev_up.iter().enumerate() {
        let n = i as u32 + 1;
        for &m in ups {
            down[(m - 1) as usize].push(n);
        }
    }
    for row in &mut down {
        row.sort_by_key(|&n| rank[(n - 1) as usize]);
    }
    down
}
