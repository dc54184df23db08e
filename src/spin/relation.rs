// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Semantics of the structural relations over the warps.
//!
//! Every relation has two faces: `holds` tests a concrete pair, and
//! `support` produces the candidate set for the unbound side given a bound
//! node. Support sets come straight out of the precomputed indices; the
//! slot-sharing relations exploit the fact that a node always contains its
//! own first and last slot, so every node sharing a boundary slot with `x`
//! sits in `levUp` of that slot.

use crate::spin::template::RelOp;
use crate::store::FabricInner;
use crate::types::Node;

/// Does `a op b` hold?
pub fn holds(fab: &FabricInner, op: RelOp, a: Node, b: Node) -> bool {
    let w = &fab.warps;
    match op {
        RelOp::Before => w.rank_of(a) < w.rank_of(b),
        RelOp::After => w.rank_of(a) > w.rank_of(b),
        RelOp::AdjBefore => w.last_slot(a) + 1 == w.first_slot(b),
        RelOp::AdjAfter => w.last_slot(b) + 1 == w.first_slot(a),
        RelOp::SlotBefore => w.last_slot(a) < w.first_slot(b),
        RelOp::SlotAfter => w.last_slot(b) < w.first_slot(a),
        RelOp::Embeds => w.embedded_in(b, a),
        RelOp::EmbeddedIn => w.embedded_in(a, b),
        RelOp::SameFirst => a != b && w.first_slot(a) == w.first_slot(b),
        RelOp::SameLast => a != b && w.last_slot(a) == w.last_slot(b),
        RelOp::CoExtensive => {
            a != b && w.first_slot(a) == w.first_slot(b) && w.last_slot(a) == w.last_slot(b)
        }
        RelOp::SameSlots => same_slots(fab, a, b),
    }
}

fn same_slots(fab: &FabricInner, a: Node, b: Node) -> bool {
    if a == b {
        return false;
    }
    let w = &fab.warps;
    if w.first_slot(a) != w.first_slot(b)
        || w.last_slot(a) != w.last_slot(b)
        || fab.span(a) != fab.span(b)
    {
        return false;
    }
    // Matching boundaries and span settle it for solid nodes; gapped ones
    // get the full comparison.
    let solid =
        |n: Node| fab.span(n) == w.last_slot(n) - w.first_slot(n) + 1;
    if solid(a) && solid(b) {
        return true;
    }
    fab.slots(a) == fab.slots(b)
}

/// Nodes that can possibly share a boundary slot with `slot`: the slot
/// itself plus everything that embeds it.
fn around_slot(fab: &FabricInner, slot: u32) -> Vec<Node> {
    if slot == 0 || slot > fab.meta.slot_count {
        return Vec::new();
    }
    let mut nodes = fab.warps.lev_up_row(slot);
    nodes.push(slot);
    nodes
}

/// Candidate set for the unbound side of `op`, given the bound `other`.
///
/// `target_is_left` says which operand the candidates stand for. `None`
/// means the relation narrows nothing and the executor falls back to
/// filtering with `holds`.
pub fn support(
    fab: &FabricInner,
    op: RelOp,
    other: Node,
    target_is_left: bool,
) -> Option<Vec<Node>> {
    let w = &fab.warps;
    match op {
        // target embeds other / other embedded in target
        RelOp::Embeds if target_is_left => Some(w.lev_up_row(other)),
        RelOp::Embeds => Some(w.lev_down_row(other)),
        RelOp::EmbeddedIn if target_is_left => Some(w.lev_down_row(other)),
        RelOp::EmbeddedIn => Some(w.lev_up_row(other)),

        RelOp::AdjBefore | RelOp::AdjAfter => {
            // target ends right before other, or starts right after it
            let target_before = (op == RelOp::AdjBefore) == target_is_left;
            if target_before {
                let first = w.first_slot(other);
                if first <= 1 {
                    return Some(Vec::new());
                }
                let boundary = first - 1;
                Some(
                    around_slot(fab, boundary)
                        .into_iter()
                        .filter(|&n| w.last_slot(n) == boundary)
                        .collect(),
                )
            } else {
                let boundary = w.last_slot(other) + 1;
                Some(
                    around_slot(fab, boundary)
                        .into_iter()
                        .filter(|&n| w.first_slot(n) == boundary)
                        .collect(),
                )
            }
        }

        RelOp::SameFirst => {
            let slot = w.first_slot(other);
            Some(
                around_slot(fab, slot)
                    .into_iter()
                    .filter(|&n| n != other && w.first_slot(n) == slot)
                    .collect(),
            )
        }
        RelOp::SameLast => {
            let slot = w.last_slot(other);
            Some(
                around_slot(fab, slot)
                    .into_iter()
                    .filter(|&n| n != other && w.last_slot(n) == slot)
                    .collect(),
            )
        }
        RelOp::CoExtensive | RelOp::SameSlots => {
            let slot = w.first_slot(other);
            Some(
                around_slot(fab, slot)
                    .into_iter()
                    .filter(|&n| {
                        if target_is_left {
                            holds(fab, op, n, other)
                        } else {
                            holds(fab, op, other, n)
                        }
                    })
                    .collect(),
            )
        }

        // Pure order constraints narrow nothing by themselves.
        RelOp::Before | RelOp::After | RelOp::SlotBefore | RelOp::SlotAfter => None,
    }
}

/// Planner weight: how hard a relation to an already-bound atom squeezes
/// the candidate set.
pub fn narrowing_factor(op: RelOp) -> f64 {
    match op {
        RelOp::Embeds | RelOp::EmbeddedIn => 0.01,
        RelOp::AdjBefore
        | RelOp::AdjAfter
        | RelOp::SameFirst
        | RelOp::SameLast
        | RelOp::CoExtensive
        | RelOp::SameSlots => 0.001,
        RelOp::Before | RelOp::After | RelOp::SlotBefore | RelOp::SlotAfter => 0.5,
    }
}
