// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Navigation operators: `N` walks nodes in canonical order, `L` moves
//! through the embedding relations and along same-type neighbors.
//!
//! Both are stateless views holding a shared reference to the Fabric.
//! Walks with a type filter never scan the whole corpus: they clip to the
//! contiguous per-type ranges in `levels` and merge by rank.

use std::sync::Arc;

use crate::error::Result;
use crate::store::FabricInner;
use crate::types::{Node, TypeId};

/// The `N` operator: canonical-order walks.
#[derive(Clone)]
pub struct NodesOp {
    pub(crate) fab: Arc<FabricInner>,
}

impl NodesOp {
    /// All nodes in canonical order.
    pub fn walk(&self) -> impl Iterator<Item = Node> + '_ {
        (0..self.fab.meta.node_count as usize).filter_map(move |pos| self.fab.warps.node_at(pos))
    }

    /// Nodes of the given types, in canonical order.
    ///
    /// The per-type ranges are collected and merged by rank; the cost is
    /// proportional to the number of matching nodes, not the corpus size.
    pub fn walk_types(&self, types: &[&str]) -> Result<Vec<Node>> {
        let mut ids: Vec<TypeId> = Vec::with_capacity(types.len());
        for name in types {
            ids.push(self.fab.type_id(name)?);
        }
        let mut nodes: Vec<Node> = Vec::new();
        for id in ids {
            if let Some(range) = self.fab.warps.level(id) {
                nodes.extend(range.nodes());
            }
        }
        nodes.sort_by_key(|&n| self.fab.warps.rank_of(n));
        Ok(nodes)
    }

    /// Total number of nodes.
    pub fn len(&self) -> u32 {
        self.fab.meta.node_count
    }

    pub fn is_empty(&self) -> bool {
        self.fab.meta.node_count == 0
    }
}

/// The `L` operator: locality.
#[derive(Clone)]
pub struct LocalityOp {
    pub(crate) fab: Arc<FabricInner>,
}

impl LocalityOp {
    fn type_filter(&self, nodes: Vec<Node>, ty: Option<&str>) -> Result<Vec<Node>> {
        let Some(name) = ty else {
            return Ok(nodes);
        };
        let want = self.fab.type_id(name)?;
        Ok(nodes
            .into_iter()
            .filter(|&n| self.fab.type_of(n) == Some(want))
            .collect())
    }

    /// Embedders of `node` (widest first), optionally type-filtered.
    pub fn up(&self, node: Node, ty: Option<&str>) -> Result<Vec<Node>> {
        self.type_filter(self.fab.warps.lev_up_row(node), ty)
    }

    /// Embeddees of `node` (canonical order), optionally type-filtered.
    pub fn down(&self, node: Node, ty: Option<&str>) -> Result<Vec<Node>> {
        self.type_filter(self.fab.warps.lev_down_row(node), ty)
    }

    /// Previous node of the same type in canonical order.
    pub fn prev(&self, node: Node) -> Option<Node> {
        self.step(node, -1)
    }

    /// Next node of the same type in canonical order.
    pub fn next(&self, node: Node) -> Option<Node> {
        self.step(node, 1)
    }

    fn step(&self, node: Node, delta: i64) -> Option<Node> {
        let ty = self.fab.type_of(node)?;
        let peers = self.fab.type_nodes_by_rank(ty);
        let rank = self.fab.warps.rank_of(node);
        let pos = peers
            .binary_search_by_key(&rank, |&n| self.fab.warps.rank_of(n))
            .ok()?;
        let target = pos as i64 + delta;
        if target < 0 {
            return None;
        }
        peers.get(target as usize).copied()
    }
}
