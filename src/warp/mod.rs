// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Runtime views over the precomputed structural indices.
//!
//! A warp is anything derived from `otype` and `oslots` at compile time:
//! canonical order and rank, per-type ranges, slot boundaries, and the two
//! embedding CSRs. All of it stays in the arena encoding it was written in;
//! the only choice made at open time is whether the embedding CSRs are
//! mapped or copied into RAM (`Config::embedding_cache`).

pub mod compute;

use std::path::Path;

use tracing::debug;

use crate::config::Config;
use crate::error::{FabricError, Result};
use crate::store::bytes::{ElemKind, IntArray};
use crate::store::csr::CsrView;
use crate::store::meta::{
    self, BOUNDARY_FILE, LEVELS_FILE, LEV_DOWN_FILE, LEV_UP_FILE, ORDER_FILE, RANK_FILE,
};
use crate::types::{Node, TypeId};

/// Contiguous node-id range of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRange {
    pub min_node: u32,
    pub max_node: u32,
    pub count: u32,
}

impl LevelRange {
    /// All nodes of the type, in node-id order.
    pub fn nodes(&self) -> impl Iterator<Item = Node> {
        self.min_node..=self.max_node
    }

    pub fn contains(&self, node: Node) -> bool {
        node >= self.min_node && node <= self.max_node
    }
}

/// The loaded warps of one store version.
#[derive(Debug)]
pub struct Warps {
    order: IntArray,
    rank: IntArray,
    levels: Vec<LevelRange>,
    levels_file: IntArray,
    lev_up: CsrView,
    lev_down: CsrView,
    boundary: IntArray,
    node_count: u32,
}

impl Warps {
    /// Load all warp files from a version directory, checking every length
    /// against the declared node and type counts.
    pub fn load(dir: &Path, node_count: u32, type_count: usize, config: &Config) -> Result<Warps> {
        let n = node_count as usize;

        let order = IntArray::open(&meta::warp_path(dir, ORDER_FILE), ElemKind::U32, false)?;
        let rank = IntArray::open(&meta::warp_path(dir, RANK_FILE), ElemKind::U32, false)?;
        let levels_arr = IntArray::open(&meta::warp_path(dir, LEVELS_FILE), ElemKind::U32, true)?;
        let boundary = IntArray::open(&meta::warp_path(dir, BOUNDARY_FILE), ElemKind::U32, false)?;

        let preload = config.embedding_cache;
        if preload {
            debug!("preloading embedding CSRs into RAM");
        }
        let lev_up = CsrView::open(&meta::warp_path(dir, LEV_UP_FILE), preload)?;
        let lev_down = CsrView::open(&meta::warp_path(dir, LEV_DOWN_FILE), preload)?;

        for (file, len, want) in [
            (ORDER_FILE, order.len(), n),
            (RANK_FILE, rank.len(), n),
            (LEVELS_FILE, levels_arr.len(), type_count * 3),
            (BOUNDARY_FILE, boundary.len(), 2 * n),
        ] {
            if len != want {
                return Err(FabricError::corrupt(
                    meta::warp_path(dir, file),
                    format!("{} elements where {} were declared", len, want),
                ));
            }
        }
        for (file, rows) in [
            (LEV_UP_FILE, lev_up.row_count()),
            (LEV_DOWN_FILE, lev_down.row_count()),
        ] {
            if rows != n {
                return Err(FabricError::corrupt(
                    meta::warp_path(dir, file),
                    format!("{} rows where {} were declared", rows, n),
                ));
            }
        }

        let levels = (0..type_count)
            .map(|t| LevelRange {
                min_node: levels_arr.get_u32(t * 3).unwrap_or(0),
                max_node: levels_arr.get_u32(t * 3 + 1).unwrap_or(0),
                count: levels_arr.get_u32(t * 3 + 2).unwrap_or(0),
            })
            .collect::<Vec<_>>();
        for (t, range) in levels.iter().enumerate() {
            if range.min_node == 0
                || range.max_node > node_count
                || range.min_node > range.max_node
            {
                return Err(FabricError::ArrayOutOfRange {
                    path: meta::warp_path(dir, LEVELS_FILE),
                    index: t as u64,
                    bound: u64::from(node_count),
                });
            }
        }

        Ok(Warps {
            order,
            rank,
            levels,
            levels_file: levels_arr,
            lev_up,
            lev_down,
            boundary,
            node_count,
        })
    }

    #[inline]
    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// The node at 0-based canonical position `pos`.
    #[inline]
    pub fn node_at(&self, pos: usize) -> Option<Node> {
        self.order.get_u32(pos)
    }

    /// 1-based canonical position of `node`; 0 for out-of-range input.
    #[inline]
    pub fn rank_of(&self, node: Node) -> u32 {
        if node == 0 {
            return 0;
        }
        self.rank.get_u32(node as usize - 1).unwrap_or(0)
    }

    /// Canonical-order comparison of two nodes.
    #[inline]
    pub fn cmp_canonical(&self, a: Node, b: Node) -> std::cmp::Ordering {
        self.rank_of(a).cmp(&self.rank_of(b))
    }

    /// First slot of a node; 0 for out-of-range input.
    #[inline]
    pub fn first_slot(&self, node: Node) -> u32 {
        if node == 0 {
            return 0;
        }
        self.boundary.get_u32(node as usize - 1).unwrap_or(0)
    }

    /// Last slot of a node; 0 for out-of-range input.
    #[inline]
    pub fn last_slot(&self, node: Node) -> u32 {
        if node == 0 {
            return 0;
        }
        self.boundary
            .get_u32(self.node_count as usize + node as usize - 1)
            .unwrap_or(0)
    }

    /// The contiguous node range of a type.
    pub fn level(&self, ty: TypeId) -> Option<&LevelRange> {
        self.levels.get(ty.as_usize())
    }

    pub fn levels(&self) -> &[LevelRange] {
        &self.levels
    }

    /// Embedders of `node`, widest span first, ties by ascending rank.
    pub fn lev_up_row(&self, node: Node) -> Vec<Node> {
        if node == 0 {
            return Vec::new();
        }
        self.lev_up.row_vec(node as usize - 1)
    }

    /// Embeddees of `node`, ascending by rank.
    pub fn lev_down_row(&self, node: Node) -> Vec<Node> {
        if node == 0 {
            return Vec::new();
        }
        self.lev_down.row_vec(node as usize - 1)
    }

    /// Whether `inner` is embedded in `outer` (binary search on the
    /// rank-sorted `levDown` row would need rank order; `levUp` rows are
    /// short, so scan those instead).
    pub fn embedded_in(&self, inner: Node, outer: Node) -> bool {
        if inner == 0 || outer == 0 {
            return false;
        }
        self.lev_up.row(inner as usize - 1).any(|m| m == outer)
    }

    /// Full checksum pass over every warp file.
    pub fn check_integrity(&self) -> Result<()> {
        self.order.check_integrity()?;
        self.rank.check_integrity()?;
        self.levels_file.check_integrity()?;
        self.boundary.check_integrity()?;
        self.lev_up.check_integrity()?;
        self.lev_down.check_integrity()?;
        Ok(())
    }
}
