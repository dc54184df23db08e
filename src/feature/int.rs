// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Dense integer feature backend.
//!
//! One i32 per node, `i32::MIN` meaning absent. The bulk filters index the
//! backing array once per node with no per-node dispatch, which is where
//! the vectorized speedup over row-at-a-time evaluation comes from.

use std::path::Path;

use crate::error::Result;
use crate::feature::ABSENT;
use crate::store::bytes::{ElemKind, IntArray};
use crate::types::Node;

/// A node feature with integer values.
#[derive(Debug)]
pub struct IntFeature {
    name: String,
    data: IntArray,
}

impl IntFeature {
    /// Open from the dense array file.
    pub fn open(name: &str, bin_path: &Path) -> Result<IntFeature> {
        let data = IntArray::open(bin_path, ElemKind::I32, false)?;
        Ok(IntFeature {
            name: name.to_string(),
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored cells (may be less than the corpus node count for
    /// subset corpora).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The value for a node, absent-aware and bounds-safe: out-of-range
    /// nodes and sentinel cells both yield `None`, never an error.
    #[inline]
    pub fn value(&self, node: Node) -> Option<i32> {
        if node == 0 {
            return None;
        }
        match self.data.get_i32(node as usize - 1) {
            Some(ABSENT) | None => None,
            Some(v) => Some(v),
        }
    }

    /// Subset of `nodes` whose value equals `value`.
    pub fn filter_eq(&self, nodes: &[Node], value: i32) -> Vec<Node> {
        if value == ABSENT {
            return Vec::new();
        }
        nodes
            .iter()
            .copied()
            .filter(|&n| n != 0 && self.data.get_i32(n as usize - 1).is_some_and(|v| v == value))
            .collect()
    }

    /// Subset of `nodes` whose value is any of `values`.
    pub fn filter_in(&self, nodes: &[Node], values: &[i32]) -> Vec<Node> {
        nodes
            .iter()
            .copied()
            .filter(|&n| {
                n != 0
                    && self
                        .data
                        .get_i32(n as usize - 1)
                        .is_some_and(|v| v != ABSENT && values.contains(&v))
            })
            .collect()
    }

    /// Subset of `nodes` whose value differs from `value` (absent cells
    /// excluded: "not equal" still requires a value).
    pub fn filter_ne(&self, nodes: &[Node], value: i32) -> Vec<Node> {
        nodes
            .iter()
            .copied()
            .filter(|&n| {
                n != 0
                    && self
                        .data
                        .get_i32(n as usize - 1)
                        .is_some_and(|v| v != ABSENT && v != value)
            })
            .collect()
    }

    /// Subset of `nodes` with any value.
    pub fn filter_present(&self, nodes: &[Node]) -> Vec<Node> {
        nodes
            .iter()
            .copied()
            .filter(|&n| n != 0 && self.data.get_i32(n as usize - 1).is_some_and(|v| v != ABSENT))
            .collect()
    }

    /// Subset of `nodes` with no value (sentinel cells and out-of-range
    /// nodes alike).
    pub fn filter_absent(&self, nodes: &[Node]) -> Vec<Node> {
        nodes
            .iter()
            .copied()
            .filter(|&n| n == 0 || !self.data.get_i32(n as usize - 1).is_some_and(|v| v != ABSENT))
            .collect()
    }

    /// All nodes carrying exactly `value`, ascending.
    pub fn nodes_with_value(&self, value: i32) -> Vec<Node> {
        if value == ABSENT {
            return Vec::new();
        }
        (1..=self.data.len() as u32)
            .filter(|&n| self.data.get_i32(n as usize - 1) == Some(value))
            .collect()
    }

    /// Exact per-value counts over all stored cells, descending by count.
    pub fn value_counts(&self) -> Vec<(i32, u32)> {
        let mut counts: std::collections::HashMap<i32, u32> = std::collections::HashMap::new();
        for v in self.data.iter_i32() {
            if v != ABSENT {
                *counts.entry(v).or_insert(0) += 1;
            }
        }
        let mut out: Vec<(i32, u32)> = counts.into_iter().collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    pub fn check_integrity(&self) -> Result<()> {
        self.data.check_integrity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::bytes::write_i32_array;

    fn fixture(name: &str, cells: &[i32]) -> IntFeature {
        let dir = std::env::temp_dir().join("fabric-intfeat-tests");
        std::fs::create_dir_all(&dir).unwrap();
        let bin = dir.join(format!("{}.bin", name));
        write_i32_array(&bin, cells).unwrap();
        IntFeature::open(name, &bin).unwrap()
    }

    #[test]
    fn scalar_get_is_bounds_safe() {
        let f = fixture("chapter", &[1, 2, ABSENT]);
        assert_eq!(f.value(1), Some(1));
        assert_eq!(f.value(3), None);
        assert_eq!(f.value(0), None);
        assert_eq!(f.value(999_999), None);
    }

    #[test]
    fn filter_eq_equals_scalar_filter() {
        let f = fixture("n", &[5, 7, 5, ABSENT, 9]);
        let nodes = [1, 2, 3, 4, 5, 100];
        let bulk = f.filter_eq(&nodes, 5);
        let scalar: Vec<Node> = nodes
            .iter()
            .copied()
            .filter(|&n| f.value(n) == Some(5))
            .collect();
        assert_eq!(bulk, scalar);
    }

    #[test]
    fn absent_is_not_a_value() {
        let f = fixture("m", &[5, ABSENT]);
        let nodes = [1, 2];
        assert_eq!(f.filter_ne(&nodes, 5), Vec::<Node>::new());
        assert_eq!(f.filter_present(&nodes), vec![1]);
        assert_eq!(f.filter_absent(&nodes), vec![2]);
        // Filtering for the sentinel itself matches nothing.
        assert_eq!(f.filter_eq(&nodes, ABSENT), Vec::<Node>::new());
    }

    #[test]
    fn value_counts_sorted_by_count() {
        let f = fixture("c", &[3, 3, 3, 1, 1, 2]);
        assert_eq!(f.value_counts(), vec![(3, 3), (1, 2), (2, 1)]);
    }
}
