// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Interned string pool and the string feature backend.
//!
//! String values are interned at compile time: the pool stores the sorted
//! unique values once, and the dense per-node array stores i32 indices into
//! it. Category-style features ("sp" with 14 values over 400k words)
//! collapse to almost nothing, and equality filters become integer compares
//! against a comparand resolved once per filter call.
//!
//! Unknown values in a filter resolve to "never matches", not an error: a
//! query for `sp=vrb` is a miss, not a crash.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{FabricError, Result};
use crate::feature::ABSENT;
use crate::store::bytes::{ElemKind, IntArray};
use crate::types::Node;

/// A pool of interned strings with reverse lookup.
///
/// Stored on disk as a JSON array, sorted and duplicate-free, so that a
/// recompile of the same corpus produces byte-identical pools.
#[derive(Debug, Default)]
pub struct StringPool {
    strings: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl StringPool {
    /// Build a pool from arbitrary values: sorts, dedups, interns.
    pub fn from_values<I: IntoIterator<Item = String>>(values: I) -> Self {
        let mut strings: Vec<String> = values.into_iter().collect();
        strings.sort();
        strings.dedup();
        let lookup = strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        StringPool { strings, lookup }
    }

    /// Load a pool from its JSON file.
    pub fn load(path: &Path) -> Result<StringPool> {
        let bytes = std::fs::read(path).map_err(|e| FabricError::io(path, e))?;
        let strings: Vec<String> = serde_json::from_slice(&bytes)
            .map_err(|e| FabricError::corrupt(path, format!("invalid string pool: {}", e)))?;
        let lookup = strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        Ok(StringPool { strings, lookup })
    }

    /// Write the pool as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(&self.strings)
            .map_err(|e| FabricError::corrupt(path, format!("string pool serialization: {}", e)))?;
        std::fs::write(path, json).map_err(|e| FabricError::io(path, e))
    }

    /// The string at `index`.
    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    /// Reverse lookup: value -> interned index. `None` means the value never
    /// occurs in this feature.
    pub fn index_of(&self, value: &str) -> Option<u32> {
        self.lookup.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }
}

// ============================================================================
// STRING FEATURE
// ============================================================================

/// A node feature with interned string values.
///
/// The dense array holds the pool index per node, or the absent sentinel.
#[derive(Debug)]
pub struct StrFeature {
    name: String,
    indices: IntArray,
    pool: Arc<StringPool>,
}

impl StrFeature {
    /// Open from the dense index array and pool files.
    pub fn open(name: &str, bin_path: &Path, str_path: &Path) -> Result<StrFeature> {
        let indices = IntArray::open(bin_path, ElemKind::I32, false)?;
        let pool = Arc::new(StringPool::load(str_path)?);
        // Every stored index must resolve; a pool that lost entries is a
        // corrupt store, not a lookup miss.
        let bound = pool.len() as i32;
        for (i, idx) in indices.iter_i32().enumerate() {
            if idx != ABSENT && (idx < 0 || idx >= bound) {
                return Err(FabricError::ArrayOutOfRange {
                    path: bin_path.to_path_buf(),
                    index: i as u64,
                    bound: bound as u64,
                });
            }
        }
        Ok(StrFeature {
            name: name.to_string(),
            indices,
            pool,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &Arc<StringPool> {
        &self.pool
    }

    /// Number of stored cells (may be less than the corpus node count for
    /// subset corpora).
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The raw pool index for a node, absent-aware and bounds-safe.
    #[inline]
    pub fn index_value(&self, node: Node) -> Option<u32> {
        if node == 0 {
            return None;
        }
        match self.indices.get_i32(node as usize - 1) {
            Some(ABSENT) | None => None,
            Some(idx) => Some(idx as u32),
        }
    }

    /// The string value for a node.
    pub fn value(&self, node: Node) -> Option<&str> {
        self.index_value(node).and_then(|i| self.pool.get(i))
    }

    /// Subset of `nodes` whose value equals `value`.
    pub fn filter_eq(&self, nodes: &[Node], value: &str) -> Vec<Node> {
        let Some(want) = self.pool.index_of(value) else {
            return Vec::new();
        };
        let want = want as i32;
        nodes
            .iter()
            .copied()
            .filter(|&n| {
                n != 0 && self.indices.get_i32(n as usize - 1).is_some_and(|v| v == want)
            })
            .collect()
    }

    /// Subset of `nodes` whose value is any of `values`.
    pub fn filter_in(&self, nodes: &[Node], values: &[&str]) -> Vec<Node> {
        let wanted: Vec<i32> = values
            .iter()
            .filter_map(|v| self.pool.index_of(v))
            .map(|i| i as i32)
            .collect();
        if wanted.is_empty() {
            return Vec::new();
        }
        nodes
            .iter()
            .copied()
            .filter(|&n| {
                n != 0
                    && self
                        .indices
                        .get_i32(n as usize - 1)
                        .is_some_and(|v| v != ABSENT && wanted.contains(&v))
            })
            .collect()
    }

    /// Subset of `nodes` whose value differs from `value` (absent cells are
    /// excluded: "not equal" still requires a value).
    pub fn filter_ne(&self, nodes: &[Node], value: &str) -> Vec<Node> {
        let unwanted = self.pool.index_of(value).map(|i| i as i32);
        nodes
            .iter()
            .copied()
            .filter(|&n| {
                n != 0
                    && self
                        .indices
                        .get_i32(n as usize - 1)
                        .is_some_and(|v| v != ABSENT && Some(v) != unwanted)
            })
            .collect()
    }

    /// Subset of `nodes` with any value.
    pub fn filter_present(&self, nodes: &[Node]) -> Vec<Node> {
        nodes
            .iter()
            .copied()
            .filter(|&n| n != 0 && self.indices.get_i32(n as usize - 1).is_some_and(|v| v != ABSENT))
            .collect()
    }

    /// Subset of `nodes` with no value. In-bounds sentinel cells and
    /// out-of-range nodes both count as absent.
    pub fn filter_absent(&self, nodes: &[Node]) -> Vec<Node> {
        nodes
            .iter()
            .copied()
            .filter(|&n| {
                n == 0 || !self.indices.get_i32(n as usize - 1).is_some_and(|v| v != ABSENT)
            })
            .collect()
    }

    /// All nodes carrying exactly `value`, ascending. Unknown values give
    /// the empty set.
    pub fn nodes_with_value(&self, value: &str) -> Vec<Node> {
        let Some(want) = self.pool.index_of(value) else {
            return Vec::new();
        };
        let want = want as i32;
        (1..=self.indices.len() as u32)
            .filter(|&n| self.indices.get_i32(n as usize - 1) == Some(want))
            .collect()
    }

    /// Exact per-value counts over all stored cells.
    pub fn value_counts(&self) -> Vec<(String, u32)> {
        let mut counts = vec![0u32; self.pool.len()];
        for idx in self.indices.iter_i32() {
            if idx != ABSENT {
                counts[idx as usize] += 1;
            }
        }
        let mut out: Vec<(String, u32)> = self
            .pool
            .strings()
            .iter()
            .zip(counts)
            .filter(|(_, c)| *c > 0)
            .map(|(s, c)| (s.clone(), c))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    pub fn check_integrity(&self) -> Result<()> {
        self.indices.check_integrity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::bytes::write_i32_array;

    fn fixture(name: &str, cells: &[i32], pool: &[&str]) -> StrFeature {
        let dir = std::env::temp_dir().join("fabric-strpool-tests");
        std::fs::create_dir_all(&dir).unwrap();
        let bin = dir.join(format!("{}.bin", name));
        let strs = dir.join(format!("{}.str", name));
        write_i32_array(&bin, cells).unwrap();
        StringPool::from_values(pool.iter().map(|s| s.to_string()))
            .save(&strs)
            .unwrap();
        StrFeature::open(name, &bin, &strs).unwrap()
    }

    #[test]
    fn interning_is_sorted_and_deduped() {
        let pool = StringPool::from_values(["b", "a", "b", "c"].map(String::from));
        assert_eq!(pool.strings(), ["a", "b", "c"]);
        assert_eq!(pool.index_of("b"), Some(1));
        assert_eq!(pool.index_of("zzz"), None);
    }

    #[test]
    fn scalar_get_is_bounds_safe() {
        // pool sorted: noun=0, verb=1
        let f = fixture("sp", &[1, 0, ABSENT, 1], &["verb", "noun"]);
        assert_eq!(f.value(1), Some("verb"));
        assert_eq!(f.value(2), Some("noun"));
        assert_eq!(f.value(3), None);
        assert_eq!(f.value(0), None);
        assert_eq!(f.value(999_999), None);
    }

    #[test]
    fn filters_match_scalar_semantics() {
        let f = fixture("sp2", &[1, 0, ABSENT, 1], &["verb", "noun"]);
        let all = [1, 2, 3, 4, 999];
        assert_eq!(f.filter_eq(&all, "verb"), vec![1, 4]);
        assert_eq!(f.filter_eq(&all, "adjective"), Vec::<Node>::new());
        assert_eq!(f.filter_ne(&all, "verb"), vec![2]);
        assert_eq!(f.filter_present(&all), vec![1, 2, 4]);
        assert_eq!(f.filter_absent(&all), vec![3, 999]);
        assert_eq!(f.filter_in(&all, &["noun", "verb"]), vec![1, 2, 4]);
        assert_eq!(f.filter_in(&all, &["bogus"]), Vec::<Node>::new());
    }

    #[test]
    fn value_counts_are_exact() {
        let f = fixture("sp3", &[1, 1, 0, ABSENT], &["verb", "noun"]);
        assert_eq!(
            f.value_counts(),
            vec![("verb".to_string(), 2), ("noun".to_string(), 1)]
        );
    }
}
