// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Feature backends: the typed containers behind every annotation.
//!
//! A feature is a total function from nodes to values-or-absent (node
//! features) or a labeled relation (edge features). Rather than dispatching
//! feature operations through duck-typed attribute lookup, the store hands
//! out one tagged handle per feature; callers match on it or use the
//! literal-based entry points the search engine uses.

mod edge;
mod int;
pub(crate) mod strpool;

pub use edge::EdgeFeature;
pub use int::IntFeature;
pub use strpool::{StrFeature, StringPool};

use std::collections::HashMap;

use crate::types::{Node, Value};

/// Sentinel in dense i32 cells meaning "no value".
pub const ABSENT: i32 = i32::MIN;

/// A loaded feature, tagged by backend.
#[derive(Debug)]
pub enum FeatureHandle {
    Int(IntFeature),
    Str(StrFeature),
    Edge(EdgeFeature),
}

impl FeatureHandle {
    pub fn name(&self) -> &str {
        match self {
            FeatureHandle::Int(f) => f.name(),
            FeatureHandle::Str(f) => f.name(),
            FeatureHandle::Edge(f) => f.name(),
        }
    }

    /// Scalar node-feature access. Edge handles have no per-node value.
    pub fn value(&self, node: Node) -> Option<Value> {
        match self {
            FeatureHandle::Int(f) => f.value(node).map(|v| Value::Int(i64::from(v))),
            FeatureHandle::Str(f) => f.value(node).map(Value::from),
            FeatureHandle::Edge(_) => None,
        }
    }

    /// The edge view, when this is an edge feature.
    pub fn as_edge(&self) -> Option<&EdgeFeature> {
        match self {
            FeatureHandle::Edge(f) => Some(f),
            _ => None,
        }
    }

    /// Whether this handle is a node feature.
    pub fn is_node_feature(&self) -> bool {
        !matches!(self, FeatureHandle::Edge(_))
    }

    /// Subset of `nodes` matching any of the literal values. Integer
    /// features parse the literals; unparseable or unknown literals match
    /// nothing.
    pub fn filter_eq_lits(&self, nodes: &[Node], lits: &[&str]) -> Vec<Node> {
        match self {
            FeatureHandle::Int(f) => {
                let values: Vec<i32> = lits.iter().filter_map(|l| l.parse().ok()).collect();
                match values.as_slice() {
                    [] => Vec::new(),
                    [one] => f.filter_eq(nodes, *one),
                    many => f.filter_in(nodes, many),
                }
            }
            FeatureHandle::Str(f) => match lits {
                [] => Vec::new(),
                [one] => f.filter_eq(nodes, one),
                many => f.filter_in(nodes, many),
            },
            FeatureHandle::Edge(_) => Vec::new(),
        }
    }

    /// Subset of `nodes` with a value different from the literal.
    pub fn filter_ne_lit(&self, nodes: &[Node], lit: &str) -> Vec<Node> {
        match self {
            FeatureHandle::Int(f) => match lit.parse::<i32>() {
                Ok(v) => f.filter_ne(nodes, v),
                // No integer equals an unparseable literal, so "not equal"
                // keeps every node that has a value at all.
                Err(_) => f.filter_present(nodes),
            },
            FeatureHandle::Str(f) => f.filter_ne(nodes, lit),
            FeatureHandle::Edge(_) => Vec::new(),
        }
    }

    /// Subset of `nodes` with any value.
    pub fn filter_present(&self, nodes: &[Node]) -> Vec<Node> {
        match self {
            FeatureHandle::Int(f) => f.filter_present(nodes),
            FeatureHandle::Str(f) => f.filter_present(nodes),
            FeatureHandle::Edge(_) => Vec::new(),
        }
    }

    /// Subset of `nodes` with no value.
    pub fn filter_absent(&self, nodes: &[Node]) -> Vec<Node> {
        match self {
            FeatureHandle::Int(f) => f.filter_absent(nodes),
            FeatureHandle::Str(f) => f.filter_absent(nodes),
            FeatureHandle::Edge(_) => nodes.to_vec(),
        }
    }

    /// All nodes carrying exactly the literal value, ascending.
    pub fn nodes_with_value(&self, lit: &str) -> Vec<Node> {
        match self {
            FeatureHandle::Int(f) => match lit.parse::<i32>() {
                Ok(v) => f.nodes_with_value(v),
                Err(_) => Vec::new(),
            },
            FeatureHandle::Str(f) => f.nodes_with_value(lit),
            FeatureHandle::Edge(_) => Vec::new(),
        }
    }

    /// Exact frequency table over all stored cells.
    pub fn freq(&self) -> FreqTable {
        match self {
            FeatureHandle::Int(f) => FreqTable::from_entries(
                f.value_counts()
                    .into_iter()
                    .map(|(v, c)| (Value::Int(i64::from(v)), c)),
            ),
            FeatureHandle::Str(f) => FreqTable::from_entries(
                f.value_counts().into_iter().map(|(v, c)| (Value::from(v), c)),
            ),
            FeatureHandle::Edge(_) => FreqTable::default(),
        }
    }
}

// ============================================================================
// FREQUENCY TABLE
// ============================================================================

/// Exact per-value counts for one feature, descending by count.
///
/// Doubles as the planner's selectivity histogram; lookups go through the
/// rendered form because template literals arrive as text.
#[derive(Debug, Default)]
pub struct FreqTable {
    entries: Vec<(Value, u32)>,
    by_render: HashMap<String, u32>,
    total: u64,
}

impl FreqTable {
    fn from_entries<I: IntoIterator<Item = (Value, u32)>>(entries: I) -> Self {
        let entries: Vec<(Value, u32)> = entries.into_iter().collect();
        let by_render = entries
            .iter()
            .map(|(v, c)| (v.render(), *c))
            .collect();
        let total = entries.iter().map(|(_, c)| u64::from(*c)).sum();
        FreqTable {
            entries,
            by_render,
            total,
        }
    }

    /// `(value, count)` pairs, most frequent first.
    pub fn entries(&self) -> &[(Value, u32)] {
        &self.entries
    }

    /// Number of cells carrying any value.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Count of one literal value; 0 for values that never occur.
    pub fn count_of(&self, lit: &str) -> u32 {
        self.by_render.get(lit).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::bytes::write_i32_array;

    #[test]
    fn literal_dispatch_parses_ints() {
        let dir = std::env::temp_dir().join("fabric-feat-mod-tests");
        std::fs::create_dir_all(&dir).unwrap();
        let bin = dir.join("lit.bin");
        write_i32_array(&bin, &[5, 7, ABSENT]).unwrap();
        let h = FeatureHandle::Int(IntFeature::open("lit", &bin).unwrap());

        let nodes = [1, 2, 3];
        assert_eq!(h.filter_eq_lits(&nodes, &["5"]), vec![1]);
        assert_eq!(h.filter_eq_lits(&nodes, &["5", "7"]), vec![1, 2]);
        assert_eq!(h.filter_eq_lits(&nodes, &["x"]), Vec::<Node>::new());
        assert_eq!(h.filter_ne_lit(&nodes, "5"), vec![2]);
        assert_eq!(h.filter_ne_lit(&nodes, "x"), vec![1, 2]);

        let freq = h.freq();
        assert_eq!(freq.total(), 2);
        assert_eq!(freq.count_of("7"), 1);
        assert_eq!(freq.count_of("404"), 0);
    }
}
