// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Edge feature backend: a labeled relation between nodes.
//!
//! Stored as a CSR from source node to destinations, optionally with a
//! parallel value array (integers, or interned string indices). The
//! inverted view (destination -> sources) is not stored; it is built once
//! on first use and published for the lifetime of the Fabric.
//!
//! Destinations outside the corpus node range are skipped silently during
//! traversal: subset corpora keep edges whose far end was cut away.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::error::Result;
use crate::feature::ABSENT;
use crate::feature::strpool::StringPool;
use crate::store::csr::CsrView;
use crate::types::{Node, Value, ValueKind};

/// Inverted edge index, built lazily.
#[derive(Debug)]
struct Inverse {
    offsets: Vec<u32>,
    sources: Vec<u32>,
    aux: Vec<i32>,
}

/// An edge feature: relation plus optional labels.
#[derive(Debug)]
pub struct EdgeFeature {
    name: String,
    csr: CsrView,
    value_kind: Option<ValueKind>,
    pool: Option<Arc<StringPool>>,
    node_bound: u32,
    inverse: OnceLock<Inverse>,
}

impl EdgeFeature {
    /// Open from the CSR file. `value_kind` is `Some` when the catalog says
    /// the edge carries values; string-valued edges also get a pool.
    pub fn open(
        name: &str,
        csr_path: &Path,
        value_kind: Option<ValueKind>,
        pool: Option<Arc<StringPool>>,
        node_bound: u32,
    ) -> Result<EdgeFeature> {
        let csr = CsrView::open(csr_path, false)?;
        Ok(EdgeFeature {
            name: name.to_string(),
            csr,
            value_kind,
            pool,
            node_bound,
            inverse: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_kind(&self) -> Option<ValueKind> {
        self.value_kind
    }

    /// Total number of stored edges.
    pub fn edge_count(&self) -> usize {
        self.csr.value_count()
    }

    fn decode_value(&self, aux: i32) -> Option<Value> {
        if aux == ABSENT {
            return None;
        }
        match self.value_kind? {
            ValueKind::Int => Some(Value::Int(i64::from(aux))),
            ValueKind::Str => self
                .pool
                .as_ref()
                .and_then(|p| p.get(aux as u32))
                .map(Value::from),
        }
    }

    /// Outgoing edges of `node`: `(destination, value)` pairs in stored
    /// order, out-of-range destinations skipped.
    pub fn from(&self, node: Node) -> Vec<(Node, Option<Value>)> {
        if node == 0 {
            return Vec::new();
        }
        self.csr
            .row_with_aux(node as usize - 1)
            .filter(|&(dest, _)| dest >= 1 && dest <= self.node_bound)
            .map(|(dest, aux)| (dest, self.decode_value(aux)))
            .collect()
    }

    /// Incoming edges of `node`: `(source, value)` pairs, sources ascending.
    pub fn to(&self, node: Node) -> Vec<(Node, Option<Value>)> {
        if node == 0 || node > self.node_bound {
            return Vec::new();
        }
        let inv = self.inverse.get_or_init(|| self.build_inverse());
        let start = inv.offsets[node as usize - 1] as usize;
        let end = inv.offsets[node as usize] as usize;
        (start..end)
            .map(|i| (inv.sources[i], self.decode_value(inv.aux[i])))
            .collect()
    }

    /// Neighbors in both directions, deduplicated, ascending.
    pub fn both(&self, node: Node) -> Vec<Node> {
        let mut out: Vec<Node> = self
            .from(node)
            .into_iter()
            .map(|(n, _)| n)
            .chain(self.to(node).into_iter().map(|(n, _)| n))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Whether an edge `source -> dest` exists.
    pub fn has(&self, source: Node, dest: Node) -> bool {
        if source == 0 {
            return false;
        }
        self.csr.row(source as usize - 1).any(|d| d == dest)
    }

    /// The value of edge `source -> dest`; `None` when the edge is absent
    /// or carries no value.
    pub fn value_of(&self, source: Node, dest: Node) -> Option<Value> {
        if source == 0 {
            return None;
        }
        self.csr
            .row_with_aux(source as usize - 1)
            .find(|&(d, _)| d == dest)
            .and_then(|(_, aux)| self.decode_value(aux))
    }

    fn build_inverse(&self) -> Inverse {
        let n = self.node_bound as usize;
        let mut counts = vec![0u32; n + 1];
        for source in 0..self.csr.row_count() {
            for dest in self.csr.row(source) {
                if dest >= 1 && dest <= self.node_bound {
                    counts[dest as usize] += 1;
                }
            }
        }

        let mut offsets = vec![0u32; n + 1];
        for i in 1..=n {
            offsets[i] = offsets[i - 1] + counts[i];
        }
        let total = offsets[n] as usize;
        let mut sources = vec![0u32; total];
        let mut aux = vec![0i32; total];
        let mut cursor = offsets.clone();

        // Sources ascend per destination because we scan them in order.
        for source in 0..self.csr.row_count() {
            for (dest, a) in self.csr.row_with_aux(source) {
                if dest >= 1 && dest <= self.node_bound {
                    let at = cursor[dest as usize - 1] as usize;
                    sources[at] = source as u32 + 1;
                    aux[at] = a;
                    cursor[dest as usize - 1] += 1;
                }
            }
        }

        Inverse {
            offsets,
            sources,
            aux,
        }
    }

    pub fn check_integrity(&self) -> Result<()> {
        self.csr.check_integrity()
    }
}
