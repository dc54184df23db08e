// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! The corpus compiler: from an importer's in-memory graph to a versioned
//! binary store.
//!
//! Compilation happens once per corpus version and is allowed to be
//! expensive; everything it emits exists to make repeated loads and queries
//! cheap. Output is deterministic: the same input produces byte-identical
//! files (map keys are sorted, string pools are sorted and deduplicated,
//! and every traversal below runs in a fixed order), so recompiling an
//! unchanged corpus can be verified by file comparison.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{FabricError, Result};
use crate::feature::{StringPool, ABSENT};
use crate::store::bytes::{write_i32_array, write_u32_array};
use crate::store::csr::CsrBuilder;
use crate::store::meta::{
    self, FeatureDecl, Meta, SectionConfig, TypeDecl, BOUNDARY_FILE, EDGES_DIR, FEATURES_DIR,
    FORMAT_VERSION, LEVELS_FILE, LEV_DOWN_FILE, LEV_UP_FILE, ORDER_FILE, OSLOTS_FILE, OTYPE_FILE,
    RANK_FILE, WARP_DIR,
};
use crate::types::{FeatureKind, Node, Value, ValueKind};
use crate::warp::compute::{self, Shape};

/// Values of one node feature, keyed by node. Nodes without an entry are
/// absent.
#[derive(Debug, Clone)]
pub enum NodeFeatureData {
    Int(BTreeMap<Node, i32>),
    Str(BTreeMap<Node, String>),
}

/// One edge feature: `(source, destination, value)` triples.
#[derive(Debug, Clone)]
pub struct EdgeFeatureData {
    /// `Some` when the edge carries values; all values must match the kind.
    pub value_kind: Option<ValueKind>,
    pub edges: Vec<(Node, Node, Option<Value>)>,
}

/// A corpus as handed over by the importer, ready to compile.
#[derive(Debug, Clone)]
pub struct RawCorpus {
    pub name: String,
    /// Type table; exactly one entry has `slot` set. Node numbering must
    /// put every type in one contiguous block, slots first.
    pub types: Vec<TypeDecl>,
    /// Type id per node, `otype[i]` belongs to node `i + 1`.
    pub otype: Vec<u16>,
    /// Ascending, duplicate-free slot list per non-slot node, starting at
    /// node `S + 1`.
    pub oslots: Vec<Vec<u32>>,
    pub node_features: BTreeMap<String, NodeFeatureData>,
    pub edge_features: BTreeMap<String, EdgeFeatureData>,
    pub formats: BTreeMap<String, String>,
    pub default_format: String,
    pub sections: SectionConfig,
}

impl RawCorpus {
    fn node_count(&self) -> u32 {
        self.otype.len() as u32
    }

    fn slot_count(&self) -> u32 {
        let slot_type = self.types.iter().position(|t| t.slot).unwrap_or(0) as u16;
        self.otype.iter().filter(|&&t| t == slot_type).count() as u32
    }
}

/// Compile a corpus into `<out_root>/v<version>/` and return that path.
pub fn compile(corpus: &RawCorpus, out_root: &Path, version: u32) -> Result<PathBuf> {
    let dir = out_root.join(format!("v{}", version));
    validate(corpus, &dir)?;

    let node_count = corpus.node_count();
    let slot_count = corpus.slot_count();
    info!(
        corpus = %corpus.name,
        nodes = node_count,
        slots = slot_count,
        "compiling store"
    );

    std::fs::create_dir_all(dir.join(WARP_DIR)).map_err(|e| FabricError::io(&dir, e))?;
    std::fs::create_dir_all(dir.join(FEATURES_DIR)).map_err(|e| FabricError::io(&dir, e))?;
    std::fs::create_dir_all(dir.join(EDGES_DIR)).map_err(|e| FabricError::io(&dir, e))?;

    // ---- warps -----------------------------------------------------------
    let type_levels: Vec<u32> = corpus.types.iter().map(|t| t.level).collect();
    let shape = Shape {
        node_count,
        slot_count,
        otype: &corpus.otype,
        oslots: &corpus.oslots,
        type_levels: &type_levels,
    };

    let (first, last) = compute::boundary(&shape);
    let order = compute::canonical_order(&shape, &first);
    let rank = compute::rank_from_order(&order);
    let levels = compute::levels(&shape, corpus.types.len())
        .map_err(|detail| FabricError::corrupt(&dir, detail))?;
    let lev_up = compute::lev_up(&shape, &first, &last, &rank);
    let lev_down = compute::lev_down(&lev_up, &rank);

    let otype_u32: Vec<u32> = corpus.otype.iter().map(|&t| u32::from(t)).collect();
    write_u32_array(&meta::warp_path(&dir, OTYPE_FILE), &otype_u32)?;

    let mut oslots = CsrBuilder::new();
    for row in &corpus.oslots {
        oslots.push_row(row.iter().copied());
    }
    oslots.write(&meta::warp_path(&dir, OSLOTS_FILE))?;

    write_u32_array(&meta::warp_path(&dir, ORDER_FILE), &order)?;
    write_u32_array(&meta::warp_path(&dir, RANK_FILE), &rank)?;

    let mut levels_flat = Vec::with_capacity(levels.len() * 3);
    for (min, max, count) in &levels {
        levels_flat.extend_from_slice(&[*min, *max, *count]);
    }
    write_u32_array(&meta::warp_path(&dir, LEVELS_FILE), &levels_flat)?;

    let mut boundary = first;
    boundary.extend_from_slice(&last);
    write_u32_array(&meta::warp_path(&dir, BOUNDARY_FILE), &boundary)?;

    let mut up = CsrBuilder::new();
    for row in &lev_up {
        up.push_row(row.iter().copied());
    }
    up.write(&meta::warp_path(&dir, LEV_UP_FILE))?;

    let mut down = CsrBuilder::new();
    for row in &lev_down {
        down.push_row(row.iter().copied());
    }
    down.write(&meta::warp_path(&dir, LEV_DOWN_FILE))?;

    // ---- features --------------------------------------------------------
    let mut catalog: BTreeMap<String, FeatureDecl> = BTreeMap::new();

    for (name, data) in &corpus.node_features {
        match data {
            NodeFeatureData::Int(cells) => {
                let mut dense = vec![ABSENT; node_count as usize];
                for (&node, &value) in cells {
                    check_node(node, node_count, &dir)?;
                    dense[node as usize - 1] = value;
                }
                write_i32_array(&meta::feature_bin_path(&dir, name), &dense)?;
                catalog.insert(
                    name.clone(),
                    FeatureDecl {
                        kind: FeatureKind::Node,
                        value: ValueKind::Int,
                        has_values: false,
                    },
                );
            }
            NodeFeatureData::Str(cells) => {
                let pool = StringPool::from_values(cells.values().cloned());
                let mut dense = vec![ABSENT; node_count as usize];
                for (&node, value) in cells {
                    check_node(node, node_count, &dir)?;
                    // from_values interned every value we are about to look up
                    dense[node as usize - 1] = pool.index_of(value).unwrap() as i32;
                }
                write_i32_array(&meta::feature_bin_path(&dir, name), &dense)?;
                pool.save(&meta::feature_str_path(&dir, name))?;
                catalog.insert(
                    name.clone(),
                    FeatureDecl {
                        kind: FeatureKind::Node,
                        value: ValueKind::Str,
                        has_values: false,
                    },
                );
            }
        }
    }

    for (name, data) in &corpus.edge_features {
        let mut by_source: BTreeMap<Node, Vec<(Node, Option<&Value>)>> = BTreeMap::new();
        for (src, dest, value) in &data.edges {
            check_node(*src, node_count, &dir)?;
            by_source
                .entry(*src)
                .or_default()
                .push((*dest, value.as_ref()));
        }
        for row in by_source.values_mut() {
            row.sort_by_key(|&(dest, _)| dest);
        }

        let pool = match data.value_kind {
            Some(ValueKind::Str) => {
                let pool = StringPool::from_values(data.edges.iter().filter_map(|(_, _, v)| {
                    v.as_ref().and_then(|v| v.as_str()).map(String::from)
                }));
                pool.save(&meta::edge_str_path(&dir, name))?;
                Some(pool)
            }
            _ => None,
        };

        let mut csr = CsrBuilder::with_aux();
        for source in 1..=node_count {
            let row = by_source.get(&source);
            csr.push_row_with_aux(row.into_iter().flatten().map(|&(dest, value)| {
                let aux = match (&data.value_kind, value) {
                    (Some(ValueKind::Int), Some(Value::Int(v))) => *v as i32,
                    (Some(ValueKind::Str), Some(Value::Str(s))) => {
                        pool.as_ref().and_then(|p| p.index_of(s)).map_or(ABSENT, |i| i as i32)
                    }
                    _ => ABSENT,
                };
                (dest, aux)
            }));
        }
        csr.write(&meta::edge_csr_path(&dir, name))?;
        catalog.insert(
            name.clone(),
            FeatureDecl {
                kind: FeatureKind::Edge,
                value: data.value_kind.unwrap_or(ValueKind::Int),
                has_values: data.value_kind.is_some(),
            },
        );
    }

    // ---- metadata --------------------------------------------------------
    let meta = Meta {
        format: FORMAT_VERSION,
        name: corpus.name.clone(),
        node_count,
        slot_count,
        types: corpus.types.clone(),
        features: catalog,
        formats: corpus.formats.clone(),
        default_format: corpus.default_format.clone(),
        sections: corpus.sections.clone(),
    };
    meta.save(&dir)?;

    info!(dir = %dir.display(), "store compiled");
    Ok(dir)
}

fn check_node(node: Node, node_count: u32, dir: &Path) -> Result<()> {
    if node == 0 || node > node_count {
        return Err(FabricError::ArrayOutOfRange {
            path: dir.to_path_buf(),
            index: u64::from(node),
            bound: u64::from(node_count),
        });
    }
    Ok(())
}

fn validate(corpus: &RawCorpus, dir: &Path) -> Result<()> {
    let node_count = corpus.node_count();
    if node_count == 0 {
        return Err(FabricError::corrupt(dir, "corpus has no nodes"));
    }
    let slot_types = corpus.types.iter().filter(|t| t.slot).count();
    if slot_types != 1 {
        return Err(FabricError::corrupt(
            dir,
            format!("{} slot types declared, need exactly 1", slot_types),
        ));
    }
    let slot_type = corpus.types.iter().position(|t| t.slot).unwrap() as u16;
    let slot_count = corpus.slot_count();
    if slot_count == 0 {
        return Err(FabricError::corrupt(dir, "corpus has no slots"));
    }

    // Slots are the contiguous prefix of the node range.
    for node in 1..=node_count {
        let is_slot_cell = corpus.otype[(node - 1) as usize] == slot_type;
        if is_slot_cell != (node <= slot_count) {
            return Err(FabricError::corrupt(
                dir,
                format!("slot nodes are not the contiguous prefix (node {})", node),
            ));
        }
    }

    if corpus.oslots.len() as u32 != node_count - slot_count {
        return Err(FabricError::corrupt(
            dir,
            format!(
                "{} slot lists for {} non-slot nodes",
                corpus.oslots.len(),
                node_count - slot_count
            ),
        ));
    }
    for (i, row) in corpus.oslots.iter().enumerate() {
        if row.is_empty() {
            return Err(FabricError::corrupt(
                dir,
                format!("node {} covers no slots", slot_count as usize + i + 1),
            ));
        }
        for pair in row.windows(2) {
            if pair[1] <= pair[0] {
                return Err(FabricError::corrupt(
                    dir,
                    format!(
                        "slot list of node {} is not ascending and duplicate-free",
                        slot_count as usize + i + 1
                    ),
                ));
            }
        }
        let last = *row.last().unwrap();
        if row[0] == 0 || last > slot_count {
            return Err(FabricError::ArrayOutOfRange {
                path: dir.to_path_buf(),
                index: u64::from(last),
                bound: u64::from(slot_count),
            });
        }
    }
    Ok(())
}
