// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! The backing store: a versioned directory of mapped arrays, and the
//! `Fabric` handle that owns the mappings.
//!
//! Opening a store parses `meta.json`, maps the skeleton (`otype`,
//! `oslots`) and the warps, and cross-checks every declared count against
//! the container headers. Features are NOT touched at open: each one is
//! materialized on first access and published once, after which the handle
//! is shared for the lifetime of the Fabric. All post-load state is
//! immutable; the caches below are the only mutable cells, and they only
//! ever go from empty to populated.
//!
//! Failure is loud. A corrupt or truncated file aborts the open with the
//! offending path; nothing falls back to other data sources.

pub mod bytes;
pub mod csr;
pub mod meta;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{FabricError, Result};
use crate::feature::{EdgeFeature, FeatureHandle, FreqTable, IntFeature, StrFeature, StringPool};
use crate::store::bytes::{ElemKind, IntArray};
use crate::store::csr::CsrView;
use crate::store::meta::{Meta, OSLOTS_FILE, OTYPE_FILE};
use crate::types::{FeatureKind, Node, TypeId, ValueKind};
use crate::warp::Warps;

/// Which features to materialize eagerly at `load`.
#[derive(Debug, Clone, Default)]
pub enum FeatureSpec {
    /// Every feature in the catalog.
    All,
    /// An explicit set of feature names.
    Names(Vec<String>),
    /// Nothing eagerly; everything materializes on first access.
    #[default]
    Lazy,
}

/// An open corpus. Cheap to clone; all clones share the mappings.
#[derive(Clone)]
pub struct Fabric {
    pub(crate) inner: Arc<FabricInner>,
}

pub(crate) struct FabricInner {
    pub dir: PathBuf,
    pub version: u32,
    pub meta: Meta,
    pub config: Config,
    pub otype: IntArray,
    pub oslots: CsrView,
    pub warps: Warps,
    features: RwLock<HashMap<String, Arc<FeatureHandle>>>,
    freqs: RwLock<HashMap<String, Arc<FreqTable>>>,
    type_walks: RwLock<HashMap<TypeId, Arc<Vec<Node>>>>,
}

impl Fabric {
    /// Open a corpus at `path`, selecting `version` or the highest one
    /// present.
    pub fn open(path: &Path, version: Option<u32>) -> Result<Fabric> {
        Self::open_with_config(path, version, Config::from_env())
    }

    /// Open with an explicit configuration (tests, embedders).
    pub fn open_with_config(path: &Path, version: Option<u32>, config: Config) -> Result<Fabric> {
        let version = match version {
            Some(v) => v,
            None => latest_version(path)?,
        };
        let dir = path.join(format!("v{}", version));
        let meta = Meta::load(&dir)?;

        let otype = IntArray::open(&meta::warp_path(&dir, OTYPE_FILE), ElemKind::U32, false)?;
        if otype.len() != meta.node_count as usize {
            return Err(FabricError::corrupt(
                meta::warp_path(&dir, OTYPE_FILE),
                format!(
                    "{} elements where {} nodes were declared",
                    otype.len(),
                    meta.node_count
                ),
            ));
        }
        let type_count = meta.types.len() as u32;
        for (i, t) in otype.iter_u32().enumerate() {
            if t >= type_count {
                return Err(FabricError::ArrayOutOfRange {
                    path: meta::warp_path(&dir, OTYPE_FILE),
                    index: i as u64,
                    bound: u64::from(type_count),
                });
            }
        }

        let oslots = CsrView::open(&meta::warp_path(&dir, OSLOTS_FILE), false)?;
        let non_slots = (meta.node_count - meta.slot_count) as usize;
        if oslots.row_count() != non_slots {
            return Err(FabricError::corrupt(
                meta::warp_path(&dir, OSLOTS_FILE),
                format!(
                    "{} rows where {} non-slot nodes were declared",
                    oslots.row_count(),
                    non_slots
                ),
            ));
        }
        for row in 0..oslots.row_count() {
            for slot in oslots.row(row) {
                if slot == 0 || slot > meta.slot_count {
                    return Err(FabricError::ArrayOutOfRange {
                        path: meta::warp_path(&dir, OSLOTS_FILE),
                        index: u64::from(slot),
                        bound: u64::from(meta.slot_count),
                    });
                }
            }
        }

        let warps = Warps::load(&dir, meta.node_count, meta.types.len(), &config)?;

        info!(
            corpus = %meta.name,
            version,
            nodes = meta.node_count,
            slots = meta.slot_count,
            features = meta.features.len(),
            "store opened"
        );

        Ok(Fabric {
            inner: Arc::new(FabricInner {
                dir,
                version,
                meta,
                config,
                otype,
                oslots,
                warps,
                features: RwLock::new(HashMap::new()),
                freqs: RwLock::new(HashMap::new()),
                type_walks: RwLock::new(HashMap::new()),
            }),
        })
    }

    pub fn meta(&self) -> &Meta {
        &self.inner.meta
    }

    pub fn version(&self) -> u32 {
        self.inner.version
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Full integrity pass: checksum every container in the store and open
    /// every cataloged feature. Expensive by design.
    pub fn verify(&self) -> Result<()> {
        self.inner.otype.check_integrity()?;
        self.inner.oslots.check_integrity()?;
        self.inner.warps.check_integrity()?;
        for name in self.inner.meta.features.keys() {
            let handle = self.inner.feature(name)?;
            match handle.as_ref() {
                FeatureHandle::Int(f) => f.check_integrity()?,
                FeatureHandle::Str(f) => f.check_integrity()?,
                FeatureHandle::Edge(f) => f.check_integrity()?,
            }
        }
        Ok(())
    }
}

impl FabricInner {
    /// Type of a node; `None` out of range.
    #[inline]
    pub fn type_of(&self, node: Node) -> Option<TypeId> {
        if node == 0 {
            return None;
        }
        self.otype
            .get_u32(node as usize - 1)
            .map(|t| TypeId(t as u16))
    }

    #[inline]
    pub fn is_slot(&self, node: Node) -> bool {
        node >= 1 && node <= self.meta.slot_count
    }

    #[inline]
    pub fn in_range(&self, node: Node) -> bool {
        node >= 1 && node <= self.meta.node_count
    }

    /// Number of slots covered by a node; 0 out of range.
    pub fn span(&self, node: Node) -> u32 {
        if !self.in_range(node) {
            0
        } else if self.is_slot(node) {
            1
        } else {
            self.oslots.row_len((node - self.meta.slot_count - 1) as usize) as u32
        }
    }

    /// The ascending slot list of a node.
    pub fn slots(&self, node: Node) -> Vec<u32> {
        if !self.in_range(node) {
            Vec::new()
        } else if self.is_slot(node) {
            vec![node]
        } else {
            self.oslots.row_vec((node - self.meta.slot_count - 1) as usize)
        }
    }

    /// Resolve a type name or fail with `UnknownType`.
    pub fn type_id(&self, name: &str) -> Result<TypeId> {
        self.meta
            .type_id(name)
            .ok_or_else(|| FabricError::UnknownType {
                name: name.to_string(),
            })
    }

    /// The lazily materialized handle for a feature. First caller opens
    /// and publishes; everyone else gets the shared handle.
    pub fn feature(&self, name: &str) -> Result<Arc<FeatureHandle>> {
        if let Some(handle) = self.features.read().get(name) {
            return Ok(Arc::clone(handle));
        }

        let decl = self.meta.feature_decl(name)?.clone();
        let handle = Arc::new(self.open_feature(name, &decl)?);

        let mut guard = self.features.write();
        // Another thread may have published while we were opening; the
        // first insert wins so every caller sees one handle.
        let entry = guard
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&handle));
        Ok(Arc::clone(entry))
    }

    fn open_feature(&self, name: &str, decl: &meta::FeatureDecl) -> Result<FeatureHandle> {
        debug!(feature = name, "materializing feature");
        match decl.kind {
            FeatureKind::Node => {
                let bin = meta::feature_bin_path(&self.dir, name);
                if !bin.exists() {
                    return Err(FabricError::MissingFeature {
                        name: name.to_string(),
                        path: bin,
                    });
                }
                match decl.value {
                    ValueKind::Int => Ok(FeatureHandle::Int(IntFeature::open(name, &bin)?)),
                    ValueKind::Str => {
                        let strs = meta::feature_str_path(&self.dir, name);
                        if !strs.exists() {
                            return Err(FabricError::MissingFeature {
                                name: name.to_string(),
                                path: strs,
                            });
                        }
                        Ok(FeatureHandle::Str(StrFeature::open(name, &bin, &strs)?))
                    }
                }
            }
            FeatureKind::Edge => {
                let csr = meta::edge_csr_path(&self.dir, name);
                if !csr.exists() {
                    return Err(FabricError::MissingFeature {
                        name: name.to_string(),
                        path: csr,
                    });
                }
                let (value_kind, pool) = if decl.has_values {
                    let pool = match decl.value {
                        ValueKind::Str => Some(Arc::new(StringPool::load(
                            &meta::edge_str_path(&self.dir, name),
                        )?)),
                        ValueKind::Int => None,
                    };
                    (Some(decl.value), pool)
                } else {
                    (None, None)
                };
                Ok(FeatureHandle::Edge(EdgeFeature::open(
                    name,
                    &csr,
                    value_kind,
                    pool,
                    self.meta.node_count,
                )?))
            }
        }
    }

    /// Exact frequency table of a feature, computed once and published.
    pub fn freq(&self, name: &str) -> Result<Arc<FreqTable>> {
        if let Some(table) = self.freqs.read().get(name) {
            return Ok(Arc::clone(table));
        }
        let handle = self.feature(name)?;
        let table = Arc::new(handle.freq());
        let mut guard = self.freqs.write();
        let entry = guard
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&table));
        Ok(Arc::clone(entry))
    }

    /// Nodes of one type in canonical (rank) order, built once per type.
    pub fn type_nodes_by_rank(&self, ty: TypeId) -> Arc<Vec<Node>> {
        if let Some(nodes) = self.type_walks.read().get(&ty) {
            return Arc::clone(nodes);
        }
        let mut nodes: Vec<Node> = self
            .warps
            .level(ty)
            .map(|range| range.nodes().collect())
            .unwrap_or_default();
        nodes.sort_by_key(|&n| self.warps.rank_of(n));
        let nodes = Arc::new(nodes);
        let mut guard = self.type_walks.write();
        let entry = guard.entry(ty).or_insert_with(|| Arc::clone(&nodes));
        Arc::clone(entry)
    }
}

/// Pick the highest `v{N}` directory under a corpus path.
fn latest_version(path: &Path) -> Result<u32> {
    let entries = std::fs::read_dir(path).map_err(|e| FabricError::io(path, e))?;
    let mut best: Option<u32> = None;
    for entry in entries {
        let entry = entry.map_err(|e| FabricError::io(path, e))?;
        let name = entry.file_name();
        let Some(rest) = name.to_str().and_then(|s| s.strip_prefix('v')) else {
            continue;
        };
        if let Ok(v) = rest.parse::<u32>() {
            best = Some(best.map_or(v, |b| b.max(v)));
        }
    }
    best.ok_or_else(|| FabricError::corrupt(path, "no versioned store directory (v<N>) found"))
}
