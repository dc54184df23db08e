// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! `meta.json`: the one human-readable file in a store.
//!
//! It declares everything the binary arrays cannot say for themselves: node
//! and slot counts, the type table with its level order, the feature
//! catalog, text formats, and the section structure. The loader trusts this
//! file only as far as the arrays agree with it; every count is re-checked
//! against the container headers at open.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FabricError, Result};
use crate::types::{FeatureKind, TypeId, ValueKind};

/// Store format version written by this build.
pub const FORMAT_VERSION: u32 = 1;

/// File names inside a version directory.
pub const META_FILE: &str = "meta.json";
pub const WARP_DIR: &str = "warp";
pub const FEATURES_DIR: &str = "features";
pub const EDGES_DIR: &str = "edges";
pub const OTYPE_FILE: &str = "otype.bin";
pub const OSLOTS_FILE: &str = "oslots.csr";
pub const ORDER_FILE: &str = "order.bin";
pub const RANK_FILE: &str = "rank.bin";
pub const LEVELS_FILE: &str = "levels.bin";
pub const LEV_UP_FILE: &str = "levUp.csr";
pub const LEV_DOWN_FILE: &str = "levDown.csr";
pub const BOUNDARY_FILE: &str = "boundary.bin";

/// One entry in the type table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    /// Position in the level order: lower = more embedding. The slot type
    /// carries the highest level.
    pub level: u32,
    /// Whether this is the slot type. Exactly one entry has this set.
    #[serde(default)]
    pub slot: bool,
}

/// One entry in the feature catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDecl {
    pub kind: FeatureKind,
    pub value: ValueKind,
    /// For edge features: whether a parallel value array is stored.
    #[serde(default)]
    pub has_values: bool,
}

/// Section structure: parallel lists of section types (outermost first) and
/// the features that label them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub types: Vec<String>,
    pub features: Vec<String>,
}

/// The parsed metadata descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub format: u32,
    pub name: String,
    pub node_count: u32,
    pub slot_count: u32,
    pub types: Vec<TypeDecl>,
    pub features: BTreeMap<String, FeatureDecl>,
    /// Named text format templates, e.g. `{g_word_utf8}{trailer_utf8}`.
    pub formats: BTreeMap<String, String>,
    pub default_format: String,
    pub sections: SectionConfig,
}

impl Meta {
    /// Read and structurally validate `meta.json` from a version directory.
    pub fn load(dir: &Path) -> Result<Meta> {
        let path = dir.join(META_FILE);
        let bytes = std::fs::read(&path).map_err(|e| FabricError::io(&path, e))?;
        let meta: Meta = serde_json::from_slice(&bytes)
            .map_err(|e| FabricError::corrupt(&path, format!("invalid metadata: {}", e)))?;

        if meta.format != FORMAT_VERSION {
            return Err(FabricError::VersionMismatch {
                path,
                found: meta.format,
                supported: FORMAT_VERSION,
            });
        }
        meta.validate(&path)?;
        Ok(meta)
    }

    /// Write `meta.json` with stable key ordering.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(META_FILE);
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| FabricError::corrupt(&path, format!("metadata serialization: {}", e)))?;
        std::fs::write(&path, json).map_err(|e| FabricError::io(&path, e))
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let slot_types = self.types.iter().filter(|t| t.slot).count();
        if slot_types != 1 {
            return Err(FabricError::corrupt(
                path,
                format!("{} slot types declared, need exactly 1", slot_types),
            ));
        }
        if self.slot_count == 0 || self.slot_count > self.node_count {
            return Err(FabricError::corrupt(
                path,
                format!(
                    "slot count {} incompatible with node count {}",
                    self.slot_count, self.node_count
                ),
            ));
        }
        if self.sections.types.len() != self.sections.features.len() {
            return Err(FabricError::corrupt(
                path,
                "section types and section features differ in length",
            ));
        }
        for ty in &self.sections.types {
            if self.type_id(ty).is_none() {
                return Err(FabricError::corrupt(
                    path,
                    format!("section type '{}' not in the type table", ty),
                ));
            }
        }
        if !self.formats.contains_key(&self.default_format) {
            return Err(FabricError::corrupt(
                path,
                format!("default format '{}' not declared", self.default_format),
            ));
        }
        Ok(())
    }

    /// Resolve a type name to its id.
    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| t.name == name)
            .map(|i| TypeId(i as u16))
    }

    /// The type declaration for an id, if in range.
    pub fn type_decl(&self, id: TypeId) -> Option<&TypeDecl> {
        self.types.get(id.as_usize())
    }

    /// The slot type's id.
    pub fn slot_type(&self) -> TypeId {
        // validate() guarantees exactly one
        let i = self.types.iter().position(|t| t.slot).unwrap_or(0);
        TypeId(i as u16)
    }

    /// Level-order position of a type (lower = more embedding).
    pub fn level_of(&self, id: TypeId) -> u32 {
        self.type_decl(id).map_or(u32::MAX, |t| t.level)
    }

    /// The feature declaration, or `UnknownFeature`.
    pub fn feature_decl(&self, name: &str) -> Result<&FeatureDecl> {
        self.features
            .get(name)
            .ok_or_else(|| FabricError::UnknownFeature {
                name: name.to_string(),
            })
    }
}

// ============================================================================
// PATHS
// ============================================================================

/// Path of a warp file inside a version directory.
pub fn warp_path(dir: &Path, file: &str) -> PathBuf {
    dir.join(WARP_DIR).join(file)
}

/// Path of a node feature's dense array.
pub fn feature_bin_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(FEATURES_DIR).join(format!("{}.bin", name))
}

/// Path of a string feature's JSON pool.
pub fn feature_str_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(FEATURES_DIR).join(format!("{}.str", name))
}

/// Path of an edge feature's CSR.
pub fn edge_csr_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(EDGES_DIR).join(format!("{}.csr", name))
}

/// Path of a string-valued edge feature's JSON pool.
pub fn edge_str_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(EDGES_DIR).join(format!("{}.str", name))
}
