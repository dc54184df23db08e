// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! The public facade: one `Api` per loaded corpus, grouping the six
//! operator objects.
//!
//! `N`, `L`, `T`, `S` are stateless views over the Fabric; `F` and `E`
//! are accessors into the lazily materialized feature handles. None of the
//! operators own data: dropping the Api and the Fabric releases the store.

use std::sync::Arc;

use crate::cache::ResultCache;
use crate::error::{FabricError, Result};
use crate::feature::{FeatureHandle, FreqTable};
use crate::nav::{LocalityOp, NodesOp};
use crate::spin::{Passage, SearchOp};
use crate::store::{Fabric, FabricInner, FeatureSpec};
use crate::text::TextOp;
use crate::types::Value;

/// The operator facade over one open corpus.
#[derive(Clone)]
pub struct Api {
    /// Canonical-order walks.
    pub n: NodesOp,
    /// Locality: embedders, embeddees, same-type neighbors.
    pub l: LocalityOp,
    /// Text assembly and section references.
    pub t: TextOp,
    /// Pattern search.
    pub s: SearchOp,
    fab: Arc<FabricInner>,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api").finish_non_exhaustive()
    }
}

impl Fabric {
    /// Build the operator facade, materializing features per `spec`.
    ///
    /// The empty spec loads nothing eagerly; every feature still
    /// materializes transparently on first access.
    pub fn load(&self, spec: &FeatureSpec) -> Result<Api> {
        match spec {
            FeatureSpec::All => {
                for name in self.inner.meta.features.keys() {
                    self.inner.feature(name)?;
                }
            }
            FeatureSpec::Names(names) => {
                for name in names {
                    self.inner.feature(name)?;
                }
            }
            FeatureSpec::Lazy => {}
        }

        let fab = Arc::clone(&self.inner);
        Ok(Api {
            n: NodesOp {
                fab: Arc::clone(&fab),
            },
            l: LocalityOp {
                fab: Arc::clone(&fab),
            },
            t: TextOp {
                fab: Arc::clone(&fab),
            },
            s: SearchOp {
                fab: Arc::clone(&fab),
                cache: Arc::new(ResultCache::default()),
            },
            fab,
        })
    }
}

impl Api {
    /// The `F` operator: a node feature by name.
    pub fn f(&self, name: &str) -> Result<Arc<FeatureHandle>> {
        let handle = self.fab.feature(name)?;
        if handle.is_node_feature() {
            Ok(handle)
        } else {
            Err(FabricError::UnknownFeature {
                name: name.to_string(),
            })
        }
    }

    /// The `E` operator: an edge feature by name. The returned handle's
    /// `as_edge` view carries `f`/`t`/`b` traversal.
    pub fn e(&self, name: &str) -> Result<Arc<FeatureHandle>> {
        let handle = self.fab.feature(name)?;
        if handle.as_edge().is_some() {
            Ok(handle)
        } else {
            Err(FabricError::UnknownFeature {
                name: name.to_string(),
            })
        }
    }

    /// Exact value frequencies of a node feature.
    pub fn freq_list(&self, name: &str) -> Result<Arc<FreqTable>> {
        self.fab.freq(name)
    }

    /// Resolve one section reference (outermost labels first) to its node
    /// and rendered text.
    pub fn passage(&self, labels: &[Value]) -> Result<Option<Passage>> {
        let Some(node) = self.t.section_node(labels)? else {
            return Ok(None);
        };
        Ok(Some(Passage {
            node,
            section: self.t.section_ref(node)?,
            text: self.t.text(node, None)?,
        }))
    }

    /// Batch passage lookup; unresolvable references are skipped.
    pub fn get_passages(&self, refs: &[Vec<Value>]) -> Result<Vec<Passage>> {
        let mut out = Vec::with_capacity(refs.len());
        for labels in refs {
            if let Some(passage) = self.passage(labels)? {
                out.push(passage);
            }
        }
        Ok(out)
    }
}
