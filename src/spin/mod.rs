// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! SPIN: the pattern search engine.
//!
//! `S.search` takes a template, a return shape, and per-call options. The
//! pipeline is parse -> resolve/plan -> materialize -> join; the submodules
//! own one stage each. Results are tuples of node ids in template order,
//! deduplicated, and (for `Results`) parked in the result cache so a server
//! can page through them with cursors.

mod exec;
mod plan;
mod relation;
pub mod template;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{Cursor, Page, ResultCache};
use crate::error::Result;
use crate::store::FabricInner;
use crate::text::TextOp;
use crate::types::{Node, SectionRef};

pub(crate) use exec::Executor;

/// What a search call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnType {
    #[default]
    Results,
    Count,
    Statistics,
    Passages,
}

/// Per-call knobs. Everything is optional; the zero value means "all
/// results, no budget, not cancellable".
#[derive(Debug, Clone, Default)]
pub struct SearchOpts {
    /// Cap on returned tuples (`Results` only); the rest stays reachable
    /// through the returned cursor.
    pub limit: Option<usize>,
    /// Wall-clock budget; exceeding it fails with `Timeout`.
    pub budget: Option<Duration>,
    /// Cooperative cancel flag, checked at candidate-batch boundaries.
    pub cancel: Option<Arc<AtomicBool>>,
    /// Features to histogram under `Statistics`.
    pub aggregate_features: Vec<String>,
    /// Keep only the most frequent values per aggregated feature.
    pub top_n: Option<usize>,
}

/// Per-feature value histograms over the matched tuples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub total: u64,
    /// feature -> `(value, count)`, most frequent first.
    pub features: BTreeMap<String, Vec<(String, u64)>>,
}

/// One resolved passage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub node: Node,
    pub section: SectionRef,
    pub text: String,
}

/// The output of a search call.
#[derive(Debug, Clone)]
pub enum SearchOutput {
    Results {
        tuples: Vec<Vec<Node>>,
        /// Size of the full (cached) result set.
        total: usize,
        /// Present when `limit` left more tuples behind.
        cursor: Option<Cursor>,
    },
    Count(u64),
    Statistics(Stats),
    Passages(Vec<Passage>),
}

/// The `S` operator.
#[derive(Clone)]
pub struct SearchOp {
    pub(crate) fab: Arc<FabricInner>,
    pub(crate) cache: Arc<ResultCache>,
}

impl SearchOp {
    fn corpus_key(&self) -> String {
        format!("{}@v{}", self.fab.meta.name, self.fab.version)
    }

    /// Execute a template.
    pub fn search(
        &self,
        source: &str,
        return_type: ReturnType,
        opts: &SearchOpts,
    ) -> Result<SearchOutput> {
        let parsed = template::parse(source)?;
        debug!(
            atoms = parsed.atoms.len(),
            edges = parsed.edges.len(),
            ?return_type,
            "search"
        );
        let mut executor =
            Executor::new(Arc::clone(&self.fab), opts.budget, opts.cancel.clone());

        match return_type {
            ReturnType::Count => Ok(SearchOutput::Count(executor.count(&parsed)?)),
            ReturnType::Results => {
                // Opportunistic cache: a live handle for this exact template
                // serves pages without re-running the plan.
                let handle = match self.cache.lookup(&self.corpus_key(), source) {
                    Some(handle) => handle,
                    None => {
                        let tuples = dedup(executor.run(&parsed)?);
                        self.cache.insert(&self.corpus_key(), source, tuples)
                    }
                };
                let total = self.cache.len_of(handle).unwrap_or(0);
                let limit = opts.limit.unwrap_or(total);
                let page = self
                    .cache
                    .page(Cursor { handle, offset: 0 }, limit)
                    .unwrap_or(Page {
                        tuples: Vec::new(),
                        has_more: false,
                        expires_at: std::time::Instant::now(),
                        next: None,
                    });
                Ok(SearchOutput::Results {
                    tuples: page.tuples,
                    total,
                    cursor: page.next,
                })
            }
            ReturnType::Statistics => {
                let tuples = dedup(executor.run(&parsed)?);
                self.statistics(&tuples, opts)
            }
            ReturnType::Passages => {
                let tuples = dedup(executor.run(&parsed)?);
                self.passages(&tuples)
            }
        }
    }

    /// Fetch another page of a previous `Results` search. `offset`
    /// overrides the cursor position when given. `None` means the handle
    /// expired; re-run the search.
    pub fn search_continue(
        &self,
        cursor: Cursor,
        offset: Option<usize>,
        limit: usize,
    ) -> Option<Page> {
        let cursor = Cursor {
            handle: cursor.handle,
            offset: offset.unwrap_or(cursor.offset),
        };
        self.cache.page(cursor, limit)
    }

    fn statistics(&self, tuples: &[Vec<Node>], opts: &SearchOpts) -> Result<SearchOutput> {
        let mut features = BTreeMap::new();
        for name in &opts.aggregate_features {
            let handle = self.fab.feature(name)?;
            let mut histogram: HashMap<String, u64> = HashMap::new();
            for tuple in tuples {
                for &node in tuple {
                    if let Some(value) = handle.value(node) {
                        *histogram.entry(value.render()).or_insert(0) += 1;
                    }
                }
            }
            let mut counts: Vec<(String, u64)> = histogram.into_iter().collect();
            counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            if let Some(top_n) = opts.top_n {
                counts.truncate(top_n);
            }
            features.insert(name.clone(), counts);
        }
        Ok(SearchOutput::Statistics(Stats {
            total: tuples.len() as u64,
            features,
        }))
    }

    fn passages(&self, tuples: &[Vec<Node>]) -> Result<SearchOutput> {
        let text = TextOp {
            fab: Arc::clone(&self.fab),
        };
        let mut seen = HashSet::new();
        let mut passages = Vec::new();
        for tuple in tuples {
            let Some(&node) = tuple.first() else {
                continue;
            };
            if !seen.insert(node) {
                continue;
            }
            passages.push(Passage {
                node,
                section: text.section_ref(node)?,
                text: text.text(node, None)?,
            });
        }
        Ok(SearchOutput::Passages(passages))
    }
}

/// Drop duplicate tuples while preserving order. The join enumerates each
/// tuple once, but deduplication is part of the result contract, not an
/// optimization.
fn dedup(tuples: Vec<Vec<Node>>) -> Vec<Vec<Node>> {
    let mut seen: HashSet<Vec<Node>> = HashSet::with_capacity(tuples.len());
    tuples
        .into_iter()
        .filter(|tuple| seen.insert(tuple.clone()))
        .collect()
}
