// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! The spinning executor.
//!
//! Execution is candidate narrowing: every atom gets an initial candidate
//! set from its type range and vectorized feature filters, then atoms are
//! bound in spin order. At each depth the bound neighbors restrict the
//! next atom through the precomputed relations (support sets), surviving
//! candidates are verified against every relation edge, and quantifiers
//! run as nested solves with the fresh binding pinned.
//!
//! The cancel flag and the wall-clock budget are checked once per 1024
//! candidate probes. Tuples come out in template order no matter what the
//! spin order was.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{FabricError, Result};
use crate::spin::plan::{plan, Plan};
use crate::spin::relation::{holds, support};
use crate::spin::template::{Pred, Quant, Template};
use crate::store::FabricInner;
use crate::types::Node;

/// Candidate probes between cancel/budget checks.
const PROBE_BATCH: u32 = 1024;

/// Where solved tuples go.
enum Sink<'s> {
    /// Collect tuples, optionally stopping at a cap.
    Tuples {
        out: &'s mut Vec<Vec<Node>>,
        cap: Option<usize>,
    },
    /// Running total only; tuples are never materialized.
    Count(&'s mut u64),
    /// Stop at the first match.
    Exists(&'s mut bool),
}

impl Sink<'_> {
    /// Deliver one tuple; `false` stops the search.
    fn deliver(&mut self, tuple: &[Option<Node>]) -> bool {
        match self {
            Sink::Tuples { out, cap } => {
                out.push(tuple.iter().map(|b| b.unwrap_or(0)).collect());
                cap.is_none_or(|cap| out.len() < cap)
            }
            Sink::Count(total) => {
                **total += 1;
                true
            }
            Sink::Exists(found) => {
                **found = true;
                false
            }
        }
    }
}

/// One query run: shared store, deadline, cancel flag, probe counter.
pub(crate) struct Executor {
    fab: Arc<FabricInner>,
    started: Instant,
    budget: Option<Duration>,
    cancel: Option<Arc<AtomicBool>>,
    probes: u32,
}

impl Executor {
    pub(crate) fn new(
        fab: Arc<FabricInner>,
        budget: Option<Duration>,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Executor {
        let budget = budget.or(fab.config.query_budget);
        Executor {
            fab,
            started: Instant::now(),
            budget,
            cancel,
            probes: 0,
        }
    }

    /// Solve a template and collect every tuple (template order).
    pub(crate) fn run(&mut self, template: &Template) -> Result<Vec<Vec<Node>>> {
        let mut out = Vec::new();
        let mut sink = Sink::Tuples {
            out: &mut out,
            cap: None,
        };
        self.solve(template, None, &[], &mut sink)?;
        Ok(out)
    }

    /// Solve a template counting matches without materializing tuples.
    pub(crate) fn count(&mut self, template: &Template) -> Result<u64> {
        let mut total = 0u64;
        let mut sink = Sink::Count(&mut total);
        self.solve(template, None, &[], &mut sink)?;
        Ok(total)
    }

    /// Candidate-batch probe: consults the signals every 1024 calls.
    fn checkpoint(&mut self) -> Result<()> {
        self.probes = self.probes.wrapping_add(1);
        if self.probes % PROBE_BATCH != 0 {
            return Ok(());
        }
        self.check_signals()
    }

    /// Chunk-boundary probe: always consults the signals.
    fn check_signals(&self) -> Result<()> {
        if let Some(cancel) = &self.cancel {
            if cancel.load(Ordering::Relaxed) {
                return Err(FabricError::Cancelled);
            }
        }
        if let Some(budget) = self.budget {
            let elapsed = self.started.elapsed();
            if elapsed >= budget {
                return Err(FabricError::Timeout {
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    /// Solve `template`, optionally inside a pinned node (quantifier
    /// bodies) and with some atoms pre-bound (`fixed`, by atom index).
    fn solve(
        &mut self,
        template: &Template,
        pinned: Option<Node>,
        fixed: &[Option<Node>],
        sink: &mut Sink,
    ) -> Result<()> {
        if template.atoms.is_empty() {
            return Ok(());
        }
        self.check_signals()?;
        let compiled = plan(template, &self.fab)?;

        let mut initial: Vec<Vec<Node>> = Vec::with_capacity(template.atoms.len());
        for idx in 0..template.atoms.len() {
            let candidates = self.materialize(template, &compiled, idx, pinned, fixed)?;
            // A plan that cannot bind an atom yields an empty result, not
            // an error.
            if candidates.is_empty() {
                return Ok(());
            }
            initial.push(candidates);
        }

        let mut bindings: Vec<Option<Node>> = vec![None; template.atoms.len()];
        self.join(template, &compiled, &initial, 0, &mut bindings, sink)?;
        Ok(())
    }

    /// Initial candidate set of one atom: type range, then bulk feature
    /// filters, then the scalar regex fallback, ascending by node id.
    fn materialize(
        &mut self,
        template: &Template,
        compiled: &Plan,
        idx: usize,
        pinned: Option<Node>,
        fixed: &[Option<Node>],
    ) -> Result<Vec<Node>> {
        let atom = &template.atoms[idx];

        if let Some(Some(node)) = fixed.get(idx) {
            return Ok(vec![*node]);
        }

        let mut candidates: Vec<Node> = match &atom.type_name {
            Some(name) => {
                let ty = self.fab.type_id(name)?;
                self.fab
                    .warps
                    .level(ty)
                    .map(|r| r.nodes().collect())
                    .unwrap_or_default()
            }
            None => (1..=self.fab.meta.node_count).collect(),
        };

        let mut re_index = 0;
        for pred in &atom.preds {
            candidates = match pred {
                Pred::Eq { feature, values } => {
                    let handle = self.fab.feature(feature)?;
                    let refs: Vec<&str> = values.iter().map(String::as_str).collect();
                    handle.filter_eq_lits(&candidates, &refs)
                }
                Pred::Ne { feature, value } => {
                    self.fab.feature(feature)?.filter_ne_lit(&candidates, value)
                }
                Pred::Present { feature } => {
                    self.fab.feature(feature)?.filter_present(&candidates)
                }
                Pred::Absent { feature } => {
                    self.fab.feature(feature)?.filter_absent(&candidates)
                }
                Pred::Re { feature, .. } => {
                    let handle = self.fab.feature(feature)?;
                    let re = &compiled.regexes[idx][re_index];
                    re_index += 1;
                    candidates
                        .iter()
                        .copied()
                        .filter(|&n| {
                            handle
                                .value(n)
                                .is_some_and(|v| re.is_match(&v.render()))
                        })
                        .collect()
                }
            };
            if candidates.is_empty() {
                return Ok(candidates);
            }
        }

        // Top-level atoms of a quantifier body live inside the pinned node.
        if let Some(pin) = pinned {
            if atom.parent.is_none() {
                candidates.retain(|&n| self.fab.warps.embedded_in(n, pin));
            }
        }

        Ok(candidates)
    }

    fn join(
        &mut self,
        template: &Template,
        compiled: &Plan,
        initial: &[Vec<Node>],
        depth: usize,
        bindings: &mut Vec<Option<Node>>,
        sink: &mut Sink,
    ) -> Result<bool> {
        if depth == compiled.spin_order.len() {
            return Ok(sink.deliver(bindings));
        }
        let idx = compiled.spin_order[depth];
        let atom = &template.atoms[idx];

        // Relations whose other side is already bound.
        let mut constraints: Vec<(crate::spin::template::RelOp, Node, bool)> = Vec::new();
        for edge in &template.edges {
            let (other, target_is_left) = if edge.left == idx {
                (edge.right, true)
            } else if edge.right == idx {
                (edge.left, false)
            } else {
                continue;
            };
            if let Some(bound) = bindings[other] {
                constraints.push((edge.op, bound, target_is_left));
            }
        }

        // Iterate the narrowest set available: the smallest support set a
        // bound neighbor offers, or the atom's own initial set.
        let mut base: Option<Vec<Node>> = None;
        for &(op, bound, target_is_left) in &constraints {
            if let Some(set) = support(&self.fab, op, bound, target_is_left) {
                if base.as_ref().is_none_or(|b| set.len() < b.len()) {
                    base = Some(set);
                }
            }
        }
        let own = &initial[idx];
        let from_support = base.is_some();
        let base = base.unwrap_or_else(|| own.clone());

        for candidate in base {
            self.checkpoint()?;

            // Membership in the atom's own candidate set (binary search;
            // initial sets are ascending by construction).
            if from_support && own.binary_search(&candidate).is_err() {
                continue;
            }
            let satisfied = constraints.iter().all(|&(op, bound, target_is_left)| {
                if target_is_left {
                    holds(&self.fab, op, candidate, bound)
                } else {
                    holds(&self.fab, op, bound, candidate)
                }
            });
            if !satisfied {
                continue;
            }

            // Quantifiers run with the principal binding fixed.
            let mut quantified = true;
            for quant in &atom.quants {
                if !self.quant_holds(quant, candidate)? {
                    quantified = false;
                    break;
                }
            }
            if !quantified {
                continue;
            }

            bindings[idx] = Some(candidate);
            let keep_going = self.join(template, compiled, initial, depth + 1, bindings, sink)?;
            bindings[idx] = None;
            if !keep_going {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn exists(
        &mut self,
        template: &Template,
        pinned: Option<Node>,
        fixed: &[Option<Node>],
    ) -> Result<bool> {
        let mut found = false;
        let mut sink = Sink::Exists(&mut found);
        self.solve(template, pinned, fixed, &mut sink)?;
        Ok(found)
    }

    fn quant_holds(&mut self, quant: &Quant, pinned: Node) -> Result<bool> {
        match quant {
            Quant::Without(body) => Ok(!self.exists(body, Some(pinned), &[])?),
            Quant::With(alternatives) => {
                for body in alternatives {
                    if self.exists(body, Some(pinned), &[])? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Quant::Where { body, have_start } => {
                // Every binding of the condition prefix must extend to a
                // full binding of condition + consequence.
                let prefix = prefix_template(body, *have_start);
                let mut condition_bindings = Vec::new();
                let mut sink = Sink::Tuples {
                    out: &mut condition_bindings,
                    cap: None,
                };
                self.solve(&prefix, Some(pinned), &[], &mut sink)?;

                for binding in condition_bindings {
                    let mut fixed: Vec<Option<Node>> = vec![None; body.atoms.len()];
                    for (slot, node) in fixed.iter_mut().zip(binding.iter()) {
                        *slot = Some(*node);
                    }
                    if !self.exists(body, Some(pinned), &fixed)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

/// The condition part of a `/where/` body: its first `have_start` atoms
/// and the edges among them.
fn prefix_template(body: &Template, have_start: usize) -> Template {
    Template {
        atoms: body.atoms[..have_start].to_vec(),
        edges: body
            .edges
            .iter()
            .copied()
            .filter(|e| e.left < have_start && e.right < have_start)
            .collect(),
    }
}
