// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Query planning: name resolution, cardinality estimation, spin order.
//!
//! The estimate for an atom is `|T| * Π selectivity(pred)`, with
//! selectivities taken from the exact per-feature frequency tables. The
//! spin order is greedy: start at the cheapest atom, then repeatedly take
//! the unvisited atom whose estimate, conditioned by relations to already
//! chosen neighbors, is smallest. Ties fall back to template order, which
//! keeps plans deterministic and results reproducible.

use regex::Regex;

use crate::error::{FabricError, NameKind, Result};
use crate::spin::relation::narrowing_factor;
use crate::spin::template::{Atom, Pred, Quant, Template};
use crate::store::FabricInner;

/// A compiled plan for one template.
#[derive(Debug)]
pub struct Plan {
    /// Atom indices in the order they are materialized and joined.
    pub spin_order: Vec<usize>,
    /// Estimated candidate count per atom (template order).
    pub estimates: Vec<f64>,
    /// Compiled regexes per atom, in `~` predicate order.
    pub regexes: Vec<Vec<Regex>>,
}

/// Resolve names, compile regexes, estimate, and order the atoms.
pub(crate) fn plan(template: &Template, fab: &FabricInner) -> Result<Plan> {
    resolve_names(template, fab)?;

    let node_count = f64::from(fab.meta.node_count);
    let mut estimates = Vec::with_capacity(template.atoms.len());
    let mut regexes = Vec::with_capacity(template.atoms.len());

    for atom in &template.atoms {
        let base = match &atom.type_name {
            Some(name) => {
                let ty = fab.type_id(name)?;
                fab.warps.level(ty).map_or(0.0, |r| f64::from(r.count))
            }
            None => node_count,
        };

        let mut estimate = base;
        let mut compiled = Vec::new();
        for pred in &atom.preds {
            estimate *= selectivity(pred, base, fab)?;
            if let Pred::Re { pattern, .. } = pred {
                let re = Regex::new(pattern).map_err(|e| FabricError::TemplateParse {
                    line: atom.line,
                    col: 1,
                    expected: "a valid regular expression".to_string(),
                    found: format!("{} ({})", pattern, e),
                })?;
                compiled.push(re);
            }
        }
        estimates.push(estimate);
        regexes.push(compiled);
    }

    let spin_order = greedy_order(template, &estimates);
    Ok(Plan {
        spin_order,
        estimates,
        regexes,
    })
}

fn selectivity(pred: &Pred, type_count: f64, fab: &FabricInner) -> Result<f64> {
    if type_count <= 0.0 {
        return Ok(0.0);
    }
    let node_count = f64::from(fab.meta.node_count);
    Ok(match pred {
        Pred::Eq { feature, values } => {
            let freq = fab.freq(feature)?;
            let matched: u64 = values.iter().map(|v| u64::from(freq.count_of(v))).sum();
            (matched as f64 / type_count).min(1.0)
        }
        Pred::Ne { feature, value } => {
            let freq = fab.freq(feature)?;
            let matched = f64::from(freq.count_of(value));
            (1.0 - matched / type_count).clamp(0.0, 1.0)
        }
        // Regex matches are not in the histogram; assume half survive.
        Pred::Re { .. } => 0.5,
        Pred::Present { feature } => {
            let freq = fab.freq(feature)?;
            (freq.total() as f64 / node_count).min(1.0)
        }
        Pred::Absent { feature } => {
            let freq = fab.freq(feature)?;
            (1.0 - freq.total() as f64 / node_count).clamp(0.0, 1.0)
        }
    })
}

fn greedy_order(template: &Template, estimates: &[f64]) -> Vec<usize> {
    let n = template.atoms.len();
    let mut order = Vec::with_capacity(n);
    let mut visited = vec![false; n];

    while order.len() < n {
        let mut best: Option<(f64, usize)> = None;
        for idx in 0..n {
            if visited[idx] {
                continue;
            }
            let mut conditioned = estimates[idx];
            for edge in &template.edges {
                let other = if edge.left == idx {
                    edge.right
                } else if edge.right == idx {
                    edge.left
                } else {
                    continue;
                };
                if visited[other] {
                    conditioned *= narrowing_factor(edge.op);
                }
            }
            // Strict < keeps ties on the earliest template index.
            if best.is_none_or(|(cost, _)| conditioned < cost) {
                best = Some((conditioned, idx));
            }
        }
        let (_, idx) = best.unwrap();
        visited[idx] = true;
        order.push(idx);
    }
    order
}

/// Pre-planning name resolution: every type and feature mentioned anywhere
/// in the template (quantifier bodies included) must exist.
fn resolve_names(template: &Template, fab: &FabricInner) -> Result<()> {
    for atom in &template.atoms {
        resolve_atom(atom, fab)?;
    }
    Ok(())
}

fn resolve_atom(atom: &Atom, fab: &FabricInner) -> Result<()> {
    if let Some(name) = &atom.type_name {
        if fab.meta.type_id(name).is_none() {
            return Err(FabricError::UnknownName {
                kind: NameKind::Type,
                name: name.clone(),
            });
        }
    }
    for pred in &atom.preds {
        let feature = pred.feature();
        if !fab.meta.features.contains_key(feature) {
            return Err(FabricError::UnknownName {
                kind: NameKind::Feature,
                name: feature.to_string(),
            });
        }
    }
    for quant in &atom.quants {
        match quant {
            Quant::Without(body) | Quant::Where { body, .. } => resolve_names(body, fab)?,
            Quant::With(alternatives) => {
                for body in alternatives {
                    resolve_names(body, fab)?;
                }
            }
        }
    }
    Ok(())
}
