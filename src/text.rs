// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Text assembly: the `T` operator.
//!
//! A text format is a metadata-declared template such as
//! `{g_word_utf8}{trailer_utf8}`: placeholders name slot features, a
//! placeholder with alternatives `{a/b}` takes the first feature that has a
//! value, and everything outside braces is literal. Rendering a node
//! concatenates the template over its slots in ascending order. Literal
//! characters, including trailing whitespace, are preserved byte-exactly;
//! text that round-trips through here must compare equal byte for byte.

use std::sync::Arc;

use crate::error::{FabricError, Result};
use crate::feature::FeatureHandle;
use crate::store::FabricInner;
use crate::types::{Node, SectionRef, Value};

/// One piece of a compiled format template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// Alternatives: the first feature with a value wins.
    Features(Vec<String>),
}

/// A parsed text format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFormat {
    segments: Vec<Segment>,
}

impl TextFormat {
    /// Parse a template string. Braces delimit placeholders; `/` inside a
    /// placeholder separates alternatives.
    pub fn parse(template: &str) -> TextFormat {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            if c != '{' {
                literal.push(c);
                continue;
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            segments.push(Segment::Features(
                name.split('/').map(str::to_string).collect(),
            ));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        TextFormat { segments }
    }

    /// The feature names this format reads.
    pub fn features(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Features(names) => Some(names.iter().map(String::as_str)),
                Segment::Literal(_) => None,
            })
            .flatten()
            .collect()
    }
}

/// The `T` operator: text rendering and section resolution.
#[derive(Clone)]
pub struct TextOp {
    pub(crate) fab: Arc<FabricInner>,
}

impl TextOp {
    /// Render the text of a node using `fmt`, or the corpus default format.
    pub fn text(&self, node: Node, fmt: Option<&str>) -> Result<String> {
        let name = fmt.unwrap_or(&self.fab.meta.default_format);
        let template = self
            .fab
            .meta
            .formats
            .get(name)
            .ok_or_else(|| FabricError::UnknownFormat {
                name: name.to_string(),
            })?;
        let format = TextFormat::parse(template);

        // Resolve every referenced feature once, not per slot.
        let mut handles: Vec<(String, Arc<FeatureHandle>)> = Vec::new();
        for feat in format.features() {
            if !handles.iter().any(|(n, _)| n == feat) {
                handles.push((feat.to_string(), self.fab.feature(feat)?));
            }
        }
        let mut out = String::new();
        for slot in self.fab.slots(node) {
            for segment in &format.segments {
                match segment {
                    Segment::Literal(text) => out.push_str(text),
                    Segment::Features(names) => {
                        for name in names {
                            let handle = handles
                                .iter()
                                .find(|(n, _)| n == name)
                                .map(|(_, h)| h);
                            if let Some(value) = handle.and_then(|h| h.value(slot)) {
                                out.push_str(&value.render());
                                break;
                            }
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Resolve a node to its section reference, e.g. `Genesis 1:1`.
    ///
    /// Labels stop at the node's own level: a chapter node gets
    /// `(book, chapter)`, a word inside a verse gets all three.
    pub fn section_ref(&self, node: Node) -> Result<SectionRef> {
        let mut labels = Vec::new();
        let sections = &self.fab.meta.sections;
        for (ty_name, feat_name) in sections.types.iter().zip(sections.features.iter()) {
            let ty = self.fab.type_id(ty_name)?;
            let holder = if self.fab.type_of(node) == Some(ty) {
                Some(node)
            } else {
                self.fab
                    .warps
                    .lev_up_row(node)
                    .into_iter()
                    .find(|&m| self.fab.type_of(m) == Some(ty))
            };
            let Some(holder) = holder else {
                break;
            };
            let feature = self.fab.feature(feat_name)?;
            let Some(label) = feature.value(holder) else {
                break;
            };
            labels.push(label);
        }
        Ok(SectionRef { labels })
    }

    /// Resolve a section reference to its node: walk the section levels
    /// from the outside in, narrowing by embedding at each step.
    pub fn section_node(&self, labels: &[Value]) -> Result<Option<Node>> {
        let sections = &self.fab.meta.sections;
        let levels = sections
            .types
            .iter()
            .zip(sections.features.iter())
            .take(labels.len());

        let mut current: Option<Node> = None;
        for ((ty_name, feat_name), label) in levels.zip(labels) {
            let ty = self.fab.type_id(ty_name)?;
            let feature = self.fab.feature(feat_name)?;
            let candidates: Vec<Node> = match current {
                None => self
                    .fab
                    .warps
                    .level(ty)
                    .map(|r| r.nodes().collect())
                    .unwrap_or_default(),
                Some(outer) => self
                    .fab
                    .warps
                    .lev_down_row(outer)
                    .into_iter()
                    .filter(|&n| self.fab.type_of(n) == Some(ty))
                    .collect(),
            };
            let lit = label.render();
            let matched = feature.filter_eq_lits(&candidates, &[lit.as_str()]);
            match matched.first() {
                Some(&node) => current = Some(node),
                None => return Ok(None),
            }
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_alternatives_and_literals() {
        let f = TextFormat::parse("{g_word_utf8}{trailer_utf8/space} ");
        assert_eq!(
            f.segments,
            vec![
                Segment::Features(vec!["g_word_utf8".into()]),
                Segment::Features(vec!["trailer_utf8".into(), "space".into()]),
                Segment::Literal(" ".into()),
            ]
        );
        assert_eq!(f.features(), vec!["g_word_utf8", "trailer_utf8", "space"]);
    }

    #[test]
    fn literal_whitespace_survives_parsing() {
        let f = TextFormat::parse("  {a}\t");
        assert_eq!(
            f.segments,
            vec![
                Segment::Literal("  ".into()),
                Segment::Features(vec!["a".into()]),
                Segment::Literal("\t".into()),
            ]
        );
    }
}
