// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Search template parser.
//!
//! A template is a line-oriented tree. Every non-blank, non-comment line
//! declares an atom: a node type (or `.` for any) followed by feature
//! predicates. Indentation encodes containment; siblings at the same indent
//! default to strict canonical precedence (`<`); a line starting with a
//! relation operator replaces that default between the preceding sibling
//! and itself. Quantifier blocks (`/where/../have/`, `/without/`,
//! `/with/../or/`, closed by `/-/`) attach to the atom they are indented
//! under.
//!
//! ```text
//! clause
//!   phrase function=Pred
//!     word sp=verb
//!   <: phrase function=Subj
//! ```
//!
//! Parsing reports position and expectation; nothing here touches the
//! store, so name resolution errors surface later, before planning.

use crate::error::{FabricError, Result};

/// Comment marker; the line is ignored from this character on.
const COMMENT: char = '%';

/// A feature predicate on one atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pred {
    /// `feature=value` or `feature=v1|v2|v3`
    Eq { feature: String, values: Vec<String> },
    /// `feature!=value`
    Ne { feature: String, value: String },
    /// `feature~regex`
    Re { feature: String, pattern: String },
    /// `feature*`
    Present { feature: String },
    /// `feature?`
    Absent { feature: String },
}

impl Pred {
    pub fn feature(&self) -> &str {
        match self {
            Pred::Eq { feature, .. }
            | Pred::Ne { feature, .. }
            | Pred::Re { feature, .. }
            | Pred::Present { feature }
            | Pred::Absent { feature } => feature,
        }
    }
}

/// A structural relation between two atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    /// `<` strict canonical precedence
    Before,
    /// `>`
    After,
    /// `<:` immediately adjacent (no same-type node between)
    AdjBefore,
    /// `:>`
    AdjAfter,
    /// `<<` entirely before by slots
    SlotBefore,
    /// `>>`
    SlotAfter,
    /// `[[` left embeds right
    Embeds,
    /// `]]` left embedded in right
    EmbeddedIn,
    /// `=:` share first slot
    SameFirst,
    /// `:=` share last slot
    SameLast,
    /// `::` share first and last slot
    CoExtensive,
    /// `==` same slot set
    SameSlots,
}

impl RelOp {
    /// Operators, longest first so the tokenizer is greedy.
    const TABLE: &'static [(&'static str, RelOp)] = &[
        ("<<", RelOp::SlotBefore),
        (">>", RelOp::SlotAfter),
        ("<:", RelOp::AdjBefore),
        (":>", RelOp::AdjAfter),
        ("=:", RelOp::SameFirst),
        (":=", RelOp::SameLast),
        ("::", RelOp::CoExtensive),
        ("==", RelOp::SameSlots),
        ("[[", RelOp::Embeds),
        ("]]", RelOp::EmbeddedIn),
        ("<", RelOp::Before),
        (">", RelOp::After),
    ];

    pub fn token(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(t, _)| *t)
            .unwrap_or("?")
    }
}

/// One node constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    /// 1-based source line.
    pub line: u32,
    /// `None` for the `.` sentinel (any type).
    pub type_name: Option<String>,
    pub preds: Vec<Pred>,
    /// Enclosing atom by template index; in quantifier bodies `None` means
    /// "embedded in the pinned atom".
    pub parent: Option<usize>,
    pub quants: Vec<Quant>,
}

/// A relation edge `left op right` between atoms by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub left: usize,
    pub right: usize,
    pub op: RelOp,
}

/// A quantifier attached to an atom, evaluated with the atom's binding
/// pinned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quant {
    /// `/without/ body /-/`: no match of the body exists.
    Without(Template),
    /// `/with/ b1 /or/ b2 /-/`: at least one alternative matches.
    With(Vec<Template>),
    /// `/where/ a /have/ b /-/`: every binding of the first `have_start`
    /// atoms extends to a full binding.
    Where {
        body: Template,
        have_start: usize,
    },
}

/// A parsed template: atoms in source order plus relation edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub atoms: Vec<Atom>,
    pub edges: Vec<Edge>,
}

// ============================================================================
// PARSER
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: u32,
    indent: usize,
    text: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Where,
    Have,
    Without,
    With,
    Or,
    End,
}

fn marker_of(text: &str) -> Option<Marker> {
    match text {
        "/where/" => Some(Marker::Where),
        "/have/" => Some(Marker::Have),
        "/without/" => Some(Marker::Without),
        "/with/" => Some(Marker::With),
        "/or/" => Some(Marker::Or),
        "/-/" => Some(Marker::End),
        _ => None,
    }
}

fn err(line: u32, col: usize, expected: &str, found: &str) -> FabricError {
    FabricError::TemplateParse {
        line,
        col: col as u32,
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// Parse a template source into its tree.
pub fn parse(source: &str) -> Result<Template> {
    let mut lines = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let number = i as u32 + 1;
        let without_comment = match raw.find(COMMENT) {
            Some(at) => &raw[..at],
            None => raw,
        };
        if without_comment.trim().is_empty() {
            continue;
        }
        let indent = without_comment.len() - without_comment.trim_start().len();
        if without_comment[..indent].contains('\t') {
            return Err(err(number, 1, "space indentation", "tab"));
        }
        lines.push(Line {
            number,
            indent,
            text: without_comment.trim_end(),
        });
    }
    parse_block(&lines)
}

fn parse_block(lines: &[Line]) -> Result<Template> {
    let mut template = Template::default();
    // Open atoms: (indent, atom index), innermost last.
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let text = line.text.trim_start();

        if let Some(marker) = marker_of(text) {
            match marker {
                Marker::Where | Marker::Without | Marker::With => {
                    let (quant, consumed) = parse_quantifier(&lines[i..], marker)?;
                    let owner = stack
                        .iter()
                        .rev()
                        .find(|&&(indent, _)| indent < line.indent)
                        .map(|&(_, idx)| idx)
                        .ok_or_else(|| {
                            err(line.number, line.indent + 1, "an atom to quantify", text)
                        })?;
                    template.atoms[owner].quants.push(quant);
                    i += consumed;
                    continue;
                }
                Marker::Have | Marker::Or | Marker::End => {
                    return Err(err(
                        line.number,
                        line.indent + 1,
                        "an atom or a quantifier opener",
                        text,
                    ));
                }
            }
        }

        // Optional leading relation operator.
        let (explicit_op, rest) = match RelOp::TABLE
            .iter()
            .find(|(token, _)| text.starts_with(token))
        {
            Some(&(token, op)) => (Some(op), text[token.len()..].trim_start()),
            None => (None, text),
        };

        let atom_col = line.indent + (text.len() - rest.len()) + 1;
        let mut atom = parse_atom(rest, line.number, atom_col)?;

        // Pop closed scopes; remember a sibling at exactly this indent.
        let mut sibling = None;
        while let Some(&(indent, idx)) = stack.last() {
            if indent < line.indent {
                break;
            }
            if indent == line.indent {
                sibling = Some(idx);
            }
            stack.pop();
        }
        let parent = stack.last().map(|&(_, idx)| idx);
        atom.parent = parent;
        atom.line = line.number;

        let this = template.atoms.len();
        template.atoms.push(atom);

        if let Some(parent) = parent {
            template.edges.push(Edge {
                left: this,
                right: parent,
                op: RelOp::EmbeddedIn,
            });
        }
        match (explicit_op, sibling) {
            (Some(op), Some(prev)) => template.edges.push(Edge {
                left: prev,
                right: this,
                op,
            }),
            (Some(_), None) => {
                return Err(err(
                    line.number,
                    line.indent + 1,
                    "a preceding sibling for the relation",
                    text,
                ));
            }
            (None, Some(prev)) => template.edges.push(Edge {
                left: prev,
                right: this,
                op: RelOp::Before,
            }),
            (None, None) => {}
        }

        stack.push((line.indent, this));
        i += 1;
    }

    Ok(template)
}

/// Parse one quantifier block starting at its opener; returns the quant and
/// the number of lines consumed (opener through `/-/`).
fn parse_quantifier(lines: &[Line], opener: Marker) -> Result<(Quant, usize)> {
    let open = lines[0];
    let mut depth = 1;
    let mut splits: Vec<usize> = Vec::new(); // top-level /have/ or /or/ offsets
    let mut end = None;

    for (offset, line) in lines.iter().enumerate().skip(1) {
        match marker_of(line.text.trim_start()) {
            Some(Marker::Where | Marker::Without | Marker::With) => depth += 1,
            Some(Marker::End) => {
                depth -= 1;
                if depth == 0 {
                    end = Some(offset);
                    break;
                }
            }
            Some(Marker::Have | Marker::Or) if depth == 1 => splits.push(offset),
            _ => {}
        }
    }
    let end = end.ok_or_else(|| err(open.number, open.indent + 1, "/-/", "end of template"))?;

    let segments: Vec<&[Line]> = {
        let mut bounds = vec![0usize];
        bounds.extend(&splits);
        bounds.push(end);
        bounds
            .windows(2)
            .map(|w| &lines[w[0] + 1..w[1]])
            .collect()
    };

    let quant = match opener {
        Marker::Without => {
            if !splits.is_empty() {
                return Err(err(open.number, open.indent + 1, "/-/", "/or/ or /have/"));
            }
            Quant::Without(parse_block(segments[0])?)
        }
        Marker::With => {
            let mut alternatives = Vec::with_capacity(segments.len());
            for seg in &segments {
                alternatives.push(parse_block(seg)?);
            }
            Quant::With(alternatives)
        }
        Marker::Where => {
            if segments.len() != 2 {
                return Err(err(
                    open.number,
                    open.indent + 1,
                    "exactly one /have/",
                    "a different shape",
                ));
            }
            let condition = parse_block(segments[0])?;
            let consequence = parse_block(segments[1])?;
            let have_start = condition.atoms.len();
            Quant::Where {
                body: merge(condition, consequence),
                have_start,
            }
        }
        _ => unreachable!("caller only passes quantifier openers"),
    };

    Ok((quant, end + 1))
}

/// Append `tail` to `head`, shifting the tail's indices.
fn merge(mut head: Template, tail: Template) -> Template {
    let shift = head.atoms.len();
    head.atoms.extend(tail.atoms.into_iter().map(|mut a| {
        a.parent = a.parent.map(|p| p + shift);
        a
    }));
    head.edges.extend(tail.edges.into_iter().map(|mut e| {
        e.left += shift;
        e.right += shift;
        e
    }));
    head
}

fn is_name(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse `type pred pred ...` from the text after any relation operator.
fn parse_atom(text: &str, line: u32, col: usize) -> Result<Atom> {
    let mut tokens = text.split_whitespace();
    let head = tokens
        .next()
        .ok_or_else(|| err(line, col, "a node type or '.'", "end of line"))?;

    let type_name = if head == "." {
        None
    } else if is_name(head) {
        Some(head.to_string())
    } else {
        return Err(err(line, col, "a node type or '.'", head));
    };

    let mut preds = Vec::new();
    let mut cursor = col + head.len();
    for token in tokens {
        preds.push(parse_pred(token, line, cursor)?);
        cursor += token.len() + 1;
    }

    Ok(Atom {
        line,
        type_name,
        preds,
        parent: None,
        quants: Vec::new(),
    })
}

fn parse_pred(token: &str, line: u32, col: usize) -> Result<Pred> {
    let check_name = |name: &str| -> Result<String> {
        if is_name(name) {
            Ok(name.to_string())
        } else {
            Err(err(line, col, "a feature name", name))
        }
    };

    if let Some((feature, value)) = token.split_once("!=") {
        return Ok(Pred::Ne {
            feature: check_name(feature)?,
            value: value.to_string(),
        });
    }
    if let Some((feature, pattern)) = token.split_once('~') {
        return Ok(Pred::Re {
            feature: check_name(feature)?,
            pattern: pattern.to_string(),
        });
    }
    if let Some((feature, values)) = token.split_once('=') {
        return Ok(Pred::Eq {
            feature: check_name(feature)?,
            values: values.split('|').map(str::to_string).collect(),
        });
    }
    if let Some(feature) = token.strip_suffix('*') {
        return Ok(Pred::Present {
            feature: check_name(feature)?,
        });
    }
    if let Some(feature) = token.strip_suffix('?') {
        return Ok(Pred::Absent {
            feature: check_name(feature)?,
        });
    }
    Err(err(line, col, "a feature predicate", token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indentation_builds_the_tree() {
        let t = parse(
            "clause\n  phrase function=Pred\n    word sp=verb\n  phrase function=Subj\n",
        )
        .unwrap();
        assert_eq!(t.atoms.len(), 4);
        assert_eq!(t.atoms[0].parent, None);
        assert_eq!(t.atoms[1].parent, Some(0));
        assert_eq!(t.atoms[2].parent, Some(1));
        assert_eq!(t.atoms[3].parent, Some(0));

        // child-parent containment plus the default sibling precedence
        assert!(t.edges.contains(&Edge {
            left: 1,
            right: 0,
            op: RelOp::EmbeddedIn
        }));
        assert!(t.edges.contains(&Edge {
            left: 1,
            right: 3,
            op: RelOp::Before
        }));
    }

    #[test]
    fn predicates_parse() {
        let t = parse("word sp=verb vt=perf|impf nu!=pl gn* ps? lex~^QR\n").unwrap();
        let preds = &t.atoms[0].preds;
        assert_eq!(preds.len(), 6);
        assert_eq!(
            preds[0],
            Pred::Eq {
                feature: "sp".into(),
                values: vec!["verb".into()]
            }
        );
        assert_eq!(
            preds[1],
            Pred::Eq {
                feature: "vt".into(),
                values: vec!["perf".into(), "impf".into()]
            }
        );
        assert_eq!(
            preds[2],
            Pred::Ne {
                feature: "nu".into(),
                value: "pl".into()
            }
        );
        assert_eq!(preds[3], Pred::Present { feature: "gn".into() });
        assert_eq!(preds[4], Pred::Absent { feature: "ps".into() });
        assert_eq!(
            preds[5],
            Pred::Re {
                feature: "lex".into(),
                pattern: "^QR".into()
            }
        );
    }

    #[test]
    fn explicit_relation_replaces_sibling_default() {
        let t = parse("clause\n  phrase\n  <: phrase\n").unwrap();
        assert!(t.edges.contains(&Edge {
            left: 1,
            right: 2,
            op: RelOp::AdjBefore
        }));
        assert!(!t
            .edges
            .iter()
            .any(|e| e.left == 1 && e.right == 2 && e.op == RelOp::Before));
    }

    #[test]
    fn any_type_sentinel() {
        let t = parse(".\n").unwrap();
        assert_eq!(t.atoms[0].type_name, None);
    }

    #[test]
    fn comments_and_blanks_ignored() {
        let t = parse("% a comment\n\nword  % trailing\n").unwrap();
        assert_eq!(t.atoms.len(), 1);
        assert_eq!(t.atoms[0].line, 3);
    }

    #[test]
    fn quantifier_attaches_to_enclosing_atom() {
        let t = parse(
            "clause\n  /without/\n    word sp=verb\n  /-/\n",
        )
        .unwrap();
        assert_eq!(t.atoms.len(), 1);
        assert_eq!(t.atoms[0].quants.len(), 1);
        match &t.atoms[0].quants[0] {
            Quant::Without(body) => {
                assert_eq!(body.atoms.len(), 1);
                assert_eq!(body.atoms[0].parent, None);
            }
            other => panic!("expected /without/, got {:?}", other),
        }
    }

    #[test]
    fn where_have_splits_bodies() {
        let t = parse(
            "clause\n  /where/\n    phrase\n  /have/\n    phrase function=Pred\n  /-/\n",
        )
        .unwrap();
        match &t.atoms[0].quants[0] {
            Quant::Where { body, have_start } => {
                assert_eq!(*have_start, 1);
                assert_eq!(body.atoms.len(), 2);
            }
            other => panic!("expected /where/, got {:?}", other),
        }
    }

    #[test]
    fn with_or_collects_alternatives() {
        let t = parse(
            "clause\n  /with/\n    word sp=verb\n  /or/\n    word sp=subs\n  /-/\n",
        )
        .unwrap();
        match &t.atoms[0].quants[0] {
            Quant::With(alts) => assert_eq!(alts.len(), 2),
            other => panic!("expected /with/, got {:?}", other),
        }
    }

    #[test]
    fn diagnostics_carry_position() {
        let e = parse("clause\n  123bad\n").unwrap_err();
        match e {
            FabricError::TemplateParse { line, expected, found, .. } => {
                assert_eq!(line, 2);
                assert!(expected.contains("node type"));
                assert_eq!(found, "123bad");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn unterminated_quantifier_is_an_error() {
        assert!(parse("clause\n  /without/\n    word\n").is_err());
    }

    #[test]
    fn relation_without_sibling_is_an_error() {
        assert!(parse("clause\n  < phrase\n").is_err());
    }
}
