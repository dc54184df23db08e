// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! The building blocks of a corpus graph.
//!
//! Nodes are positive integers in `[1, N]`. Slot nodes (the atomic text
//! units) occupy `[1, S]`; everything above `S` is a hierarchical node that
//! spans one or more slots. Types, features, and values are the annotation
//! layer on top of that skeleton.
//!
//! # Invariants (the stuff that breaks if you ignore it)
//!
//! - **Node**: `1 <= n <= N`. Node `0` never exists; arrays are indexed by
//!   `n - 1`.
//! - **Slot partition**: `is_slot(n) ⟺ n <= S`. Slot numbering is contiguous.
//! - **TypeId**: indexes the metadata type table. Every node has exactly one.

use serde::{Deserialize, Serialize};

/// A node identifier. 1-based; `0` is never a valid node.
pub type Node = u32;

/// Type-safe index into the corpus type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TypeId(pub u16);

impl TypeId {
    /// Convert to usize for table indexing.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u16> for TypeId {
    fn from(id: u16) -> Self {
        TypeId(id)
    }
}

/// Whether a feature annotates nodes or edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Node,
    Edge,
}

/// The value domain of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Int,
    Str,
}

/// An owned feature value handed to callers.
///
/// Absence is not a `Value`; APIs return `Option<Value>` and `None` means
/// the feature has no value for that node (a first-class state, distinct
/// from any value).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    /// Render the value the way text assembly and statistics do.
    pub fn render(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Str(s) => s.clone(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Int(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// A human-readable section reference, e.g. `Genesis 1:1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRef {
    /// One label per section level, outermost first.
    pub labels: Vec<Value>,
}

impl std::fmt::Display for SectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.labels.as_slice() {
            [] => Ok(()),
            [book] => write!(f, "{}", book),
            [book, chapter] => write!(f, "{} {}", book, chapter),
            [book, chapter, rest @ ..] => {
                write!(f, "{} {}", book, chapter)?;
                for (i, label) in rest.iter().enumerate() {
                    if i == 0 {
                        write!(f, ":{}", label)?;
                    } else {
                        write!(f, ".{}", label)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_ref_display() {
        let r = SectionRef {
            labels: vec![Value::from("Genesis"), Value::Int(1), Value::Int(1)],
        };
        assert_eq!(r.to_string(), "Genesis 1:1");

        let r = SectionRef {
            labels: vec![Value::from("Genesis"), Value::Int(3)],
        };
        assert_eq!(r.to_string(), "Genesis 3");
    }

    #[test]
    fn value_render_matches_display() {
        assert_eq!(Value::Int(42).render(), "42");
        assert_eq!(Value::from("verb").render(), "verb");
        assert_eq!(Value::Int(-7).to_string(), "-7");
    }
}
