// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Crate-wide error type.
//!
//! Every externally observable operation returns `Result<T, FabricError>`.
//! Each variant carries the machine-readable data a server layer needs to
//! build its own error envelope without parsing the message. Structural and
//! I/O errors abort the enclosing operation; there are no hidden fallbacks
//! from a corrupt store to anything else.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// What kind of name failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Feature,
    Type,
    Relation,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameKind::Feature => write!(f, "feature"),
            NameKind::Type => write!(f, "type"),
            NameKind::Relation => write!(f, "relation"),
        }
    }
}

/// Error type for all store, navigation, and search operations.
#[derive(Debug)]
pub enum FabricError {
    /// A container file has a bad magic number, bad footer, or inconsistent
    /// sizes. The store cannot be trusted.
    CorruptStore { path: PathBuf, detail: String },
    /// The store was written by an incompatible format version.
    VersionMismatch { path: PathBuf, found: u32, supported: u32 },
    /// The catalog references a feature file that does not exist on disk.
    MissingFeature { name: String, path: PathBuf },
    /// A feature name not present in the catalog was requested.
    UnknownFeature { name: String },
    /// A node type name not present in the type table was requested.
    UnknownType { name: String },
    /// A text format name not declared in the metadata was requested.
    UnknownFormat { name: String },
    /// A CSR offset or dense index exceeds the declared bounds.
    ArrayOutOfRange {
        path: PathBuf,
        index: u64,
        bound: u64,
    },
    /// The search template failed to parse.
    TemplateParse {
        line: u32,
        col: u32,
        expected: String,
        found: String,
    },
    /// A name in a search template failed to resolve before planning.
    UnknownName { kind: NameKind, name: String },
    /// The per-call wall-clock budget was exceeded.
    Timeout { elapsed_ms: u64 },
    /// The caller's cancel flag was raised.
    Cancelled,
    /// An underlying I/O operation failed.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for FabricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FabricError::CorruptStore { path, detail } => {
                write!(f, "corrupt store at {}: {}", path.display(), detail)
            }
            FabricError::VersionMismatch {
                path,
                found,
                supported,
            } => {
                write!(
                    f,
                    "store {} has format version {} but this build supports {}",
                    path.display(),
                    found,
                    supported
                )
            }
            FabricError::MissingFeature { name, path } => {
                write!(
                    f,
                    "feature '{}' is in the catalog but {} does not exist",
                    name,
                    path.display()
                )
            }
            FabricError::UnknownFeature { name } => {
                write!(f, "unknown feature '{}'", name)
            }
            FabricError::UnknownType { name } => {
                write!(f, "unknown node type '{}'", name)
            }
            FabricError::UnknownFormat { name } => {
                write!(f, "unknown text format '{}'", name)
            }
            FabricError::ArrayOutOfRange { path, index, bound } => {
                write!(
                    f,
                    "index {} out of range (bound {}) in {}",
                    index,
                    bound,
                    path.display()
                )
            }
            FabricError::TemplateParse {
                line,
                col,
                expected,
                found,
            } => {
                write!(
                    f,
                    "template parse error at line {}, col {}: expected {}, found {}",
                    line, col, expected, found
                )
            }
            FabricError::UnknownName { kind, name } => {
                write!(f, "unknown {} '{}' in template", kind, name)
            }
            FabricError::Timeout { elapsed_ms } => {
                write!(f, "query exceeded its time budget after {} ms", elapsed_ms)
            }
            FabricError::Cancelled => write!(f, "query cancelled"),
            FabricError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for FabricError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FabricError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl FabricError {
    /// Wrap an `io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FabricError::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for a corruption report on a given file.
    pub fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        FabricError::CorruptStore {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FabricError>;
