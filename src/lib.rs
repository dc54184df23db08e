//! Storage and query engine for annotated text corpora modeled as typed,
//! hierarchical graphs.
//!
//! A corpus is millions of nodes (words, phrases, clauses, verses, books)
//! related by containment and labeled edges, with typed key/value
//! annotations on both. This crate owns the compiled binary store, its
//! in-memory projection, and the SPIN pattern search engine on top.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌─────────────┐
//! │   store/     │────▶│  feature/    │     │   warp/     │
//! │ (containers, │     │ (int, str,   │     │ (order,     │
//! │  meta, open) │     │  edge)       │     │  embedding) │
//! └──────────────┘     └──────────────┘     └─────────────┘
//!        │                    │                    │
//!        ▼                    ▼                    ▼
//! ┌─────────────────────────────────────────────────────┐
//! │           nav / text / spin / cache / api           │
//! │   (N walks, T rendering, S search, result pages)    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use fabric::{Fabric, FeatureSpec, ReturnType, SearchOpts};
//!
//! let fabric = Fabric::open(Path::new("bhsa"), None)?;
//! let api = fabric.load(&FeatureSpec::Lazy)?;
//!
//! let out = api.s.search(
//!     "clause\n  phrase function=Pred\n    word sp=verb\n",
//!     ReturnType::Count,
//!     &SearchOpts::default(),
//! )?;
//! ```
//!
//! The store is append-only per version and read-only once compiled; every
//! post-load structure is immutable, so one `Fabric` serves any number of
//! threads without locks on the query path.

// Module declarations
pub mod api;
pub mod cache;
pub mod compile;
pub mod config;
pub mod error;
pub mod feature;
pub mod nav;
mod spin;
pub mod store;
pub mod text;
pub mod types;
pub mod warp;

// Re-exports for the public API
pub use api::Api;
pub use cache::{Cursor, Page, ResultCache};
pub use compile::{compile, EdgeFeatureData, NodeFeatureData, RawCorpus};
pub use config::Config;
pub use error::{FabricError, NameKind, Result};
pub use feature::{EdgeFeature, FeatureHandle, FreqTable, IntFeature, StrFeature, StringPool};
pub use nav::{LocalityOp, NodesOp};
pub use spin::template::{self as search_template, Template};
pub use spin::{Passage, ReturnType, SearchOp, SearchOpts, SearchOutput, Stats};
pub use store::meta::{FeatureDecl, Meta, SectionConfig, TypeDecl};
pub use store::{Fabric, FeatureSpec};
pub use text::{TextFormat, TextOp};
pub use types::{FeatureKind, Node, SectionRef, TypeId, Value, ValueKind};
pub use warp::{LevelRange, Warps};
