// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fabric", version, about = "Query compiled corpus stores")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show a store's layout and catalog, and verify its checksums
    Inspect {
        /// Corpus directory (the one containing v<N>/)
        corpus: PathBuf,
        /// Store version; defaults to the highest present
        #[arg(long)]
        version: Option<u32>,
    },
    /// Run a search template
    Search {
        corpus: PathBuf,
        /// Template text, or @path to read it from a file
        template: String,
        #[arg(long)]
        version: Option<u32>,
        /// Show at most this many result tuples
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Print only the match count
        #[arg(long)]
        count: bool,
    },
    /// Render the text of a node or a section reference
    Text {
        corpus: PathBuf,
        #[arg(long)]
        version: Option<u32>,
        /// A node id
        #[arg(long)]
        node: Option<u32>,
        /// A section reference like "Genesis 1:1"
        #[arg(long)]
        section: Option<String>,
        /// Text format name; defaults to the corpus default
        #[arg(long)]
        format: Option<String>,
    },
}
