// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration, read once at `Fabric::open`.
//!
//! Environment variables are consulted exactly once and baked into an
//! immutable `Config` that every component receives. Nothing re-reads the
//! environment later, so a running Fabric cannot change behavior under you.

use std::path::PathBuf;
use std::time::Duration;

/// Name of the variable controlling the embedding CSR preload.
pub const ENV_EMBEDDING_CACHE: &str = "CF_EMBEDDING_CACHE";

/// Name of the variable overriding the per-user corpus cache directory.
pub const ENV_CACHE_DIR: &str = "CF_CACHE_DIR";

/// Immutable runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Copy `levUp`/`levDown` into owned memory at open. Trades ~100 MB on a
    /// corpus of ~1.4 M nodes for the removal of mmap page faults on
    /// traversal-heavy queries.
    pub embedding_cache: bool,
    /// Per-user corpus cache directory, if overridden.
    pub cache_dir: Option<PathBuf>,
    /// Default wall-clock budget applied to queries that do not set one.
    pub query_budget: Option<Duration>,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// `CF_EMBEDDING_CACHE` accepts `on`/`off` (anything else means `off`);
    /// `CF_CACHE_DIR` is taken verbatim when set and non-empty.
    pub fn from_env() -> Self {
        let embedding_cache = std::env::var(ENV_EMBEDDING_CACHE)
            .map(|v| v.eq_ignore_ascii_case("on"))
            .unwrap_or(false);
        let cache_dir = std::env::var(ENV_CACHE_DIR)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Config {
            embedding_cache,
            cache_dir,
            query_budget: None,
        }
    }
}

