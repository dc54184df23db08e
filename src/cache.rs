// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Keyed result cache for server integration.
//!
//! Maps `(corpus, template)` to a materialized tuple list under a bounded
//! TTL; cursors are `(handle, offset)` pairs over that list. The cache is
//! purely opportunistic: a miss (expired, evicted, never stored) just means
//! the caller re-executes the query. Insertion is the one narrow critical
//! section on the query path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::types::Node;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// A stable pointer into a cached result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    pub handle: u64,
    pub offset: usize,
}

/// One page of a cached result set.
#[derive(Debug, Clone)]
pub struct Page {
    pub tuples: Vec<Vec<Node>>,
    pub has_more: bool,
    pub expires_at: Instant,
    /// Cursor for the next page, when one exists.
    pub next: Option<Cursor>,
}

struct Entry {
    key: (String, String),
    tuples: Arc<Vec<Vec<Node>>>,
    expires_at: Instant,
}

/// The cache itself. One per Fabric; shared by every Api clone.
pub struct ResultCache {
    entries: Mutex<HashMap<u64, Entry>>,
    by_key: Mutex<HashMap<(String, String), u64>>,
    next_handle: AtomicU64,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> ResultCache {
        ResultCache {
            entries: Mutex::new(HashMap::new()),
            by_key: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            ttl,
        }
    }

    /// Store a materialized result set and return its handle.
    pub fn insert(&self, corpus: &str, template: &str, tuples: Vec<Vec<Node>>) -> u64 {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let key = (corpus.to_string(), template.to_string());
        let entry = Entry {
            key: key.clone(),
            tuples: Arc::new(tuples),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().insert(handle, entry);
        self.by_key.lock().insert(key, handle);
        handle
    }

    /// Find a live handle for `(corpus, template)`.
    pub fn lookup(&self, corpus: &str, template: &str) -> Option<u64> {
        let key = (corpus.to_string(), template.to_string());
        let handle = *self.by_key.lock().get(&key)?;
        // Expired entries count as misses.
        self.page(Cursor { handle, offset: 0 }, 0).map(|_| handle)
    }

    /// Slice `limit` tuples starting at `cursor.offset`; `None` on a stale
    /// or unknown handle.
    pub fn page(&self, cursor: Cursor, limit: usize) -> Option<Page> {
        let tuples;
        let expires_at;
        {
            let mut entries = self.entries.lock();
            let entry = entries.get(&cursor.handle)?;
            if entry.expires_at <= Instant::now() {
                let key = entry.key.clone();
                entries.remove(&cursor.handle);
                self.by_key.lock().remove(&key);
                return None;
            }
            tuples = Arc::clone(&entry.tuples);
            expires_at = entry.expires_at;
        }

        let start = cursor.offset.min(tuples.len());
        let end = start.saturating_add(limit).min(tuples.len());
        let has_more = end < tuples.len();
        Some(Page {
            tuples: tuples[start..end].to_vec(),
            has_more,
            expires_at,
            next: has_more.then_some(Cursor {
                handle: cursor.handle,
                offset: end,
            }),
        })
    }

    /// Total tuples behind a live handle.
    pub fn len_of(&self, handle: u64) -> Option<usize> {
        let entries = self.entries.lock();
        let entry = entries.get(&handle)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.tuples.len())
    }

    /// Drop expired entries. Callers may run this opportunistically.
    pub fn purge(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let mut by_key = self.by_key.lock();
        entries.retain(|_, e| {
            let live = e.expires_at > now;
            if !live {
                by_key.remove(&e.key);
            }
            live
        });
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        ResultCache::new(DEFAULT_TTL)
    }
}
