//! Per-request decision cache
//!
//! Holds at most one [`BucketDecision`] per (namespace, key). A decision is
//! created on first use and dropped by [`RequestCache::clear_all_namespaces`],
//! which callers run at request end (and between test cases).
//!
//! This cache is deliberately separate from the durable
//! [`SessionStore`](crate::session::SessionStore): clearing it must never make
//! a tracking event eligible to fire again.

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

/// Resolved bucket for one experiment scope within one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDecision {
    bucket: u32,
    tracked: bool,
}

impl BucketDecision {
    /// A fresh, untracked decision.
    #[must_use]
    pub const fn new(bucket: u32) -> Self {
        Self {
            bucket,
            tracked: false,
        }
    }

    /// The resolved bucket.
    #[must_use]
    pub const fn bucket(&self) -> u32 {
        self.bucket
    }

    /// Whether a tracking event has been handled for this decision.
    #[must_use]
    pub const fn tracked(&self) -> bool {
        self.tracked
    }

    /// Mark the decision tracked.
    pub fn mark_tracked(&mut self) {
        self.tracked = true;
    }
}

type CacheKey = (String, String);

/// Fast in-memory cache, namespaced per experiment flag.
#[derive(Debug)]
pub struct RequestCache {
    entries: DashMap<CacheKey, BucketDecision, FxBuildHasher>,
}

impl RequestCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Cached decision for `key` in `namespace`.
    #[must_use]
    pub fn get(&self, namespace: &str, key: &str) -> Option<BucketDecision> {
        self.entries
            .get(&(namespace.to_string(), key.to_string()))
            .map(|entry| *entry.value())
    }

    /// Store a decision, replacing any previous one.
    pub fn set(&self, namespace: &str, key: &str, decision: BucketDecision) {
        self.entries
            .insert((namespace.to_string(), key.to_string()), decision);
    }

    /// Mark an existing decision tracked. No-op if nothing is cached.
    pub fn mark_tracked(&self, namespace: &str, key: &str) {
        if let Some(mut entry) = self
            .entries
            .get_mut(&(namespace.to_string(), key.to_string()))
        {
            entry.mark_tracked();
        }
    }

    /// Drop every decision in one namespace.
    pub fn clear_namespace(&self, namespace: &str) {
        self.entries.retain(|(ns, _), _| ns != namespace);
    }

    /// Drop every decision. Safe to call repeatedly.
    pub fn clear_all_namespaces(&self) {
        self.entries.clear();
    }

    /// Number of cached decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no decisions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new()
    }
}
