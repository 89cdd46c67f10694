//! In-memory node cache.
//!
//! Holds each node's child seed and existence map for the life of the
//! process. No eviction: the cache grows with the materialized tree and is
//! cleared only on request.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use wisp_core::ExistenceMap;

/// Cached per-node data: the child seed and the node's view membership.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedNode {
    /// Seed the node's children are generated from
    pub child_seed: i64,
    /// Which secondary views contain the node
    pub existence: ExistenceMap,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    /// Number of cached nodes
    pub node_cache_size: usize,
}

/// Process-lifetime cache keyed by node id.
#[derive(Default)]
pub struct NodeCache {
    entries: RwLock<HashMap<String, CachedNode>>,
}

impl NodeCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for a node.
    pub fn get(&self, id: &str) -> Option<CachedNode> {
        self.entries.read().get(id).cloned()
    }

    /// Inserts (or replaces) a node's entry.
    pub fn insert(&self, id: String, node: CachedNode) {
        self.entries.write().insert(id, node);
    }

    /// Number of cached nodes.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            node_cache_size: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seed: i64) -> CachedNode {
        CachedNode {
            child_seed: seed,
            existence: ExistenceMap::all_true(["dst"]),
        }
    }

    #[test]
    fn test_cache_basic() {
        let cache = NodeCache::new();
        cache.insert("node-1".to_string(), entry(42));

        let cached = cache.get("node-1").unwrap();
        assert_eq!(cached.child_seed, 42);
        assert!(cached.existence.contains("dst"));
        assert!(cache.get("node-2").is_none());
    }

    #[test]
    fn test_cache_replace() {
        let cache = NodeCache::new();
        cache.insert("node-1".to_string(), entry(1));
        cache.insert("node-1".to_string(), entry(2));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("node-1").unwrap().child_seed, 2);
    }

    #[test]
    fn test_cache_clear_and_stats() {
        let cache = NodeCache::new();
        cache.insert("a".to_string(), entry(1));
        cache.insert("b".to_string(), entry(2));
        assert_eq!(cache.stats().node_cache_size, 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().node_cache_size, 0);
    }
}
