//! In-memory session store implementation using `DashMap`.
//!
//! Data lives as long as the store value. Share one `Arc<MemorySessionStore>`
//! between the requests of a session.

use super::SessionStore;
use dashmap::DashMap;

/// In-memory session store using a concurrent hashmap.
///
/// # Example
///
/// ```rust
/// use experiment_flags::session::{MemorySessionStore, SessionStore};
///
/// let session = MemorySessionStore::new();
/// session.set("hello", serde_json::json!("world"));
/// assert_eq!(session.get("hello"), Some(serde_json::json!("world")));
/// ```
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    store: DashMap<String, serde_json::Value>,
}

impl MemorySessionStore {
    /// Create a new, empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of entries in the session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the session is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Clear all entries (logout).
    pub fn clear(&self) {
        self.store.clear();
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.store.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: serde_json::Value) {
        self.store.insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.store.remove(key);
    }

    fn exists(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }
}
