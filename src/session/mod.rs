//! Session Store Module
//!
//! Durable per-session state that outlives the per-request
//! [`RequestCache`](crate::cache::RequestCache). Bucketing only keeps one kind
//! of entry here: the `tracked.<experiment>` marker that guarantees a
//! bucketing event is sent at most once per session.
//!
//! # Example
//!
//! ```rust
//! use experiment_flags::session::{MemorySessionStore, SessionStore};
//!
//! let session = MemorySessionStore::new();
//!
//! session.set("tracked.experiments.test", serde_json::json!(true));
//! assert!(session.exists("tracked.experiments.test"));
//!
//! session.delete("tracked.experiments.test");
//! assert!(!session.exists("tracked.experiments.test"));
//! ```

mod memory;

pub use memory::MemorySessionStore;

/// Key-value session store.
///
/// Mirrors the shape of a web framework session: string keys, JSON values,
/// shared access through `&self`.
pub trait SessionStore: Send + Sync {
    /// Get a value by key.
    ///
    /// Returns `None` if the key doesn't exist.
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Set a value for a key.
    ///
    /// Overwrites any existing value.
    fn set(&self, key: &str, value: serde_json::Value);

    /// Delete a key.
    ///
    /// No-op if the key doesn't exist.
    fn delete(&self, key: &str);

    /// Check if a key exists.
    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Session key recording that `experiment_scope` has been tracked.
#[must_use]
pub fn tracked_key(experiment_scope: &str) -> String {
    format!("tracked.{experiment_scope}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_session_set_get() {
        let store = MemorySessionStore::new();

        store.set("key1", json!("value1"));

        assert_eq!(store.get("key1"), Some(json!("value1")));
    }

    #[test]
    fn test_memory_session_get_nonexistent() {
        let store = MemorySessionStore::new();

        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_memory_session_overwrite() {
        let store = MemorySessionStore::new();

        store.set("key", json!(1));
        store.set("key", json!(2));

        assert_eq!(store.get("key"), Some(json!(2)));
    }

    #[test]
    fn test_memory_session_delete() {
        let store = MemorySessionStore::new();

        store.set("key", json!(true));
        store.delete("key");

        assert_eq!(store.get("key"), None);
        // Should not panic
        store.delete("key");
    }

    #[test]
    fn test_memory_session_exists() {
        let store = MemorySessionStore::new();

        assert!(!store.exists("key"));
        store.set("key", json!(null));
        assert!(store.exists("key"));
    }

    #[test]
    fn test_memory_session_shared_across_threads() {
        use std::sync::Arc;

        let store = Arc::new(MemorySessionStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.set(&format!("key{i}"), json!(i)))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 16);
        assert_eq!(store.get("key7"), Some(json!(7)));
    }

    #[test]
    fn test_tracked_key() {
        assert_eq!(tracked_key("experiments.test"), "tracked.experiments.test");
        assert_eq!(
            tracked_key("experiments.test.a/b/c"),
            "tracked.experiments.test.a/b/c"
        );
    }
}
