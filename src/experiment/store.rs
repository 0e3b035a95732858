//! Experiment config store - key/value configuration lookup
//!
//! The bucketer only reads from the store. `MemoryConfigStore` is the
//! in-process backend used by tests and small deployments.

use dashmap::DashMap;

use super::ExperimentKeyValue;

/// Source of per-experiment key/value configuration.
pub trait ConfigStore: Send + Sync {
    /// Raw value for `key` under `experiment_id`, if configured.
    fn get_config_value(&self, experiment_id: i64, key: &str) -> Option<String>;
}

/// In-memory store for experiment key/value records.
///
/// ## Design
///
/// Records are keyed by `(experiment_id, key)`. Adding a record for an
/// existing pair replaces the old value, matching a unique constraint on the
/// pair in a relational backend.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: DashMap<(i64, String), ExperimentKeyValue>,
}

impl MemoryConfigStore {
    /// Create a new empty config store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records, e.g. parsed from a JSON fixture.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = ExperimentKeyValue>) -> Self {
        let store = Self::new();
        for record in records {
            store.add_key_value(record);
        }
        store
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the number of records in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Add (or replace) a key/value record.
    pub fn add_key_value(&self, record: ExperimentKeyValue) {
        self.values
            .insert((record.experiment_id(), record.key().to_string()), record);
    }

    /// Remove a key/value record.
    pub fn remove(&self, experiment_id: i64, key: &str) {
        self.values.remove(&(experiment_id, key.to_string()));
    }

    /// All records for an experiment, ordered by key.
    #[must_use]
    pub fn records_for_experiment(&self, experiment_id: i64) -> Vec<ExperimentKeyValue> {
        let mut records: Vec<ExperimentKeyValue> = self
            .values
            .iter()
            .filter(|entry| entry.key().0 == experiment_id)
            .map(|entry| entry.value().clone())
            .collect();

        records.sort_by(|a, b| a.key().cmp(b.key()));

        records
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_config_value(&self, experiment_id: i64, key: &str) -> Option<String> {
        self.values
            .get(&(experiment_id, key.to_string()))
            .map(|record| record.value().value().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ENROLLMENT_END, ENROLLMENT_START};

    #[test]
    fn test_store_default() {
        let store = MemoryConfigStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.get_config_value(0, ENROLLMENT_START), None);
    }

    #[test]
    fn test_store_add_and_get() {
        let store = MemoryConfigStore::new();
        store.add_key_value(ExperimentKeyValue::new(0, ENROLLMENT_START, "2012-01-06"));

        assert_eq!(
            store.get_config_value(0, ENROLLMENT_START).as_deref(),
            Some("2012-01-06")
        );
        assert_eq!(store.get_config_value(1, ENROLLMENT_START), None);
        assert_eq!(store.get_config_value(0, ENROLLMENT_END), None);
    }

    #[test]
    fn test_store_replaces_existing_pair() {
        let store = MemoryConfigStore::new();
        store.add_key_value(ExperimentKeyValue::new(0, ENROLLMENT_END, "2012-01-06"));
        store.add_key_value(ExperimentKeyValue::new(0, ENROLLMENT_END, "9999-01-06"));

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get_config_value(0, ENROLLMENT_END).as_deref(),
            Some("9999-01-06")
        );

        store.remove(0, ENROLLMENT_END);
        assert!(store.is_empty());
    }

    #[test]
    fn test_records_for_experiment_ordering() {
        let store = MemoryConfigStore::from_records([
            ExperimentKeyValue::new(0, ENROLLMENT_START, "2012-01-06"),
            ExperimentKeyValue::new(0, ENROLLMENT_END, "2013-01-06"),
            ExperimentKeyValue::new(1, ENROLLMENT_START, "2014-01-06"),
        ]);

        let records = store.records_for_experiment(0);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key(), ENROLLMENT_END);
        assert_eq!(records[1].key(), ENROLLMENT_START);
    }
}
