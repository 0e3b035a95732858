//! Experiment key/value record - free-form per-experiment configuration

use serde::{Deserialize, Serialize};

/// Key naming the first enrollment date admitted into the experiment.
pub const ENROLLMENT_START: &str = "enrollment_start";

/// Key naming the enrollment date from which users are no longer admitted.
pub const ENROLLMENT_END: &str = "enrollment_end";

/// A configuration value attached to an experiment id.
///
/// Values are stored as strings and interpreted by the consumer; the
/// enrollment window keys hold dates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperimentKeyValue {
    experiment_id: i64,
    key: String,
    value: String,
}

impl ExperimentKeyValue {
    /// Create a new key/value record.
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - Experiment the value belongs to
    /// * `key` - Configuration key (e.g. [`ENROLLMENT_START`])
    /// * `value` - Raw string value
    #[must_use]
    pub fn new(experiment_id: i64, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            experiment_id,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the experiment ID.
    #[must_use]
    pub const fn experiment_id(&self) -> i64 {
        self.experiment_id
    }

    /// Get the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the raw value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_new() {
        let record = ExperimentKeyValue::new(0, ENROLLMENT_START, "2012-01-06");
        assert_eq!(record.experiment_id(), 0);
        assert_eq!(record.key(), "enrollment_start");
        assert_eq!(record.value(), "2012-01-06");
    }

    #[test]
    fn test_key_value_from_json() {
        let record: ExperimentKeyValue = serde_json::from_str(
            r#"{"experiment_id": 3, "key": "enrollment_end", "value": "9999-01-06"}"#,
        )
        .unwrap();
        assert_eq!(record, ExperimentKeyValue::new(3, ENROLLMENT_END, "9999-01-06"));
    }
}
