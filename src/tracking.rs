//! Bucketing event emission
//!
//! The bucketer reports each assignment to a [`TrackingSink`] at most once per
//! session. Sinks wrap an analytics transport and may fail for any reason;
//! those failures are logged and otherwise ignored.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Event name for a user being placed in an experiment bucket.
pub const BUCKETED_EVENT: &str = "edx.bi.experiment.user.bucketed";

/// Properties sent with [`BUCKETED_EVENT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingProperties {
    /// Serving site domain.
    pub site: String,
    /// Experiment namespace.
    pub app_label: String,
    /// Experiment name.
    pub experiment: String,
    /// Assigned bucket.
    pub bucket: u32,
    /// Course the assignment was made in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    /// Whether the user is staff.
    pub is_staff: bool,
    /// Analytics marker: the event was not caused by a user interaction.
    #[serde(rename = "nonInteraction")]
    pub non_interaction: u8,
}

/// Analytics transport.
pub trait TrackingSink: Send + Sync {
    /// Send one event.
    ///
    /// # Errors
    ///
    /// Any transport failure. The bucketer logs and discards it.
    fn track(
        &self,
        user_id: u64,
        event_name: &str,
        properties: &TrackingProperties,
    ) -> anyhow::Result<()>;
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracker;

impl TrackingSink for NullTracker {
    fn track(&self, _: u64, _: &str, _: &TrackingProperties) -> anyhow::Result<()> {
        Ok(())
    }
}

/// One event captured by [`MemoryTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEvent {
    /// Recipient user id.
    pub user_id: u64,
    /// Event name.
    pub event_name: String,
    /// Event properties.
    pub properties: TrackingProperties,
}

/// Sink that records events in memory.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    events: Mutex<Vec<TrackedEvent>>,
}

impl MemoryTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<TrackedEvent> {
        self.events
            .lock()
            .map_or_else(|poisoned| poisoned.into_inner().clone(), |events| events.clone())
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrackingSink for MemoryTracker {
    fn track(
        &self,
        user_id: u64,
        event_name: &str,
        properties: &TrackingProperties,
    ) -> anyhow::Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("memory tracker lock poisoned"))?;
        events.push(TrackedEvent {
            user_id,
            event_name: event_name.to_string(),
            properties: properties.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn properties(course_id: Option<&str>) -> TrackingProperties {
        TrackingProperties {
            site: "example.com".to_string(),
            app_label: "experiments".to_string(),
            experiment: "test".to_string(),
            bucket: 1,
            course_id: course_id.map(str::to_string),
            is_staff: false,
            non_interaction: 1,
        }
    }

    #[test]
    fn test_properties_wire_format() {
        let value = serde_json::to_value(properties(Some("a/b/c"))).unwrap();
        assert_eq!(
            value,
            json!({
                "site": "example.com",
                "app_label": "experiments",
                "experiment": "test",
                "bucket": 1,
                "course_id": "a/b/c",
                "is_staff": false,
                "nonInteraction": 1,
            })
        );
    }

    #[test]
    fn test_properties_omit_missing_course() {
        let value = serde_json::to_value(properties(None)).unwrap();
        assert!(value.get("course_id").is_none());
    }

    #[test]
    fn test_memory_tracker_records() {
        let tracker = MemoryTracker::new();
        assert!(tracker.is_empty());

        tracker.track(5, BUCKETED_EVENT, &properties(None)).unwrap();

        let events = tracker.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id, 5);
        assert_eq!(events[0].event_name, BUCKETED_EVENT);
    }
}
