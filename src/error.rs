//! Error types for experiment-flags
//!
//! Every variant here is a definition-time problem. Bucketing itself never
//! fails: bad window dates, missing request context and tracking failures all
//! resolve to a defined bucket instead.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// experiment-flags error types
#[derive(Error, Debug)]
pub enum Error {
    /// Experiment declared with zero buckets
    #[error("Invalid bucket count: {0}\nAn experiment needs at least one bucket (bucket 0 is control)")]
    InvalidBucketCount(u32),

    /// Namespace or name cannot form a grouping key
    #[error("Invalid grouping key: {0:?}\nNamespace and name must be non-empty and contain no whitespace")]
    InvalidGroupingKey(String),

    /// Override flag configured for a bucket the experiment does not have
    #[error("Bucket {bucket} out of range: experiment has {num_buckets} buckets")]
    BucketOutOfRange {
        /// Requested bucket index
        bucket: u32,
        /// Configured bucket count
        num_buckets: u32,
    },

    /// A bucket override flag collides with another bucket's or the parent flag
    #[error("Duplicate bucket override flag: {0}")]
    DuplicateBucketFlag(String),

    /// Course key failed validation
    #[error("Invalid course key: {0:?}")]
    InvalidCourseKey(String),

    /// Experiment definition could not be parsed
    #[error("Experiment config error: {0}")]
    Config(#[from] serde_json::Error),
}
