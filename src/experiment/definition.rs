//! Experiment definition - validated at registration time

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A registered experiment.
///
/// Built through [`Experiment::builder`] or from an [`ExperimentConfig`]; both
/// paths validate the bucket count and names, and derive one override flag key
/// per bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    namespace: String,
    name: String,
    experiment_id: Option<i64>,
    num_buckets: u32,
    use_course_aware_bucketing: bool,
    active_by_default: bool,
    bucket_flags: Vec<String>,
}

impl Experiment {
    /// Create a builder with the required namespace and name.
    #[must_use]
    pub fn builder(namespace: impl Into<String>, name: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder::new(namespace, name)
    }

    /// Parse and validate a JSON experiment definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed JSON and the usual validation
    /// errors for an invalid definition.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ExperimentConfig = serde_json::from_str(json)?;
        Self::try_from(config)
    }

    /// Flag namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Experiment name within the namespace.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `namespace.name`: the parent flag's key.
    #[must_use]
    pub fn flag_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Id used to look up key/value configuration, if any.
    #[must_use]
    pub const fn experiment_id(&self) -> Option<i64> {
        self.experiment_id
    }

    /// Number of buckets (always at least 1).
    #[must_use]
    pub const fn num_buckets(&self) -> u32 {
        self.num_buckets
    }

    /// Whether the course is part of the hashing key.
    #[must_use]
    pub const fn use_course_aware_bucketing(&self) -> bool {
        self.use_course_aware_bucketing
    }

    /// Parent flag state when the flag store has no override.
    #[must_use]
    pub const fn active_by_default(&self) -> bool {
        self.active_by_default
    }

    /// Override flag key for `bucket`, `None` if out of range.
    #[must_use]
    pub fn bucket_flag_key(&self, bucket: u32) -> Option<&str> {
        self.bucket_flags
            .get(usize::try_from(bucket).ok()?)
            .map(String::as_str)
    }

    /// Override flag keys, indexed by bucket.
    #[must_use]
    pub fn bucket_flag_keys(&self) -> &[String] {
        &self.bucket_flags
    }
}

/// Serializable experiment definition, e.g. loaded from a JSON config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Flag namespace.
    pub namespace: String,
    /// Experiment name.
    pub name: String,
    /// Key/value configuration id.
    #[serde(default)]
    pub experiment_id: Option<i64>,
    /// Number of buckets.
    #[serde(default = "default_num_buckets")]
    pub num_buckets: u32,
    /// Include the course in the hashing key.
    #[serde(default = "default_course_aware")]
    pub use_course_aware_bucketing: bool,
    /// Parent flag state with no override.
    #[serde(default)]
    pub active_by_default: bool,
    /// Custom override flag keys by bucket index.
    #[serde(default)]
    pub bucket_flags: BTreeMap<u32, String>,
}

const fn default_num_buckets() -> u32 {
    2
}

const fn default_course_aware() -> bool {
    true
}

impl TryFrom<ExperimentConfig> for Experiment {
    type Error = Error;

    fn try_from(config: ExperimentConfig) -> Result<Self> {
        let mut builder = Self::builder(config.namespace, config.name)
            .num_buckets(config.num_buckets)
            .use_course_aware_bucketing(config.use_course_aware_bucketing)
            .active_by_default(config.active_by_default);
        if let Some(id) = config.experiment_id {
            builder = builder.experiment_id(id);
        }
        for (bucket, key) in config.bucket_flags {
            builder = builder.bucket_flag_key(bucket, key);
        }
        builder.build()
    }
}

/// Builder for `Experiment`.
#[derive(Debug)]
pub struct ExperimentBuilder {
    namespace: String,
    name: String,
    experiment_id: Option<i64>,
    num_buckets: u32,
    use_course_aware_bucketing: bool,
    active_by_default: bool,
    custom_bucket_flags: BTreeMap<u32, String>,
}

impl ExperimentBuilder {
    /// Create a new builder with required fields. Defaults to two buckets.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            experiment_id: None,
            num_buckets: default_num_buckets(),
            use_course_aware_bucketing: default_course_aware(),
            active_by_default: false,
            custom_bucket_flags: BTreeMap::new(),
        }
    }

    /// Set the key/value configuration id.
    #[must_use]
    pub const fn experiment_id(mut self, experiment_id: i64) -> Self {
        self.experiment_id = Some(experiment_id);
        self
    }

    /// Set the bucket count.
    #[must_use]
    pub const fn num_buckets(mut self, num_buckets: u32) -> Self {
        self.num_buckets = num_buckets;
        self
    }

    /// Toggle course-aware hashing (on by default).
    #[must_use]
    pub const fn use_course_aware_bucketing(mut self, enabled: bool) -> Self {
        self.use_course_aware_bucketing = enabled;
        self
    }

    /// Parent flag state with no override (off by default).
    #[must_use]
    pub const fn active_by_default(mut self, active: bool) -> Self {
        self.active_by_default = active;
        self
    }

    /// Use `key` instead of `namespace.name.<bucket>` as the override flag
    /// for `bucket`.
    #[must_use]
    pub fn bucket_flag_key(mut self, bucket: u32, key: impl Into<String>) -> Self {
        self.custom_bucket_flags.insert(bucket, key.into());
        self
    }

    /// Validate and build the `Experiment`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBucketCount`] if `num_buckets` is zero
    /// - [`Error::InvalidGroupingKey`] if the namespace or name is empty or
    ///   contains whitespace
    /// - [`Error::BucketOutOfRange`] if a custom flag key names a bucket the
    ///   experiment does not have
    /// - [`Error::InvalidGroupingKey`] if a custom flag key is empty
    /// - [`Error::DuplicateBucketFlag`] if two bucket keys collide, or a bucket
    ///   key equals the experiment's parent flag name
    pub fn build(mut self) -> Result<Experiment> {
        if self.num_buckets == 0 {
            return Err(Error::InvalidBucketCount(self.num_buckets));
        }
        validate_key_part(&self.namespace)?;
        validate_key_part(&self.name)?;
        if let Some(&bucket) = self
            .custom_bucket_flags
            .keys()
            .find(|&&bucket| bucket >= self.num_buckets)
        {
            return Err(Error::BucketOutOfRange {
                bucket,
                num_buckets: self.num_buckets,
            });
        }

        // Bucket keys must not collide with each other or with the parent flag.
        let mut seen = HashSet::with_capacity(self.num_buckets as usize + 1);
        seen.insert(format!("{}.{}", self.namespace, self.name));
        let mut bucket_flags = Vec::with_capacity(self.num_buckets as usize);
        for bucket in 0..self.num_buckets {
            let key = match self.custom_bucket_flags.remove(&bucket) {
                Some(key) => {
                    validate_key_part(&key)?;
                    key
                }
                None => format!("{}.{}.{bucket}", self.namespace, self.name),
            };
            if !seen.insert(key.clone()) {
                return Err(Error::DuplicateBucketFlag(key));
            }
            bucket_flags.push(key);
        }

        Ok(Experiment {
            namespace: self.namespace,
            name: self.name,
            experiment_id: self.experiment_id,
            num_buckets: self.num_buckets,
            use_course_aware_bucketing: self.use_course_aware_bucketing,
            active_by_default: self.active_by_default,
            bucket_flags,
        })
    }
}

fn validate_key_part(part: &str) -> Result<()> {
    if part.is_empty() || part.chars().any(char::is_whitespace) {
        return Err(Error::InvalidGroupingKey(part.to_string()));
    }
    Ok(())
}
