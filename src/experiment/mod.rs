//! Experiment definitions and configuration
//!
//! ## Overview
//!
//! ```text
//! Experiment (namespace.name) ──> bucket override flags (one per bucket)
//!      │
//!      └── experiment_id ──< ExperimentKeyValue (enrollment_start / enrollment_end)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use experiment_flags::experiment::{
//!     ConfigStore, Experiment, ExperimentKeyValue, MemoryConfigStore, ENROLLMENT_START,
//! };
//!
//! let experiment = Experiment::builder("experiments", "test")
//!     .num_buckets(2)
//!     .experiment_id(0)
//!     .build()?;
//!
//! let config = MemoryConfigStore::new();
//! config.add_key_value(ExperimentKeyValue::new(0, ENROLLMENT_START, "2012-01-06"));
//!
//! assert_eq!(experiment.bucket_flag_key(1), Some("experiments.test.1"));
//! assert!(config.get_config_value(0, ENROLLMENT_START).is_some());
//! # Ok::<(), experiment_flags::Error>(())
//! ```

mod definition;
mod key_value;
mod store;

pub use definition::{Experiment, ExperimentBuilder, ExperimentConfig};
pub use key_value::{ExperimentKeyValue, ENROLLMENT_END, ENROLLMENT_START};
pub use store::{ConfigStore, MemoryConfigStore};
