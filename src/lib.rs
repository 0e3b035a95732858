//! # experiment-flags: Deterministic A/B Experiment Bucketing
//!
//! Assigns users to experiment buckets on top of a feature-flag system. A
//! decision is stable (same user, same experiment, same bucket across
//! processes), cached per request, and reported to analytics at most once per
//! session.
//!
//! ## Design Principles
//!
//! - **Explicit context**: the request (user, site, session, cache) is passed
//!   into every call instead of read from a global
//! - **Two stores, two lifetimes**: the per-request [`RequestCache`] can be
//!   cleared freely; the durable [`SessionStore`] keeps "already tracked"
//!   markers
//! - **No runtime errors**: every failure mode maps to a defined bucket; only
//!   experiment definitions can be rejected
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use experiment_flags::{
//!     CourseKey, Experiment, ExperimentBucketer, MemoryFlagStore, MemorySessionStore,
//!     MemoryTracker, RequestContext, Site, User,
//! };
//!
//! let experiment = Experiment::builder("experiments", "new_dashboard")
//!     .num_buckets(2)
//!     .build()?;
//!
//! let flags = Arc::new(MemoryFlagStore::new());
//! flags.set_global("experiments.new_dashboard", Some(true));
//!
//! let tracker = Arc::new(MemoryTracker::new());
//! let bucketer = ExperimentBucketer::builder(experiment)
//!     .flags(flags)
//!     .tracker(tracker.clone())
//!     .build();
//!
//! let ctx = RequestContext::new(
//!     User::new(42, "learner"),
//!     Site::new("courses.example.com"),
//!     Arc::new(MemorySessionStore::new()),
//! );
//! let course = CourseKey::new("course-v1:Org+CS101+2024")?;
//!
//! let bucket = bucketer.get_bucket(Some(&ctx), Some(&course), true);
//! assert!(bucket < 2);
//! assert_eq!(bucketer.get_bucket(Some(&ctx), Some(&course), true), bucket);
//! assert_eq!(tracker.len(), 1);
//! # Ok::<(), experiment_flags::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod bucketer;
pub mod cache;
pub mod context;
pub mod eligibility;
pub mod enrollment;
pub mod error;
pub mod experiment;
pub mod flags;
pub mod hash;
pub mod session;
pub mod tracking;

pub use bucketer::{ExperimentBucketer, ExperimentBucketerBuilder, OverrideGuard};
pub use cache::{BucketDecision, RequestCache};
pub use context::{CourseKey, RequestContext, Site, User};
pub use enrollment::{EnrollmentLookup, MemoryEnrollments};
pub use error::{Error, Result};
pub use experiment::{ConfigStore, Experiment, ExperimentKeyValue, MemoryConfigStore};
pub use flags::{FlagStore, MemoryFlagStore};
pub use hash::{BucketHasher, Sha256BucketHasher};
pub use session::{MemorySessionStore, SessionStore};
pub use tracking::{MemoryTracker, NullTracker, TrackingProperties, TrackingSink};
