//! Experiment bucketer
//!
//! Resolution order for one `(experiment, course)` scope:
//!
//! ```text
//! scoped override ──> request context? ──> cached decision?
//!                          │ no: 0               │ yes: reuse
//!                          ▼                     ▼
//!              parent flag off ─> 0        (tracking step)
//!              bucket override ─> i
//!              outside window  ─> 0
//!              otherwise       ─> stable hash
//! ```
//!
//! Decisions are cached in the request's [`RequestCache`](crate::cache::RequestCache);
//! "already tracked" markers live in the session so they survive cache clears.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::cache::BucketDecision;
use crate::context::{CourseKey, RequestContext};
use crate::eligibility::is_eligible;
use crate::enrollment::{EnrollmentLookup, MemoryEnrollments};
use crate::experiment::{ConfigStore, Experiment, MemoryConfigStore};
use crate::flags::{FlagStore, MemoryFlagStore};
use crate::hash::{BucketHasher, GroupingKey, Sha256BucketHasher};
use crate::session::tracked_key;
use crate::tracking::{NullTracker, TrackingProperties, TrackingSink, BUCKETED_EVENT};
use crate::{Error, Result};

/// Why a freshly computed decision landed where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BucketSource {
    Disabled,
    Override,
    Ineligible,
    Hashed,
}

impl BucketSource {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Override => "override",
            Self::Ineligible => "ineligible",
            Self::Hashed => "hashed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScopedOverride {
    active: bool,
    bucket: Option<u32>,
}

/// Assigns users to buckets of one experiment.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use experiment_flags::{
///     Experiment, ExperimentBucketer, MemoryFlagStore, MemorySessionStore, RequestContext,
///     Site, User,
/// };
///
/// let experiment = Experiment::builder("experiments", "test").num_buckets(2).build()?;
/// let flags = Arc::new(MemoryFlagStore::new());
/// let bucketer = ExperimentBucketer::builder(experiment)
///     .flags(flags.clone())
///     .build();
///
/// let ctx = RequestContext::new(
///     User::new(1, "learner"),
///     Site::new("example.com"),
///     Arc::new(MemorySessionStore::new()),
/// );
///
/// // The parent flag is off until something turns it on.
/// assert_eq!(bucketer.get_bucket(Some(&ctx), None, false), 0);
///
/// let _on = flags.override_flag("experiments.test.1", true);
/// let _active = flags.override_flag("experiments.test", true);
/// ctx.cache().clear_all_namespaces();
/// assert_eq!(bucketer.get_bucket(Some(&ctx), None, false), 1);
/// # Ok::<(), experiment_flags::Error>(())
/// ```
pub struct ExperimentBucketer {
    experiment: Experiment,
    flags: Arc<dyn FlagStore>,
    config: Arc<dyn ConfigStore>,
    enrollments: Arc<dyn EnrollmentLookup>,
    tracker: Arc<dyn TrackingSink>,
    hasher: Arc<dyn BucketHasher>,
    scoped: Mutex<Option<ScopedOverride>>,
}

impl ExperimentBucketer {
    /// Start building a bucketer for `experiment`.
    #[must_use]
    pub fn builder(experiment: Experiment) -> ExperimentBucketerBuilder {
        ExperimentBucketerBuilder::new(experiment)
    }

    /// The experiment being bucketed.
    #[must_use]
    pub const fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    /// Bucket for the request's user in `course` (or outside any course).
    ///
    /// Never fails: missing context, anonymous users, disabled experiments and
    /// users outside the enrollment window all get bucket 0. With `track`, the
    /// first assignment in a session is reported to the tracking sink.
    pub fn get_bucket(
        &self,
        ctx: Option<&RequestContext>,
        course: Option<&CourseKey>,
        track: bool,
    ) -> u32 {
        if let Some(ScopedOverride {
            active,
            bucket: Some(bucket),
        }) = self.scoped()
        {
            return if active { bucket } else { 0 };
        }

        let Some(ctx) = ctx else {
            debug!(
                experiment = %self.experiment.flag_name(),
                "no request context, using bucket 0"
            );
            return 0;
        };

        if ctx.user().is_anonymous() {
            debug!(
                experiment = %self.experiment.flag_name(),
                "anonymous user, using bucket 0"
            );
            return 0;
        }

        let namespace = self.experiment.flag_name();
        let scope = self.experiment_scope(course);

        let decision = if let Some(decision) = ctx.cache().get(&namespace, &scope) {
            decision
        } else {
            let (bucket, source) = self.compute_bucket(ctx, course);
            debug!(
                experiment = %scope,
                bucket,
                source = source.as_str(),
                "bucket decided"
            );
            let decision = BucketDecision::new(bucket);
            ctx.cache().set(&namespace, &scope, decision);
            decision
        };

        if track && !decision.tracked() {
            self.track_once(ctx, course, &scope, decision.bucket());
            ctx.cache().mark_tracked(&namespace, &scope);
        }

        decision.bucket()
    }

    /// Whether the user is in any bucket other than 0.
    pub fn is_enabled(&self, ctx: Option<&RequestContext>, course: Option<&CourseKey>) -> bool {
        self.get_bucket(ctx, course, false) != 0
    }

    /// Whether the parent flag is on for `course`, regardless of bucket.
    pub fn is_experiment_on(&self, course: Option<&CourseKey>) -> bool {
        if let Some(scoped) = self.scoped() {
            return scoped.active;
        }
        self.flags
            .resolve(&self.experiment.flag_name(), course)
            .unwrap_or_else(|| self.experiment.active_by_default())
    }

    /// Force the experiment state until the returned guard is dropped.
    ///
    /// With `bucket`, `get_bucket` returns it directly (or 0 when `active` is
    /// false) without touching caches or tracking. Without, only
    /// `is_experiment_on` is forced and bucketing runs normally. Guards nest;
    /// each restores what it replaced, including during unwinding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BucketOutOfRange`] if `bucket` is not a bucket of the
    /// experiment.
    pub fn override_scope(&self, active: bool, bucket: Option<u32>) -> Result<OverrideGuard<'_>> {
        if let Some(bucket) = bucket {
            if bucket >= self.experiment.num_buckets() {
                return Err(Error::BucketOutOfRange {
                    bucket,
                    num_buckets: self.experiment.num_buckets(),
                });
            }
        }
        let mut slot = self.scoped.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = slot.replace(ScopedOverride { active, bucket });
        Ok(OverrideGuard {
            bucketer: self,
            previous,
        })
    }

    fn scoped(&self) -> Option<ScopedOverride> {
        *self.scoped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `namespace.name`, plus `.course` when bucketing inside a course.
    fn experiment_scope(&self, course: Option<&CourseKey>) -> String {
        let name = self.experiment.flag_name();
        match course {
            Some(course) => format!("{name}.{course}"),
            None => name,
        }
    }

    fn grouping_key(&self, course: Option<&CourseKey>) -> GroupingKey {
        let (namespace, name) = (self.experiment.namespace(), self.experiment.name());
        match course {
            Some(course) if self.experiment.use_course_aware_bucketing() => {
                GroupingKey::course(namespace, name, course)
            }
            _ => GroupingKey::experiment(namespace, name),
        }
    }

    fn compute_bucket(
        &self,
        ctx: &RequestContext,
        course: Option<&CourseKey>,
    ) -> (u32, BucketSource) {
        if !self.is_experiment_on(course) {
            return (0, BucketSource::Disabled);
        }
        if let Some(bucket) = self.forced_bucket(course) {
            return (bucket, BucketSource::Override);
        }
        if !is_eligible(
            &self.experiment,
            ctx.user(),
            course,
            self.config.as_ref(),
            self.enrollments.as_ref(),
            Utc::now(),
        ) {
            return (0, BucketSource::Ineligible);
        }

        let bucket = self.hasher.hash_group(
            self.grouping_key(course).as_str(),
            ctx.user().bucketing_identity(),
            self.experiment.num_buckets(),
        );
        (bucket, BucketSource::Hashed)
    }

    /// Lowest bucket whose override flag is on for `course`.
    fn forced_bucket(&self, course: Option<&CourseKey>) -> Option<u32> {
        let mut forced = (0..self.experiment.num_buckets()).filter(|&bucket| {
            self.experiment
                .bucket_flag_key(bucket)
                .and_then(|key| self.flags.resolve(key, course))
                .unwrap_or(false)
        });
        let first = forced.next()?;
        if let Some(other) = forced.next() {
            warn!(
                experiment = %self.experiment.flag_name(),
                bucket = first,
                ignored = other,
                "several bucket overrides active, using the lowest"
            );
        }
        Some(first)
    }

    fn track_once(
        &self,
        ctx: &RequestContext,
        course: Option<&CourseKey>,
        scope: &str,
        bucket: u32,
    ) {
        let session_key = tracked_key(scope);
        if ctx.session().exists(&session_key) {
            return;
        }
        let Some(user_id) = ctx.user().id() else {
            return;
        };
        if ctx.is_masquerading() {
            return;
        }

        ctx.session().set(&session_key, json!(true));

        let properties = TrackingProperties {
            site: ctx.site().domain().to_string(),
            app_label: self.experiment.namespace().to_string(),
            experiment: self.experiment.name().to_string(),
            bucket,
            course_id: course.map(ToString::to_string),
            is_staff: ctx.user().is_staff(),
            non_interaction: 1,
        };
        match self.tracker.track(user_id, BUCKETED_EVENT, &properties) {
            Ok(()) => info!(user_id, experiment = %scope, bucket, "bucketing tracked"),
            Err(err) => warn!(
                user_id,
                experiment = %scope,
                error = %err,
                "failed to send bucketing event"
            ),
        }
    }
}

impl fmt::Debug for ExperimentBucketer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentBucketer")
            .field("experiment", &self.experiment)
            .field("scoped", &self.scoped())
            .finish_non_exhaustive()
    }
}

/// Restores the previous scoped override of an [`ExperimentBucketer`] on drop.
#[must_use = "the override ends as soon as the guard is dropped"]
pub struct OverrideGuard<'a> {
    bucketer: &'a ExperimentBucketer,
    previous: Option<ScopedOverride>,
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self
            .bucketer
            .scoped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = self.previous.take();
    }
}

impl fmt::Debug for OverrideGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideGuard")
            .field("previous", &self.previous)
            .finish_non_exhaustive()
    }
}

/// Builder for `ExperimentBucketer`.
///
/// Every collaborator defaults to an empty in-memory implementation, the
/// tracker to [`NullTracker`] and the hasher to [`Sha256BucketHasher`].
pub struct ExperimentBucketerBuilder {
    experiment: Experiment,
    flags: Option<Arc<dyn FlagStore>>,
    config: Option<Arc<dyn ConfigStore>>,
    enrollments: Option<Arc<dyn EnrollmentLookup>>,
    tracker: Option<Arc<dyn TrackingSink>>,
    hasher: Option<Arc<dyn BucketHasher>>,
}

impl ExperimentBucketerBuilder {
    /// Create a new builder for `experiment`.
    #[must_use]
    pub fn new(experiment: Experiment) -> Self {
        Self {
            experiment,
            flags: None,
            config: None,
            enrollments: None,
            tracker: None,
            hasher: None,
        }
    }

    /// Set the flag override store.
    #[must_use]
    pub fn flags(mut self, flags: Arc<dyn FlagStore>) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Set the experiment key/value config store.
    #[must_use]
    pub fn config(mut self, config: Arc<dyn ConfigStore>) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the enrollment lookup.
    #[must_use]
    pub fn enrollments(mut self, enrollments: Arc<dyn EnrollmentLookup>) -> Self {
        self.enrollments = Some(enrollments);
        self
    }

    /// Set the tracking sink.
    #[must_use]
    pub fn tracker(mut self, tracker: Arc<dyn TrackingSink>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Replace the stable hash.
    #[must_use]
    pub fn hasher(mut self, hasher: Arc<dyn BucketHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Build the `ExperimentBucketer`.
    #[must_use]
    pub fn build(self) -> ExperimentBucketer {
        ExperimentBucketer {
            experiment: self.experiment,
            flags: self
                .flags
                .unwrap_or_else(|| Arc::new(MemoryFlagStore::new())),
            config: self
                .config
                .unwrap_or_else(|| Arc::new(MemoryConfigStore::new())),
            enrollments: self
                .enrollments
                .unwrap_or_else(|| Arc::new(MemoryEnrollments::new())),
            tracker: self.tracker.unwrap_or_else(|| Arc::new(NullTracker)),
            hasher: self.hasher.unwrap_or_else(|| Arc::new(Sha256BucketHasher)),
            scoped: Mutex::new(None),
        }
    }
}

impl fmt::Debug for ExperimentBucketerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentBucketerBuilder")
            .field("experiment", &self.experiment)
            .finish_non_exhaustive()
    }
}
