//! Enrollment-window eligibility
//!
//! An experiment may restrict bucketing to users whose course enrollment was
//! created inside `[enrollment_start, enrollment_end)`. Users without an
//! enrollment are judged as if they enrolled right now, so the pre-enroll and
//! post-enroll experience stays the same.
//!
//! Malformed window dates never raise. They exclude users that have an
//! enrollment to compare against and are ignored for users that do not.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use crate::context::{CourseKey, User};
use crate::enrollment::EnrollmentLookup;
use crate::experiment::{ConfigStore, Experiment, ENROLLMENT_END, ENROLLMENT_START};

/// One side of an enrollment window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowBound {
    /// No value configured.
    Unset,
    /// A parsed date.
    At(DateTime<Utc>),
    /// A configured value that is not a date.
    Malformed(String),
}

impl WindowBound {
    /// Interpret an optional raw config value.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Unset,
            Some(raw) => parse_date(raw).map_or_else(|| Self::Malformed(raw.to_string()), Self::At),
        }
    }

    /// Whether anything is configured, valid or not.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

/// Parse a window date: RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`
/// or a bare `YYYY-MM-DD` (midnight). Naive values are taken as UTC.
#[must_use]
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

/// The configured enrollment window of one experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentWindow {
    start: WindowBound,
    end: WindowBound,
}

impl EnrollmentWindow {
    /// Build a window from explicit bounds.
    #[must_use]
    pub const fn new(start: WindowBound, end: WindowBound) -> Self {
        Self { start, end }
    }

    /// Read the window keys for `experiment_id` from a config store.
    #[must_use]
    pub fn from_config(config: &dyn ConfigStore, experiment_id: i64) -> Self {
        Self {
            start: WindowBound::parse(
                config
                    .get_config_value(experiment_id, ENROLLMENT_START)
                    .as_deref(),
            ),
            end: WindowBound::parse(
                config
                    .get_config_value(experiment_id, ENROLLMENT_END)
                    .as_deref(),
            ),
        }
    }

    /// Start bound.
    #[must_use]
    pub const fn start(&self) -> &WindowBound {
        &self.start
    }

    /// End bound.
    #[must_use]
    pub const fn end(&self) -> &WindowBound {
        &self.end
    }

    /// Whether neither bound is configured.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        !self.start.is_set() && !self.end.is_set()
    }

    /// Decide eligibility for an enrollment created at `enrolled`
    /// (`None` when the user is not enrolled), evaluated at `now`.
    ///
    /// The start bound is inclusive and the end bound exclusive.
    #[must_use]
    pub fn admits(&self, enrolled: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let effective = enrolled.unwrap_or(now);

        let after_start = match &self.start {
            WindowBound::Unset => true,
            WindowBound::At(start) => effective >= *start,
            WindowBound::Malformed(_) => enrolled.is_none(),
        };
        let before_end = match &self.end {
            WindowBound::Unset => true,
            WindowBound::At(end) => effective < *end,
            WindowBound::Malformed(_) => enrolled.is_none(),
        };

        after_start && before_end
    }
}

/// Whether `user` may be bucketed normally for `experiment` in `course`.
///
/// Windows only apply inside a course and when the experiment has an
/// `experiment_id` to read configuration from.
pub fn is_eligible(
    experiment: &Experiment,
    user: &User,
    course: Option<&CourseKey>,
    config: &dyn ConfigStore,
    enrollments: &dyn EnrollmentLookup,
    now: DateTime<Utc>,
) -> bool {
    let (Some(course), Some(experiment_id)) = (course, experiment.experiment_id()) else {
        return true;
    };

    let window = EnrollmentWindow::from_config(config, experiment_id);
    if window.is_unbounded() {
        return true;
    }

    let enrolled = enrollments.enrollment_created(user, course);
    for (key, bound) in [(ENROLLMENT_START, &window.start), (ENROLLMENT_END, &window.end)] {
        if let WindowBound::Malformed(raw) = bound {
            warn!(
                experiment_id,
                key,
                value = %raw,
                enrolled = enrolled.is_some(),
                "could not parse enrollment window date"
            );
        }
    }

    window.admits(enrolled, now)
}
