//! Course enrollment lookup

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::context::{CourseKey, User};

/// Answers "when did this user enroll in this course?".
pub trait EnrollmentLookup: Send + Sync {
    /// Creation time of the user's enrollment, or `None` if not enrolled.
    fn enrollment_created(&self, user: &User, course: &CourseKey) -> Option<DateTime<Utc>>;
}

/// In-memory [`EnrollmentLookup`] keyed by user id.
#[derive(Debug, Default)]
pub struct MemoryEnrollments {
    enrollments: DashMap<(u64, CourseKey), DateTime<Utc>>,
}

impl MemoryEnrollments {
    /// Create an empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an enrollment. Anonymous users cannot enroll and are ignored.
    pub fn enroll(&self, user: &User, course: &CourseKey, created: DateTime<Utc>) {
        if let Some(id) = user.id() {
            self.enrollments.insert((id, course.clone()), created);
        }
    }

    /// Remove an enrollment.
    pub fn unenroll(&self, user: &User, course: &CourseKey) {
        if let Some(id) = user.id() {
            self.enrollments.remove(&(id, course.clone()));
        }
    }
}

impl EnrollmentLookup for MemoryEnrollments {
    fn enrollment_created(&self, user: &User, course: &CourseKey) -> Option<DateTime<Utc>> {
        let id = user.id()?;
        self.enrollments
            .get(&(id, course.clone()))
            .map(|created| *created.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_enroll_and_lookup() {
        let enrollments = MemoryEnrollments::new();
        let user = User::new(1, "learner");
        let course = CourseKey::new("a/b/c").unwrap();
        let created = Utc.with_ymd_and_hms(2012, 1, 7, 0, 0, 0).unwrap();

        assert_eq!(enrollments.enrollment_created(&user, &course), None);
        enrollments.enroll(&user, &course, created);
        assert_eq!(enrollments.enrollment_created(&user, &course), Some(created));

        enrollments.unenroll(&user, &course);
        assert_eq!(enrollments.enrollment_created(&user, &course), None);
    }

    #[test]
    fn test_anonymous_never_enrolled() {
        let enrollments = MemoryEnrollments::new();
        let course = CourseKey::new("a/b/c").unwrap();
        enrollments.enroll(&User::anonymous(), &course, Utc::now());
        assert_eq!(
            enrollments.enrollment_created(&User::anonymous(), &course),
            None
        );
    }
}
