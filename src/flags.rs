//! Feature-flag override lookup
//!
//! Flags are looked up by name. An override can be global or scoped to one
//! course; a course-scoped override wins over the global one for that course.

use dashmap::DashMap;

use crate::context::CourseKey;

/// Source of flag overrides.
pub trait FlagStore: Send + Sync {
    /// Global override for `flag`, if one is set.
    fn global_override(&self, flag: &str) -> Option<bool>;

    /// Override for `flag` scoped to `course`, if one is set.
    fn course_override(&self, flag: &str, course: &CourseKey) -> Option<bool>;

    /// Effective override: course-scoped first, then global.
    fn resolve(&self, flag: &str, course: Option<&CourseKey>) -> Option<bool> {
        course
            .and_then(|course| self.course_override(flag, course))
            .or_else(|| self.global_override(flag))
    }
}

/// In-memory [`FlagStore`].
///
/// # Example
///
/// ```rust
/// use experiment_flags::flags::{FlagStore, MemoryFlagStore};
///
/// let flags = MemoryFlagStore::new();
/// {
///     let _guard = flags.override_flag("experiments.test", true);
///     assert_eq!(flags.resolve("experiments.test", None), Some(true));
/// }
/// assert_eq!(flags.resolve("experiments.test", None), None);
/// ```
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    global: DashMap<String, bool>,
    course: DashMap<(String, CourseKey), bool>,
}

impl MemoryFlagStore {
    /// Create a store with no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or with `None`, remove) a global override.
    pub fn set_global(&self, flag: &str, active: Option<bool>) {
        match active {
            Some(active) => {
                self.global.insert(flag.to_string(), active);
            }
            None => {
                self.global.remove(flag);
            }
        }
    }

    /// Set (or with `None`, remove) a course-scoped override.
    pub fn set_course(&self, flag: &str, course: &CourseKey, active: Option<bool>) {
        let key = (flag.to_string(), course.clone());
        match active {
            Some(active) => {
                self.course.insert(key, active);
            }
            None => {
                self.course.remove(&key);
            }
        }
    }

    /// Force a global override until the returned guard is dropped.
    #[must_use = "the override is removed as soon as the guard is dropped"]
    pub fn override_flag(&self, flag: &str, active: bool) -> FlagOverrideGuard<'_> {
        let previous = self.global_override(flag);
        self.set_global(flag, Some(active));
        FlagOverrideGuard {
            store: self,
            flag: flag.to_string(),
            course: None,
            previous,
        }
    }

    /// Force a course-scoped override until the returned guard is dropped.
    #[must_use = "the override is removed as soon as the guard is dropped"]
    pub fn override_course_flag(
        &self,
        flag: &str,
        course: &CourseKey,
        active: bool,
    ) -> FlagOverrideGuard<'_> {
        let previous = self.course_override(flag, course);
        self.set_course(flag, course, Some(active));
        FlagOverrideGuard {
            store: self,
            flag: flag.to_string(),
            course: Some(course.clone()),
            previous,
        }
    }
}

impl FlagStore for MemoryFlagStore {
    fn global_override(&self, flag: &str) -> Option<bool> {
        self.global.get(flag).map(|v| *v.value())
    }

    fn course_override(&self, flag: &str, course: &CourseKey) -> Option<bool> {
        self.course
            .get(&(flag.to_string(), course.clone()))
            .map(|v| *v.value())
    }
}

/// Restores a [`MemoryFlagStore`] override to its previous state on drop.
#[derive(Debug)]
pub struct FlagOverrideGuard<'a> {
    store: &'a MemoryFlagStore,
    flag: String,
    course: Option<CourseKey>,
    previous: Option<bool>,
}

impl Drop for FlagOverrideGuard<'_> {
    fn drop(&mut self) {
        match &self.course {
            Some(course) => self.store.set_course(&self.flag, course, self.previous),
            None => self.store.set_global(&self.flag, self.previous),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(key: &str) -> CourseKey {
        CourseKey::new(key).unwrap()
    }

    #[test]
    fn test_course_override_wins() {
        let flags = MemoryFlagStore::new();
        let c = course("a/b/c");
        flags.set_global("f", Some(true));
        flags.set_course("f", &c, Some(false));

        assert_eq!(flags.resolve("f", Some(&c)), Some(false));
        assert_eq!(flags.resolve("f", Some(&course("x/y/z"))), Some(true));
        assert_eq!(flags.resolve("f", None), Some(true));
    }

    #[test]
    fn test_override_guard_restores_previous() {
        let flags = MemoryFlagStore::new();
        flags.set_global("f", Some(false));
        {
            let _outer = flags.override_flag("f", true);
            assert_eq!(flags.global_override("f"), Some(true));
            {
                let _inner = flags.override_flag("f", false);
                assert_eq!(flags.global_override("f"), Some(false));
            }
            assert_eq!(flags.global_override("f"), Some(true));
        }
        assert_eq!(flags.global_override("f"), Some(false));
    }

    #[test]
    fn test_course_override_guard_removes_on_drop() {
        let flags = MemoryFlagStore::new();
        let c = course("a/b/c");
        {
            let _guard = flags.override_course_flag("f", &c, true);
            assert_eq!(flags.resolve("f", Some(&c)), Some(true));
        }
        assert_eq!(flags.resolve("f", Some(&c)), None);
    }

    #[test]
    fn test_override_guard_restores_on_panic() {
        let flags = MemoryFlagStore::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = flags.override_flag("f", true);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(flags.global_override("f"), None);
    }
}
