//! Request-scoped bucketing context
//!
//! Callers build one [`RequestContext`] per incoming request and pass it into
//! every bucketing call. It carries the user, the site, the fast per-request
//! decision cache and a handle to the durable session store.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::RequestCache;
use crate::session::SessionStore;
use crate::{Error, Result};

/// Opaque course identifier such as `a/b/c` or `course-v1:Org+Course+Run`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseKey(String);

impl CourseKey {
    /// Validate and wrap a course key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCourseKey`] if the key is empty or contains
    /// whitespace.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(Error::InvalidCourseKey(key));
        }
        Ok(Self(key))
    }

    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CourseKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CourseKey> for String {
    fn from(key: CourseKey) -> Self {
        key.0
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user a request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: Option<u64>,
    username: String,
    is_staff: bool,
}

impl User {
    /// Create an authenticated user.
    #[must_use]
    pub fn new(id: u64, username: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            username: username.into(),
            is_staff: false,
        }
    }

    /// An unauthenticated visitor. Always in bucket 0 and never tracked.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            id: None,
            username: String::new(),
            is_staff: false,
        }
    }

    /// Mark the user as staff.
    #[must_use]
    pub const fn with_staff(mut self, is_staff: bool) -> Self {
        self.is_staff = is_staff;
        self
    }

    /// Database id, `None` when anonymous.
    #[must_use]
    pub const fn id(&self) -> Option<u64> {
        self.id
    }

    /// Username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether the user is staff.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.is_staff
    }

    /// Whether the user is anonymous.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        self.id.is_none()
    }

    /// Identity fed to the bucketing hash.
    #[must_use]
    pub fn bucketing_identity(&self) -> &str {
        &self.username
    }
}

/// The site serving the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    domain: String,
}

impl Site {
    /// Create a site from its domain.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    /// Site domain, reported with tracking events.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// Everything bucketing needs to know about the current request.
pub struct RequestContext {
    user: User,
    site: Site,
    session: Arc<dyn SessionStore>,
    cache: RequestCache,
    masquerading: bool,
}

impl RequestContext {
    /// Create a context with a fresh request cache.
    ///
    /// The session handle is shared: pass the same store to every request of
    /// one session so "already tracked" markers survive between requests.
    #[must_use]
    pub fn new(user: User, site: Site, session: Arc<dyn SessionStore>) -> Self {
        Self {
            user,
            site,
            session,
            cache: RequestCache::new(),
            masquerading: false,
        }
    }

    /// Mark the request as staff masquerading as a specific learner.
    #[must_use]
    pub const fn with_masquerading(mut self, masquerading: bool) -> Self {
        self.masquerading = masquerading;
        self
    }

    /// Requesting user.
    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }

    /// Serving site.
    #[must_use]
    pub const fn site(&self) -> &Site {
        &self.site
    }

    /// Durable session store.
    #[must_use]
    pub fn session(&self) -> &dyn SessionStore {
        self.session.as_ref()
    }

    /// Fast per-request decision cache.
    #[must_use]
    pub const fn cache(&self) -> &RequestCache {
        &self.cache
    }

    /// Whether staff is viewing the request as another learner.
    #[must_use]
    pub const fn is_masquerading(&self) -> bool {
        self.masquerading
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("user", &self.user)
            .field("site", &self.site)
            .field("cache", &self.cache)
            .field("masquerading", &self.masquerading)
            .finish_non_exhaustive()
    }
}
