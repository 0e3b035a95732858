//! Stable bucketing hash
//!
//! Bucket assignment must survive process restarts and deploys, so the hash is
//! a cryptographic digest rather than `std`'s randomly seeded `SipHash`.
//!
//! The grouping key decides which assignments correlate: every experiment (and,
//! for course-aware experiments, every course) gets its own key, so one user can
//! land in different buckets for different experiments.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::context::CourseKey;

/// Maps a `(group, identity)` pair onto a bucket index.
///
/// Implementations must be pure: identical inputs give identical outputs in
/// every process. The returned value must be in `0..num_buckets`.
pub trait BucketHasher: Send + Sync {
    /// Hash `identity` within `group_name` into `0..num_buckets`.
    fn hash_group(&self, group_name: &str, identity: &str, num_buckets: u32) -> u32;
}

/// SHA-256 backed [`BucketHasher`].
///
/// The digest of the length-prefixed `group_name` followed by `identity` is
/// truncated to its first eight bytes (big-endian) and reduced modulo the
/// bucket count.
///
/// # Example
///
/// ```rust
/// use experiment_flags::hash::{BucketHasher, Sha256BucketHasher};
///
/// let hasher = Sha256BucketHasher;
/// let bucket = hasher.hash_group("experiments.test", "alice", 4);
/// assert!(bucket < 4);
/// assert_eq!(bucket, hasher.hash_group("experiments.test", "alice", 4));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256BucketHasher;

impl BucketHasher for Sha256BucketHasher {
    fn hash_group(&self, group_name: &str, identity: &str, num_buckets: u32) -> u32 {
        if num_buckets <= 1 {
            return 0;
        }
        let value = group_digest(group_name, identity) % u64::from(num_buckets);

        // value < num_buckets <= u32::MAX
        u32::try_from(value).unwrap_or(0)
    }
}

/// First 8 bytes (big-endian) of `SHA-256(len(group) ++ group ++ identity)`.
///
/// The length prefix keeps `("exp.a.x/y/1", "1abc")` and
/// `("exp.a.x/y/11", "abc")` apart.
fn group_digest(group_name: &str, identity: &str) -> u64 {
    let group_len = u64::try_from(group_name.len()).unwrap_or(u64::MAX);

    let mut hasher = Sha256::new();
    hasher.update(group_len.to_be_bytes());
    hasher.update(group_name.as_bytes());
    hasher.update(identity.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Grouping key fed to the hasher: `namespace.name[.course]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupingKey(String);

impl GroupingKey {
    /// Key shared by every course (course-unaware hashing, or no course given).
    #[must_use]
    pub fn experiment(namespace: &str, name: &str) -> Self {
        Self(format!("{namespace}.{name}"))
    }

    /// Key specific to one course.
    #[must_use]
    pub fn course(namespace: &str, name: &str, course: &CourseKey) -> Self {
        Self(format!("{namespace}.{name}.{course}"))
    }

    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
