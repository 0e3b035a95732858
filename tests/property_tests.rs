//! Property-based tests for experiment-flags
//!
//! - Hash range and determinism
//! - Idempotence within one request cache
//! - `is_enabled` agrees with `get_bucket`
//! - Disabled experiments and forced buckets win for every user

use std::sync::Arc;

use experiment_flags::hash::{BucketHasher, Sha256BucketHasher};
use experiment_flags::{
    CourseKey, Experiment, ExperimentBucketer, MemoryFlagStore, MemorySessionStore,
    RequestContext, Site, User,
};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn arb_user() -> impl Strategy<Value = User> {
    (1u64..1_000_000, "[a-z][a-z0-9_]{0,15}").prop_map(|(id, name)| User::new(id, name))
}

fn arb_course() -> impl Strategy<Value = Option<CourseKey>> {
    proptest::option::of("[A-Za-z]{1,6}/[A-Za-z0-9]{1,6}/[0-9]{1,4}")
        .prop_map(|key| key.map(|key| CourseKey::new(key).unwrap()))
}

fn context(user: User) -> RequestContext {
    RequestContext::new(user, Site::new("example.com"), Arc::new(MemorySessionStore::new()))
}

fn bucketer(num_buckets: u32, flags: &Arc<MemoryFlagStore>) -> ExperimentBucketer {
    let experiment = Experiment::builder("experiments", "prop")
        .num_buckets(num_buckets)
        .build()
        .unwrap();
    ExperimentBucketer::builder(experiment)
        .flags(flags.clone())
        .build()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the stable hash stays in range and is deterministic
    #[test]
    fn prop_hash_in_range_and_stable(
        group in "[a-z.]{1,30}",
        identity in ".{0,20}",
        num_buckets in 1u32..1000,
    ) {
        let hasher = Sha256BucketHasher;
        let bucket = hasher.hash_group(&group, &identity, num_buckets);
        prop_assert!(bucket < num_buckets);
        prop_assert_eq!(bucket, Sha256BucketHasher.hash_group(&group, &identity, num_buckets));
    }

    /// Property: repeated lookups in one request agree
    #[test]
    fn prop_get_bucket_idempotent(
        user in arb_user(),
        course in arb_course(),
        num_buckets in 1u32..20,
    ) {
        let flags = Arc::new(MemoryFlagStore::new());
        flags.set_global("experiments.prop", Some(true));
        let bucketer = bucketer(num_buckets, &flags);
        let ctx = context(user);

        let first = bucketer.get_bucket(Some(&ctx), course.as_ref(), false);
        prop_assert!(first < num_buckets);
        for _ in 0..3 {
            prop_assert_eq!(bucketer.get_bucket(Some(&ctx), course.as_ref(), true), first);
        }
    }

    /// Property: a disabled experiment puts everyone in bucket 0
    #[test]
    fn prop_disabled_is_always_zero(
        user in arb_user(),
        course in arb_course(),
        forced in proptest::option::of(0u32..5),
    ) {
        let flags = Arc::new(MemoryFlagStore::new());
        flags.set_global("experiments.prop", Some(false));
        if let Some(bucket) = forced {
            flags.set_global(&format!("experiments.prop.{bucket}"), Some(true));
        }
        let bucketer = bucketer(5, &flags);

        prop_assert_eq!(bucketer.get_bucket(Some(&context(user)), course.as_ref(), false), 0);
    }

    /// Property: a forced bucket wins for every user
    #[test]
    fn prop_forced_bucket_wins(
        user in arb_user(),
        course in arb_course(),
        forced in 0u32..5,
    ) {
        let flags = Arc::new(MemoryFlagStore::new());
        flags.set_global("experiments.prop", Some(true));
        flags.set_global(&format!("experiments.prop.{forced}"), Some(true));
        let bucketer = bucketer(5, &flags);

        prop_assert_eq!(
            bucketer.get_bucket(Some(&context(user)), course.as_ref(), false),
            forced
        );
    }

    /// Property: is_enabled == (get_bucket != 0)
    #[test]
    fn prop_is_enabled_matches_bucket(
        user in arb_user(),
        course in arb_course(),
        active in any::<bool>(),
        forced in proptest::option::of(0u32..3),
    ) {
        let flags = Arc::new(MemoryFlagStore::new());
        flags.set_global("experiments.prop", Some(active));
        if let Some(bucket) = forced {
            flags.set_global(&format!("experiments.prop.{bucket}"), Some(true));
        }
        let bucketer = bucketer(3, &flags);
        let ctx = context(user);

        let enabled = bucketer.is_enabled(Some(&ctx), course.as_ref());
        ctx.cache().clear_all_namespaces();
        let bucket = bucketer.get_bucket(Some(&ctx), course.as_ref(), false);
        prop_assert_eq!(enabled, bucket != 0);
    }
}
