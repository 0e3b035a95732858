//! Bucketing Walkthrough
//!
//! Defines an experiment from JSON, configures an enrollment window, buckets a
//! handful of learners and shows tracking firing once per session.
//!
//! Run with: RUST_LOG=debug cargo run --example bucketing_walkthrough

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use experiment_flags::experiment::{ENROLLMENT_END, ENROLLMENT_START};
use experiment_flags::{
    CourseKey, Experiment, ExperimentBucketer, ExperimentKeyValue, MemoryConfigStore,
    MemoryEnrollments, MemoryFlagStore, MemorySessionStore, MemoryTracker, RequestContext, Site,
    User,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Experiment Bucketing ===\n");

    // -------------------------------------------------------------------------
    // 1. Define the experiment
    // -------------------------------------------------------------------------
    println!("1. Defining experiment...");

    let experiment = Experiment::from_json(
        r#"{
            "namespace": "course_experience",
            "name": "weekly_goals",
            "experiment_id": 7,
            "num_buckets": 3,
            "use_course_aware_bucketing": true
        }"#,
    )?;
    println!("   Flag: {}", experiment.flag_name());
    println!("   Buckets: {}", experiment.num_buckets());
    println!("   Override flags: {:?}", experiment.bucket_flag_keys());

    // -------------------------------------------------------------------------
    // 2. Wire collaborators
    // -------------------------------------------------------------------------
    println!("\n2. Configuring flags, window and enrollments...");

    let flags = Arc::new(MemoryFlagStore::new());
    flags.set_global(&experiment.flag_name(), Some(true));

    let config = Arc::new(MemoryConfigStore::from_records([
        ExperimentKeyValue::new(7, ENROLLMENT_START, "2024-01-01"),
        ExperimentKeyValue::new(7, ENROLLMENT_END, "9999-01-01"),
    ]));

    let course = CourseKey::new("course-v1:Demo+CS101+2024")?;
    let early = User::new(1, "early_bird");
    let enrollments = Arc::new(MemoryEnrollments::new());
    enrollments.enroll(
        &early,
        &course,
        Utc.with_ymd_and_hms(2023, 9, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid enrollment date"))?,
    );

    let tracker = Arc::new(MemoryTracker::new());
    let bucketer = ExperimentBucketer::builder(experiment)
        .flags(flags.clone())
        .config(config)
        .enrollments(enrollments)
        .tracker(tracker.clone())
        .build();

    // -------------------------------------------------------------------------
    // 3. Bucket learners
    // -------------------------------------------------------------------------
    println!("\n3. Bucketing learners...");

    let site = Site::new("learn.example.com");
    let mut learners = vec![early];
    learners.extend((2..=6).map(|id| User::new(id, format!("learner{id}"))));

    for user in learners {
        let session = Arc::new(MemorySessionStore::new());
        let ctx = RequestContext::new(user.clone(), site.clone(), session.clone());
        let bucket = bucketer.get_bucket(Some(&ctx), Some(&course), true);

        // A later request in the same session reuses the marker.
        let next = RequestContext::new(user.clone(), site.clone(), session);
        let again = bucketer.get_bucket(Some(&next), Some(&course), true);

        println!("   {:<12} bucket={bucket} (next request: {again})", user.username());
    }

    // -------------------------------------------------------------------------
    // 4. Force a bucket for one course
    // -------------------------------------------------------------------------
    println!("\n4. Forcing bucket 2 in the course...");
    {
        let _forced = flags.override_course_flag("course_experience.weekly_goals.2", &course, true);
        let ctx = RequestContext::new(
            User::new(99, "forced"),
            site.clone(),
            Arc::new(MemorySessionStore::new()),
        );
        println!(
            "   forced learner bucket={}",
            bucketer.get_bucket(Some(&ctx), Some(&course), false)
        );
    }

    // -------------------------------------------------------------------------
    // 5. Tracking summary
    // -------------------------------------------------------------------------
    println!("\n5. Tracking events sent: {}", tracker.len());
    for event in tracker.events() {
        println!("   {}", serde_json::to_string(&event.properties)?);
    }

    Ok(())
}
