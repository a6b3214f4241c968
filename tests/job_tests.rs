//! Job notification tracking through the public API

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use fundtree::jobs::{
    CompletionStatus, FileJobSource, JobFilter, JobNotification, JobPoller, JobRegistry, JobState,
    RunningStatus,
};

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap()
}

fn notification(job_id: &str, status: RunningStatus, minute: u32) -> JobNotification {
    JobNotification {
        job_id: job_id.into(),
        job_type: "RefreshFundingJob".into(),
        specification_id: Some("spec-1".into()),
        running_status: status,
        completion_status: None,
        outcome: None,
        failures: Vec::new(),
        invoker_user_display_name: None,
        created: at(minute),
        last_updated: at(minute),
    }
}

fn failed(job_id: &str, minute: u32) -> JobNotification {
    JobNotification {
        completion_status: Some(CompletionStatus::Failed),
        outcome: Some("Refresh failed".into()),
        ..notification(job_id, RunningStatus::Completed, minute)
    }
}

/// Replace the notifications file in one step so a poll never sees half a file
fn publish(dir: &TempDir, notifications: &[JobNotification]) {
    let staging = dir.path().join("jobs.json.tmp");
    fs::write(&staging, serde_json::to_string(notifications).unwrap()).unwrap();
    fs::rename(&staging, dir.path().join("jobs.json")).unwrap();
}

#[test]
fn later_job_replaces_earlier_one() {
    let mut registry = JobRegistry::new();
    let sub = registry.subscribe(JobFilter::for_specification("spec-1"));

    registry.notify(&notification("N1", RunningStatus::Queued, 0));
    registry.notify(&failed("N2", 5));

    let banners = registry.banners();
    assert_eq!(banners.len(), 1);
    assert_eq!(banners[0].job_id, "N2");
    assert_eq!(banners[0].state, JobState::Completed(CompletionStatus::Failed));
    assert_eq!(banners[0].summary.as_deref(), Some("Refresh failed"));

    // a late status for the older job does not bring it back
    assert!(registry.notify(&notification("N1", RunningStatus::InProgress, 1)).is_empty());
    assert_eq!(registry.latest(sub).unwrap().job_id, "N2");
}

#[test]
fn subscriptions_track_independently() {
    let mut registry = JobRegistry::new();
    let by_spec = registry.subscribe(JobFilter::for_specification("spec-1"));
    let by_job = registry.subscribe(JobFilter::for_job("N1"));
    let by_type = registry
        .subscribe(JobFilter::default().with_job_types(["AssignTemplateCalculationsJob"]));

    let changed = registry.notify(&notification("N1", RunningStatus::InProgress, 0));
    assert_eq!(changed, vec![by_spec, by_job]);
    registry.notify(&notification("N2", RunningStatus::Queued, 3));

    assert_eq!(registry.latest(by_spec).unwrap().job_id, "N2");
    assert_eq!(registry.latest(by_job).unwrap().job_id, "N1");
    assert!(registry.latest(by_type).is_none());
    assert!(!registry.is_settled());

    assert!(registry.unsubscribe(by_type));
    registry.notify(&failed("N2", 3));
    registry.notify(&JobNotification {
        last_updated: at(9),
        ..notification("N1", RunningStatus::Completed, 0)
    });
    assert!(registry.is_settled());
}

#[tokio::test]
async fn poller_follows_a_job_to_completion() {
    let dir = TempDir::new().unwrap();
    publish(&dir, &[notification("N1", RunningStatus::Queued, 0)]);

    let mut registry = JobRegistry::new();
    registry.subscribe(JobFilter::for_job("N1"));
    let registry = Arc::new(RwLock::new(registry));

    let source = Arc::new(FileJobSource::new(dir.path().join("jobs.json")));
    let handle = JobPoller::new(source, Duration::from_millis(10))
        .stop_when_settled(true)
        .start(&registry);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());
    assert_eq!(registry.read().banners()[0].state, JobState::Queued);

    publish(
        &dir,
        &[JobNotification {
            last_updated: at(7),
            ..failed("N1", 0)
        }],
    );
    let polls = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .unwrap();
    assert!(polls >= 2);

    let banners = registry.read().banners();
    assert!(banners[0].is_error());
    assert_eq!(banners[0].title, "Refresh funding job failed");
}

#[tokio::test]
async fn missing_file_keeps_polling_until_stopped() {
    let dir = TempDir::new().unwrap();
    let mut registry = JobRegistry::new();
    registry.subscribe(JobFilter::for_job("N1"));
    let registry = Arc::new(RwLock::new(registry));

    let source = Arc::new(FileJobSource::new(dir.path().join("absent.json")));
    let handle = JobPoller::new(source, Duration::from_millis(10))
        .stop_when_settled(true)
        .start(&registry);

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(!handle.is_finished());
    assert!(handle.stop().await >= 1);
    assert!(registry.read().banners().is_empty());
}
