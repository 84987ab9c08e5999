pub mod buffer;
pub mod subdivision;

use rstest::*;
use serde_json::json;

use crate::tests::common::{
    begin, error, overlay_result, progress, with_origin, worker_message, InMemoryJobStore, JobRecord, UpdaterHarness,
};
use crate::types::job::{JobOrigin, JobState};

fn overlay_job(job_key: &str) -> InMemoryJobStore {
    InMemoryJobStore::default().with_job(job_key, JobRecord::pending(JobOrigin::Overlay))
}

#[rstest]
#[case::ascending([10.0, 80.0, 45.0])]
#[case::descending([80.0, 45.0, 10.0])]
#[case::middle_first([45.0, 10.0, 80.0])]
#[tokio::test(start_paused = true)]
async fn progress_settles_on_the_highest_value_in_one_flush(#[case] values: [f64; 3]) {
    let harness = UpdaterHarness::new(overlay_job("job-1"));
    for (index, value) in values.iter().enumerate() {
        harness.updater.enqueue_message(progress("job-1", *value, &format!("handle-{index}")));
    }
    harness.settle().await;

    let job = harness.store.job("job-1").unwrap();
    assert_eq!(job.progress_percentage, Some(80.0));
    assert_eq!(job.state, JobState::Processing);
}

#[rstest]
#[case::ascending([10.0, 80.0, 45.0])]
#[case::descending([80.0, 45.0, 10.0])]
#[case::middle_first([45.0, 10.0, 80.0])]
#[tokio::test(start_paused = true)]
async fn progress_never_decreases_across_flushes(#[case] values: [f64; 3]) {
    let harness = UpdaterHarness::new(overlay_job("job-1"));
    for (index, value) in values.iter().enumerate() {
        harness.updater.enqueue_message(progress("job-1", *value, &format!("handle-{index}")));
        harness.settle().await;
    }

    assert_eq!(harness.store.job("job-1").unwrap().progress_percentage, Some(80.0));
}

#[rstest]
#[case::complete(JobState::Complete)]
#[case::error(JobState::Error)]
#[tokio::test(start_paused = true)]
async fn terminal_jobs_ignore_begin_and_progress(#[case] state: JobState) {
    let store = InMemoryJobStore::default().with_job("job-1", JobRecord::pending(JobOrigin::Overlay).with_state(state));
    let harness = UpdaterHarness::new(store);
    let before = harness.store.job("job-1").unwrap();

    harness.updater.enqueue_message(begin("job-1", "handle-begin"));
    harness.updater.enqueue_message(progress("job-1", 55.0, "handle-progress"));
    harness.settle().await;

    assert_eq!(harness.store.job("job-1").unwrap(), before);
    assert!(harness.updater.buffered_job_keys().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn replayed_begin_leaves_the_job_unchanged() {
    let harness = UpdaterHarness::new(overlay_job("job-1"));

    harness.updater.enqueue_message(begin("job-1", "handle-1"));
    harness.settle().await;
    let after_first = harness.store.job("job-1").unwrap();
    assert_eq!(after_first.state, JobState::Processing);
    assert!(after_first.started_at.is_some());

    harness.updater.enqueue_message(begin("job-1", "handle-2"));
    harness.settle().await;

    assert_eq!(harness.store.job("job-1").unwrap(), after_first);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn begin_records_the_log_location_of_overlay_jobs() {
    let harness = UpdaterHarness::new(overlay_job("job-1"));
    harness.updater.enqueue_message(worker_message(
        json!({
            "jobKey": "job-1",
            "type": "begin",
            "logfileUrl": "https://logs.example.com/job-1",
            "logsExpiresAt": "2026-10-20T00:00:00Z"
        }),
        "handle-1",
    ));
    harness.settle().await;

    let job = harness.store.job("job-1").unwrap();
    assert_eq!(job.logs_url.as_deref(), Some("https://logs.example.com/job-1"));
    assert!(job.logs_expires_at.is_some());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn begin_and_progress_are_acknowledged_when_buffered() {
    let harness = UpdaterHarness::new(overlay_job("job-1"));
    harness.store.set_failing(true);

    harness.updater.enqueue_message(begin("job-1", "handle-begin"));
    harness.updater.enqueue_message(progress("job-1", 20.0, "handle-progress"));
    harness.updater.flush().await;

    assert_eq!(harness.acknowledged().await, vec!["handle-begin", "handle-progress"]);
    assert_eq!(harness.updater.buffered_job_keys(), vec!["job-1"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn result_is_acknowledged_only_after_it_is_written() {
    let harness = UpdaterHarness::new(overlay_job("job-1"));
    harness.store.set_failing(true);

    harness.updater.enqueue_message(overlay_result("job-1", json!({ "area": 12.5 }), "handle-result"));
    let summary = harness.updater.flush().await;

    assert_eq!(summary.failed_writes, 1);
    assert_eq!(summary.results, 0);
    assert!(harness.acknowledged().await.is_empty());
    assert_eq!(harness.updater.buffered_job_keys(), vec!["job-1"]);

    harness.store.set_failing(false);
    let summary = harness.updater.flush().await;

    assert_eq!(summary.results, 1);
    assert_eq!(summary.acknowledged, 1);
    assert_eq!(harness.acknowledged().await, vec!["handle-result"]);
    let job = harness.store.job("job-1").unwrap();
    assert_eq!(job.state, JobState::Complete);
    assert_eq!(job.value, Some(json!({ "area": 12.5 })));
    assert_eq!(job.duration_ms, Some(1500.0));
    assert!(harness.updater.buffered_job_keys().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn displaced_result_is_acknowledged_with_its_replacement() {
    let harness = UpdaterHarness::new(overlay_job("job-1"));

    harness.updater.enqueue_message(overlay_result("job-1", json!({ "area": 1 }), "handle-old"));
    harness.updater.enqueue_message(overlay_result("job-1", json!({ "area": 2 }), "handle-new"));
    harness.settle().await;

    assert_eq!(harness.acknowledged().await, vec!["handle-old", "handle-new"]);
    assert_eq!(harness.store.job("job-1").unwrap().value, Some(json!({ "area": 2 })));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn result_wins_over_progress_buffered_in_the_same_flush() {
    let harness = UpdaterHarness::new(overlay_job("job-1"));

    harness.updater.enqueue_message(begin("job-1", "handle-begin"));
    harness.updater.enqueue_message(progress("job-1", 30.0, "handle-progress"));
    harness.updater.enqueue_message(overlay_result("job-1", json!({ "area": 3 }), "handle-result"));
    let summary = harness.updater.flush().await;

    assert_eq!((summary.results, summary.begins, summary.progress), (1, 1, 1));
    let job = harness.store.job("job-1").unwrap();
    assert_eq!(job.state, JobState::Complete);
    assert_eq!(job.progress_percentage, Some(100.0));
    assert!(job.started_at.is_none());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn error_does_not_override_a_completed_job() {
    let store = InMemoryJobStore::default()
        .with_job("job-1", JobRecord::pending(JobOrigin::Overlay).with_state(JobState::Complete));
    let harness = UpdaterHarness::new(store);

    harness.updater.enqueue_message(error("job-1", "worker crashed", "handle-error"));
    harness.settle().await;

    let job = harness.store.job("job-1").unwrap();
    assert_eq!(job.state, JobState::Complete);
    assert_eq!(job.error_message, None);
    assert_eq!(harness.acknowledged().await, vec!["handle-error"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn error_fails_a_running_job() {
    let harness = UpdaterHarness::new(overlay_job("job-1"));

    harness.updater.enqueue_message(error("job-1", "out of memory", "handle-error"));
    harness.settle().await;

    let job = harness.store.job("job-1").unwrap();
    assert_eq!(job.state, JobState::Error);
    assert_eq!(job.error_message.as_deref(), Some("out of memory"));
}

#[rstest]
#[case::progress_out_of_range(json!({ "jobKey": "job-1", "type": "progress", "progress": 150 }))]
#[case::progress_missing(json!({ "jobKey": "job-1", "type": "progress" }))]
#[case::result_missing(json!({ "jobKey": "job-1", "type": "result" }))]
#[case::error_empty(json!({ "jobKey": "job-1", "type": "error", "error": "" }))]
#[case::unknown_type(json!({ "jobKey": "job-1", "type": "finished" }))]
#[case::missing_type(json!({ "jobKey": "job-1" }))]
#[tokio::test(start_paused = true)]
async fn invalid_messages_are_acknowledged_without_writes(#[case] body: serde_json::Value) {
    let harness = UpdaterHarness::new(overlay_job("job-1"));

    harness.updater.enqueue_message(worker_message(body, "handle-invalid"));
    harness.settle().await;

    assert_eq!(harness.store.statements(), 0);
    assert!(harness.updater.buffered_job_keys().is_empty());
    assert_eq!(harness.acknowledged().await, vec!["handle-invalid"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn each_phase_writes_once_per_origin() {
    let store = InMemoryJobStore::default()
        .with_job("overlay-1", JobRecord::pending(JobOrigin::Overlay))
        .with_job("overlay-2", JobRecord::pending(JobOrigin::Overlay))
        .with_job("subdivision-1", JobRecord::pending(JobOrigin::Subdivision));
    let harness = UpdaterHarness::new(store);

    harness.updater.enqueue_message(begin("overlay-1", "h1"));
    harness.updater.enqueue_message(begin("overlay-2", "h2"));
    harness.updater.enqueue_message(with_origin(begin("subdivision-1", "h3"), JobOrigin::Subdivision));
    let summary = harness.updater.flush().await;

    assert_eq!(summary.begins, 3);
    assert_eq!(harness.store.statements(), 2);
    for job_key in ["overlay-1", "overlay-2", "subdivision-1"] {
        assert_eq!(harness.store.job(job_key).unwrap().state, JobState::Processing);
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn subdivision_progress_keeps_its_message() {
    let store = InMemoryJobStore::default().with_job("sub-1", JobRecord::pending(JobOrigin::Subdivision));
    let harness = UpdaterHarness::new(store);

    harness.updater.enqueue_message(worker_message(
        json!({
            "jobKey": "sub-1",
            "type": "progress",
            "origin": "subdivision",
            "progress": 42,
            "message": "Splitting features"
        }),
        "handle-1",
    ));
    harness.settle().await;

    let job = harness.store.job("sub-1").unwrap();
    assert_eq!(job.progress_percentage, Some(42.0));
    assert_eq!(job.progress_message.as_deref(), Some("Splitting features"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn debounced_flush_runs_without_explicit_flush() {
    let harness = UpdaterHarness::new(overlay_job("job-1"));

    harness.updater.enqueue_message(progress("job-1", 64.0, "handle-1"));
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    assert_eq!(harness.store.job("job-1").unwrap().progress_percentage, Some(64.0));
    assert!(harness.updater.buffered_job_keys().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn safety_net_retries_a_failed_write() {
    let harness = UpdaterHarness::new(overlay_job("job-1"));
    harness.store.set_failing(true);

    harness.updater.enqueue_message(overlay_result("job-1", json!({ "area": 9 }), "handle-1"));
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(harness.updater.buffered_job_keys(), vec!["job-1"]);

    harness.store.set_failing(false);
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;

    assert_eq!(harness.store.job("job-1").unwrap().state, JobState::Complete);
    assert!(harness.updater.buffered_job_keys().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn shutdown_writes_what_is_still_buffered() {
    let harness = UpdaterHarness::new(overlay_job("job-1"));

    harness.updater.enqueue_message(overlay_result("job-1", json!({ "area": 4 }), "handle-1"));
    let summary = harness.updater.shutdown().await;
    harness.acknowledger.shutdown().await;

    assert_eq!(summary.results, 1);
    assert_eq!(harness.store.job("job-1").unwrap().state, JobState::Complete);
    assert_eq!(harness.queue.deleted(), vec!["handle-1"]);
    harness.cancellation_token.cancel();
}
