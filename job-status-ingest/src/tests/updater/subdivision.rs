use assert_matches::assert_matches;
use rstest::*;
use serde_json::{json, Value};

use crate::tests::common::{output_params, worker_message, InMemoryJobStore, JobRecord, UpdaterHarness};
use crate::types::job::{JobOrigin, JobState};
use crate::types::params::OutputParams;
use crate::worker::updater::subdivision::output_from_result;

fn subdivision_result(job_key: &str, result: Value, receipt_handle: &str) -> crate::types::message::WorkerMessage {
    worker_message(
        json!({ "jobKey": job_key, "type": "result", "origin": "subdivision", "result": result }),
        receipt_handle,
    )
}

fn subdivision_job(job_key: &str) -> InMemoryJobStore {
    InMemoryJobStore::default().with_job(job_key, JobRecord::pending(JobOrigin::Subdivision))
}

#[rstest]
fn output_defaults_follow_the_uploaded_key(output_params: OutputParams) {
    let output =
        output_from_result(&json!({ "object": { "bucket": "uploads", "key": "projects/3/layer.fgb" } }), &output_params)
            .unwrap();

    assert_eq!(output.remote, "r2://uploads/projects/3/layer.fgb");
    assert_eq!(output.url, "https://uploads.seasketch.org/projects/3/layer.fgb");
    assert_eq!(output.filename, "projects/3/layer.fgb");
    assert_eq!(output.size, 0);
    assert_eq!(output.epsg, 4326);
}

#[rstest]
fn output_prefers_reported_fields(output_params: OutputParams) {
    let output = output_from_result(
        &json!({
            "object": {
                "bucket": "uploads",
                "key": "abc.fgb",
                "publicUrl": "https://cdn.example.com/abc.fgb",
                "size": 2048,
                "filename": "Reefs.fgb",
                "epsg": 3857
            }
        }),
        &output_params,
    )
    .unwrap();

    assert_eq!(output.url, "https://cdn.example.com/abc.fgb");
    assert_eq!(output.filename, "Reefs.fgb");
    assert_eq!(output.size, 2048);
    assert_eq!(output.epsg, 3857);
}

#[rstest]
#[case::no_object(json!({}), "object")]
#[case::no_bucket(json!({ "object": { "key": "abc.fgb" } }), "object.bucket")]
#[case::no_key(json!({ "object": { "bucket": "uploads" } }), "object.key")]
#[case::not_an_object(json!("done"), "malformed")]
fn output_requires_a_locator(output_params: OutputParams, #[case] result: Value, #[case] mentions: &str) {
    let reason = output_from_result(&result, &output_params).unwrap_err();
    assert!(reason.contains(mentions), "{reason}");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn result_records_an_output_and_completes_the_job() {
    let harness = UpdaterHarness::new(subdivision_job("sub-1"));

    harness.updater.enqueue_message(subdivision_result(
        "sub-1",
        json!({ "object": { "bucket": "uploads", "key": "sub-1.fgb", "size": 512 } }),
        "handle-1",
    ));
    harness.settle().await;

    let job = harness.store.job("sub-1").unwrap();
    assert_eq!(job.state, JobState::Complete);
    assert_eq!(job.progress_percentage, Some(100.0));
    let outputs = harness.store.outputs();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].0, "sub-1");
    assert_eq!(outputs[0].1.remote, "r2://uploads/sub-1.fgb");
    assert_eq!(outputs[0].1.size, 512);
    assert_eq!(harness.acknowledged().await, vec!["handle-1"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn result_without_locator_fails_the_job() {
    let harness = UpdaterHarness::new(subdivision_job("sub-1"));

    harness.updater.enqueue_message(subdivision_result("sub-1", json!({ "object": { "bucket": "uploads" } }), "h1"));
    harness.settle().await;

    let job = harness.store.job("sub-1").unwrap();
    assert_eq!(job.state, JobState::Error);
    assert_matches!(job.error_message.as_deref(), Some(message) if message.contains("object.key"));
    assert!(harness.store.outputs().is_empty());
    assert_eq!(harness.acknowledged().await, vec!["h1"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn redelivered_result_adds_no_second_output() {
    let harness = UpdaterHarness::new(subdivision_job("sub-1"));
    let result = json!({ "object": { "bucket": "uploads", "key": "sub-1.fgb" } });

    harness.updater.enqueue_message(subdivision_result("sub-1", result.clone(), "h1"));
    harness.settle().await;
    harness.updater.enqueue_message(subdivision_result("sub-1", result, "h2"));
    harness.settle().await;

    assert_eq!(harness.store.outputs().len(), 1);
    assert_eq!(harness.acknowledged().await, vec!["h1", "h2"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn result_for_unknown_job_is_acknowledged() {
    let harness = UpdaterHarness::new(InMemoryJobStore::default());

    harness.updater.enqueue_message(subdivision_result(
        "missing",
        json!({ "object": { "bucket": "uploads", "key": "x.fgb" } }),
        "h1",
    ));
    harness.settle().await;

    assert!(harness.store.outputs().is_empty());
    assert!(harness.updater.buffered_job_keys().is_empty());
    assert_eq!(harness.acknowledged().await, vec!["h1"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failed_lookup_keeps_the_result_buffered() {
    let harness = UpdaterHarness::new(subdivision_job("sub-1"));
    harness.store.set_failing(true);

    harness.updater.enqueue_message(subdivision_result(
        "sub-1",
        json!({ "object": { "bucket": "uploads", "key": "sub-1.fgb" } }),
        "h1",
    ));
    let summary = harness.updater.flush().await;

    assert_eq!(summary.failed_writes, 1);
    assert_eq!(harness.updater.buffered_job_keys(), vec!["sub-1"]);
    assert!(harness.acknowledged().await.is_empty());
}
