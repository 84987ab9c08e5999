use rstest::*;
use serde_json::json;

use crate::tests::common::{begin, error, overlay_result, progress};
use crate::types::message::{JobStatusMessage, WorkerMessage};
use crate::worker::updater::buffer::{begin_slot, progress_slot, result_slot, Buffers};

fn status(message: WorkerMessage) -> JobStatusMessage {
    JobStatusMessage::try_from(message).unwrap()
}

#[rstest]
fn lower_progress_is_dropped() {
    let mut buffers = Buffers::default();

    assert!(buffers.insert(status(progress("job-1", 60.0, "h1"))));
    assert!(!buffers.insert(status(progress("job-1", 30.0, "h2"))));
    assert!(buffers.insert(status(progress("job-1", 60.0, "h3"))));

    let held = buffers.get("job-1").unwrap().progress.as_ref().unwrap();
    assert_eq!(held.update.progress, 60.0);
    assert!(held.receipt_handles.is_empty());
}

#[rstest]
fn replaced_result_carries_the_displaced_handle() {
    let mut buffers = Buffers::default();
    buffers.insert(status(overlay_result("job-1", json!({ "run": 1 }), "h1")));
    buffers.insert(status(overlay_result("job-1", json!({ "run": 2 }), "h2")));

    let held = buffers.get("job-1").unwrap().result.as_ref().unwrap();
    assert_eq!(held.update.result, json!({ "run": 2 }));
    assert_eq!(held.receipt_handles, vec!["h1", "h2"]);
}

#[rstest]
fn message_types_occupy_separate_slots() {
    let mut buffers = Buffers::default();
    buffers.insert(status(begin("job-1", "h1")));
    buffers.insert(status(progress("job-1", 10.0, "h2")));
    buffers.insert(status(error("job-1", "boom", "h3")));

    let job = buffers.get("job-1").unwrap();
    assert!(job.begin.is_some() && job.progress.is_some() && job.error.is_some());
    assert!(job.result.is_none());
}

#[rstest]
fn completing_an_unchanged_snapshot_clears_the_job() {
    let mut buffers = Buffers::default();
    buffers.insert(status(begin("job-1", "h1")));

    let snapshot = buffers.snapshot(begin_slot);
    assert_eq!(snapshot.len(), 1);
    assert!(buffers.complete(begin_slot, &snapshot).is_empty());

    assert!(buffers.is_empty());
}

#[rstest]
fn slot_replaced_during_a_write_survives_completion() {
    let mut buffers = Buffers::default();
    buffers.insert(status(progress("job-1", 20.0, "h1")));
    let snapshot = buffers.snapshot(progress_slot);

    buffers.insert(status(progress("job-1", 70.0, "h2")));
    buffers.complete(progress_slot, &snapshot);

    let held = buffers.get("job-1").unwrap().progress.as_ref().unwrap();
    assert_eq!(held.update.progress, 70.0);
}

#[rstest]
fn written_handles_are_released_from_a_replacing_result() {
    let mut buffers = Buffers::default();
    buffers.insert(status(overlay_result("job-1", json!({ "run": 1 }), "h1")));
    let snapshot = buffers.snapshot(result_slot);

    buffers.insert(status(overlay_result("job-1", json!({ "run": 2 }), "h2")));
    let acknowledged = buffers.complete(result_slot, &snapshot);

    assert_eq!(acknowledged, vec!["h1"]);
    let held = buffers.get("job-1").unwrap().result.as_ref().unwrap();
    assert_eq!(held.receipt_handles, vec!["h2"]);
    assert_eq!(buffers.job_keys(), vec!["job-1"]);
}
