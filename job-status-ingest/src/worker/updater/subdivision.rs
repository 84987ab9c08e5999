//! Result handling for subdivision jobs.
//!
//! A subdivision worker reports the object it uploaded. Completing the job
//! means recording that object as a derived output of the job's data source,
//! so the payload is checked before anything is written.

use serde::Deserialize;
use tracing::{info, warn};

use crate::core::client::database::DatabaseError;
use crate::core::client::JobStore;
use crate::types::constant::DEFAULT_OUTPUT_EPSG;
use crate::types::job::{ErrorRow, JobOrigin, JobState, SubdivisionOutput};
use crate::types::message::ResultUpdate;
use crate::types::params::OutputParams;

#[derive(Debug, Default, Deserialize)]
struct SubdivisionResult {
    object: Option<UploadedObject>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedObject {
    bucket: Option<String>,
    key: Option<String>,
    public_url: Option<String>,
    size: Option<f64>,
    filename: Option<String>,
    epsg: Option<i32>,
}

/// What happened to one subdivision result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubdivisionOutcome {
    Completed,
    /// The job completed earlier; this is a redelivery
    AlreadyComplete,
    UnknownJob,
    /// The payload was unusable and the job was moved to `error`
    Rejected(String),
}

/// Builds the output record described by a subdivision result payload.
pub(crate) fn output_from_result(
    result: &serde_json::Value,
    outputs: &OutputParams,
) -> Result<SubdivisionOutput, String> {
    let payload = SubdivisionResult::deserialize(result)
        .map_err(|e| format!("Subdivision result payload is malformed: {}", e))?;
    let object = payload.object.ok_or_else(|| "Subdivision result is missing object".to_string())?;
    let bucket = object
        .bucket
        .filter(|bucket| !bucket.is_empty())
        .ok_or_else(|| "Subdivision result is missing object.bucket".to_string())?;
    let key = object
        .key
        .filter(|key| !key.is_empty())
        .ok_or_else(|| "Subdivision result is missing object.key".to_string())?;

    let url = object.public_url.filter(|url| !url.is_empty()).unwrap_or_else(|| outputs.public_url(&key));
    let filename = object.filename.filter(|filename| !filename.is_empty()).unwrap_or_else(|| key.clone());

    Ok(SubdivisionOutput {
        remote: format!("r2://{}/{}", bucket, key),
        url,
        size: object.size.map(|size| size.round() as i64).unwrap_or(0),
        filename,
        epsg: object.epsg.unwrap_or(DEFAULT_OUTPUT_EPSG),
    })
}

/// Applies one subdivision result.
///
/// # Errors
/// Only datastore failures are returned; the caller keeps the result buffered
/// and retries it on the next flush.
#[tracing::instrument(skip(store, outputs, update), fields(origin = %JobOrigin::Subdivision))]
pub(crate) async fn apply_result(
    store: &dyn JobStore,
    outputs: &OutputParams,
    job_key: &str,
    update: &ResultUpdate,
) -> Result<SubdivisionOutcome, DatabaseError> {
    let output = match output_from_result(&update.result, outputs) {
        Ok(output) => output,
        Err(reason) => {
            warn!(%reason, "Rejecting subdivision result");
            store
                .fail_jobs(JobOrigin::Subdivision, &[ErrorRow { job_key: job_key.to_string(), error: reason.clone() }])
                .await?;
            return Ok(SubdivisionOutcome::Rejected(reason));
        }
    };

    let Some(job) = store.find_subdivision_job(job_key).await? else {
        warn!("Result received for unknown subdivision job");
        return Ok(SubdivisionOutcome::UnknownJob);
    };
    if job.state == JobState::Complete {
        info!("Subdivision job already complete, skipping output");
        return Ok(SubdivisionOutcome::AlreadyComplete);
    }

    if store.complete_subdivision_job(job_key, &output, update.duration_ms).await? {
        info!(data_source_id = job.data_source_id, remote = %output.remote, "Subdivision job complete");
        Ok(SubdivisionOutcome::Completed)
    } else {
        // Lost a race with another completion of the same job
        Ok(SubdivisionOutcome::AlreadyComplete)
    }
}
