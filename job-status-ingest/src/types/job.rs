use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// The family of worker a status message comes from. Each origin persists its
/// jobs in its own table with the same status columns.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobOrigin {
    /// Geometry overlay computation
    #[default]
    Overlay,
    /// Upload subdivision / conversion
    Subdivision,
}

impl JobOrigin {
    /// Table holding the job records of this origin
    pub fn table(&self) -> &'static str {
        match self {
            JobOrigin::Overlay => "spatial_metrics",
            JobOrigin::Subdivision => "source_processing_jobs",
        }
    }
}

/// Persisted job state. `Complete` and `Error` are terminal: once reached, no
/// status update may move the job anywhere else.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Created by the application, waiting for a worker. Older rows use `queued`.
    #[strum(to_string = "pending", serialize = "queued")]
    #[serde(alias = "queued")]
    Pending,
    #[strum(to_string = "processing")]
    Processing,
    #[strum(to_string = "complete")]
    Complete,
    #[strum(to_string = "error")]
    Error,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Error)
    }
}

/// Row of the batched overlay result update.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub job_key: String,
    pub result: serde_json::Value,
    /// Duration reported by the worker, in milliseconds
    pub duration_ms: Option<f64>,
}

/// Row of the batched error update.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRow {
    pub job_key: String,
    pub error: String,
}

/// Row of the batched begin update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BeginRow {
    pub job_key: String,
    pub logs_url: Option<String>,
    pub logs_expires_at: Option<DateTime<Utc>>,
}

/// Row of the batched progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRow {
    pub job_key: String,
    pub progress: f64,
    pub message: Option<String>,
    pub eta: Option<DateTime<Utc>>,
}

/// What the result phase needs to know about a subdivision job before
/// recording its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdivisionJob {
    pub data_source_id: i32,
    pub project_id: i32,
    pub state: JobState,
}

/// Derived output record created for a completed subdivision job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdivisionOutput {
    /// Remote locator, `r2://<bucket>/<key>`
    pub remote: String,
    pub url: String,
    pub size: i64,
    pub filename: String,
    /// Coordinate reference system of the output
    pub epsg: i32,
}
