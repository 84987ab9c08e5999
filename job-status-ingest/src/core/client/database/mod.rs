pub mod batch;
pub mod error;
pub mod postgres;

use async_trait::async_trait;
pub use error::DatabaseError;

use crate::types::job::{BeginRow, ErrorRow, JobOrigin, ProgressRow, ResultRow, SubdivisionJob, SubdivisionOutput};

/// Persistence of job status updates.
///
/// Every batched method applies its rows in a single statement and returns the
/// number of job records it changed. Rows whose job is already past the state
/// the update applies to are skipped by the statement guards, so replaying any
/// call is safe.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Marks overlay jobs complete and stores their result value.
    async fn complete_overlay_jobs(&self, rows: &[ResultRow]) -> Result<u64, DatabaseError>;

    /// Moves jobs to `error` unless they already completed.
    async fn fail_jobs(&self, origin: JobOrigin, rows: &[ErrorRow]) -> Result<u64, DatabaseError>;

    /// Moves pending jobs to `processing` and records when they started.
    async fn begin_jobs(&self, origin: JobOrigin, rows: &[BeginRow]) -> Result<u64, DatabaseError>;

    /// Raises the progress of running jobs. Progress never decreases.
    async fn update_progress(&self, origin: JobOrigin, rows: &[ProgressRow]) -> Result<u64, DatabaseError>;

    /// Looks up the subdivision job a result belongs to.
    ///
    /// # Returns
    /// * `Ok(None)` - If no job has this key
    async fn find_subdivision_job(&self, job_key: &str) -> Result<Option<SubdivisionJob>, DatabaseError>;

    /// Records the derived output of a subdivision job and marks it complete,
    /// atomically. Returns whether the job was updated.
    async fn complete_subdivision_job(
        &self,
        job_key: &str,
        output: &SubdivisionOutput,
        duration_ms: Option<f64>,
    ) -> Result<bool, DatabaseError>;

    /// Perform a health check on the database connection
    async fn health_check(&self) -> Result<(), DatabaseError>;
}
