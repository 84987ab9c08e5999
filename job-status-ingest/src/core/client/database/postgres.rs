use std::str::FromStr;

use async_trait::async_trait;
use indoc::indoc;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::core::client::database::batch::{build_batch_update, BatchColumn, BatchRow, BatchUpdate, RowBinder};
use crate::core::client::database::{DatabaseError, JobStore};
use crate::types::constant::SUBDIVISION_OUTPUT_TYPE;
use crate::types::job::{
    BeginRow, ErrorRow, JobOrigin, JobState, ProgressRow, ResultRow, SubdivisionJob, SubdivisionOutput,
};
use crate::types::params::DatabaseArgs;

/// Terminal jobs are never touched by begin or progress updates.
const NOT_TERMINAL: &str = "t.state NOT IN ('complete', 'error')";

/// A job that is already processing with a start time has seen its begin;
/// replaying the begin must not move `started_at`.
const NOT_STARTED: &str =
    "t.state NOT IN ('complete', 'error') AND NOT (t.state = 'processing' AND t.started_at IS NOT NULL)";

const NOT_COMPLETE: &str = "t.state <> 'complete'";

impl BatchRow for ResultRow {
    const COLUMNS: &'static [BatchColumn] = &[
        BatchColumn::new("job_key", "text"),
        BatchColumn::new("result", "jsonb"),
        BatchColumn::new("duration_ms", "double precision"),
    ];

    fn bind_columns(&self, binder: &mut RowBinder<'_, 'static>) {
        binder.bind(self.job_key.clone()).bind(self.result.clone()).bind(self.duration_ms);
    }
}

impl BatchRow for ErrorRow {
    const COLUMNS: &'static [BatchColumn] =
        &[BatchColumn::new("job_key", "text"), BatchColumn::new("error", "text")];

    fn bind_columns(&self, binder: &mut RowBinder<'_, 'static>) {
        binder.bind(self.job_key.clone()).bind(self.error.clone());
    }
}

impl BatchRow for BeginRow {
    const COLUMNS: &'static [BatchColumn] = &[
        BatchColumn::new("job_key", "text"),
        BatchColumn::new("logs_url", "text"),
        BatchColumn::new("logs_expires_at", "timestamptz"),
    ];

    fn bind_columns(&self, binder: &mut RowBinder<'_, 'static>) {
        binder.bind(self.job_key.clone()).bind(self.logs_url.clone()).bind(self.logs_expires_at);
    }
}

impl BatchRow for ProgressRow {
    const COLUMNS: &'static [BatchColumn] = &[
        BatchColumn::new("job_key", "text"),
        BatchColumn::new("progress", "double precision"),
        BatchColumn::new("message", "text"),
        BatchColumn::new("eta", "timestamptz"),
    ];

    fn bind_columns(&self, binder: &mut RowBinder<'_, 'static>) {
        binder.bind(self.job_key.clone()).bind(self.progress).bind(self.message.clone()).bind(self.eta);
    }
}

pub(crate) fn overlay_result_update() -> BatchUpdate<'static> {
    BatchUpdate {
        table: JobOrigin::Overlay.table(),
        assignments: &[
            "value = v.result",
            "state = 'complete'",
            "updated_at = now()",
            "completed_at = now()",
            "duration = coalesce(v.duration_ms * interval '1 millisecond', now() - t.started_at)",
            "progress_percentage = 100",
            "error_message = null",
        ],
        guard: None,
    }
}

pub(crate) fn error_update(origin: JobOrigin) -> BatchUpdate<'static> {
    BatchUpdate {
        table: origin.table(),
        assignments: &[
            "state = 'error'",
            "error_message = v.error",
            "updated_at = now()",
            "duration = now() - t.started_at",
        ],
        guard: Some(NOT_COMPLETE),
    }
}

pub(crate) fn begin_update(origin: JobOrigin) -> BatchUpdate<'static> {
    let assignments: &'static [&'static str] = match origin {
        JobOrigin::Overlay => &[
            "state = 'processing'",
            "updated_at = now()",
            "started_at = now()",
            "logs_url = coalesce(v.logs_url, t.logs_url)",
            "logs_expires_at = coalesce(v.logs_expires_at, t.logs_expires_at)",
        ],
        JobOrigin::Subdivision => &["state = 'processing'", "updated_at = now()", "started_at = now()"],
    };
    BatchUpdate { table: origin.table(), assignments, guard: Some(NOT_STARTED) }
}

pub(crate) fn progress_update(origin: JobOrigin) -> BatchUpdate<'static> {
    let assignments: &'static [&'static str] = match origin {
        JobOrigin::Overlay => &[
            "state = 'processing'",
            "updated_at = now()",
            "progress_percentage = greatest(coalesce(t.progress_percentage, 0)::double precision, v.progress)",
            "eta = v.eta",
        ],
        JobOrigin::Subdivision => &[
            "state = 'processing'",
            "updated_at = now()",
            "progress_percentage = greatest(coalesce(t.progress_percentage, 0)::double precision, v.progress)",
            "progress_message = v.message",
            "eta = v.eta",
        ],
    };
    BatchUpdate { table: origin.table(), assignments, guard: Some(NOT_TERMINAL) }
}

/// PostgreSQL implementation of [`JobStore`].
#[derive(Clone, Debug)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    /// Connects a pool to the job database.
    pub async fn new(args: &DatabaseArgs) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(args.acquire_timeout)
            .connect(&args.database_url)
            .await
            .map_err(DatabaseError::Connection)?;
        tracing::debug!(max_connections = args.max_connections, "Connected to job database");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn execute_batch<R: BatchRow>(&self, update: &BatchUpdate<'_>, rows: &[R]) -> Result<u64, DatabaseError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut builder = build_batch_update(update, rows)?;
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[tracing::instrument(skip_all, fields(rows = rows.len()))]
    async fn complete_overlay_jobs(&self, rows: &[ResultRow]) -> Result<u64, DatabaseError> {
        self.execute_batch(&overlay_result_update(), rows).await
    }

    #[tracing::instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn fail_jobs(&self, origin: JobOrigin, rows: &[ErrorRow]) -> Result<u64, DatabaseError> {
        self.execute_batch(&error_update(origin), rows).await
    }

    #[tracing::instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn begin_jobs(&self, origin: JobOrigin, rows: &[BeginRow]) -> Result<u64, DatabaseError> {
        self.execute_batch(&begin_update(origin), rows).await
    }

    #[tracing::instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn update_progress(&self, origin: JobOrigin, rows: &[ProgressRow]) -> Result<u64, DatabaseError> {
        self.execute_batch(&progress_update(origin), rows).await
    }

    async fn find_subdivision_job(&self, job_key: &str) -> Result<Option<SubdivisionJob>, DatabaseError> {
        let row = sqlx::query_as::<_, (i32, i32, String)>(indoc! {r#"
            SELECT data_source_id, project_id, state::text
            FROM source_processing_jobs
            WHERE job_key = $1
        "#})
        .bind(job_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(data_source_id, project_id, state)| {
            let state = JobState::from_str(&state).map_err(|_| DatabaseError::UnknownState(state))?;
            Ok(SubdivisionJob { data_source_id, project_id, state })
        })
        .transpose()
    }

    #[tracing::instrument(skip(self, output), fields(remote = %output.remote))]
    async fn complete_subdivision_job(
        &self,
        job_key: &str,
        output: &SubdivisionOutput,
        duration_ms: Option<f64>,
    ) -> Result<bool, DatabaseError> {
        // The output insert only happens when the job row exists and is not
        // complete yet, and the job only completes when the insert happened.
        let result = sqlx::query(indoc! {r#"
            WITH job AS (
                SELECT data_source_id, project_id
                FROM source_processing_jobs
                WHERE job_key = $1 AND state <> 'complete'
            ), output AS (
                INSERT INTO data_upload_outputs
                    (data_source_id, project_id, type, remote, size, filename, url, is_original, original_filename, epsg)
                SELECT data_source_id, project_id, $2::data_upload_output_type, $3, $4, $5, $6, false, $5, $7
                FROM job
                RETURNING id
            )
            UPDATE source_processing_jobs
            SET state = 'complete',
                updated_at = now(),
                completed_at = now(),
                duration = coalesce($8::double precision * interval '1 millisecond', now() - started_at),
                progress_percentage = 100,
                error_message = null
            WHERE job_key = $1 AND EXISTS (SELECT 1 FROM output)
        "#})
        .bind(job_key)
        .bind(SUBDIVISION_OUTPUT_TYPE)
        .bind(&output.remote)
        .bind(output.size)
        .bind(&output.filename)
        .bind(&output.url)
        .bind(output.epsg)
        .bind(duration_ms)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
