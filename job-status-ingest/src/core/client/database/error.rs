use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to connect to the database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Batch row bound {found} columns, expected {expected}")]
    ColumnCountMismatch { expected: usize, found: usize },

    #[error("Batch update called without rows")]
    EmptyBatch,

    #[error("Unknown job state: {0}")]
    UnknownState(String),
}
