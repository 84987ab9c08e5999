// Client abstractions module - contains all client interface traits

pub mod database;
pub mod queue;

// Re-export commonly used types
pub use database::{postgres::PostgresJobStore, JobStore};
pub use queue::{sqs::SQS, QueueClient};
