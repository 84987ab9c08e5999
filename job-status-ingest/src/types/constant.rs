use std::time::Duration;

/// SQS refuses `ReceiveMessage` requests asking for more than this many messages.
pub const SQS_MAX_RECEIVE_MESSAGES: i32 = 10;

/// Longest long-poll wait SQS accepts.
pub const SQS_MAX_WAIT_TIME: Duration = Duration::from_secs(20);

/// SQS refuses `DeleteMessageBatch` requests with more entries than this.
pub const SQS_DELETE_BATCH_LIMIT: usize = 10;

/// Data upload output type written for subdivided FlatGeobuf results.
pub const SUBDIVISION_OUTPUT_TYPE: &str = "ReportingFlatgeobufV1";

/// Subdivision outputs are always written in WGS 84.
pub const DEFAULT_OUTPUT_EPSG: i32 = 4326;

pub const DEFAULT_UPLOADS_PUBLIC_BASE_URL: &str = "https://uploads.seasketch.org";
