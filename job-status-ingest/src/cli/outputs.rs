use clap::Args;
use url::Url;

use crate::types::constant::DEFAULT_UPLOADS_PUBLIC_BASE_URL;

/// Parameters used to record subdivision outputs.
#[derive(Debug, Clone, Args)]
pub struct OutputsCliArgs {
    /// Public base URL of the uploads bucket, used when a worker result has no `publicUrl`.
    #[arg(env = "JOB_STATUS_UPLOADS_PUBLIC_BASE_URL", long, default_value = DEFAULT_UPLOADS_PUBLIC_BASE_URL)]
    pub uploads_public_base_url: Url,
}
