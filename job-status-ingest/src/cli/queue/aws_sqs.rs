use clap::Args;
use url::Url;

/// Parameters used to config AWS SQS.
#[derive(Debug, Clone, Args)]
pub struct AWSSQSCliArgs {
    /// The URL of the queue the workers publish job status messages to.
    #[arg(env = "JOB_STATUS_SQS_QUEUE_URL", long)]
    pub queue_url: String,

    /// The AWS region of the queue. Falls back to the default AWS provider chain.
    #[arg(env = "AWS_REGION", long)]
    pub aws_region: Option<String>,

    /// Override the SQS endpoint, e.g. for LocalStack.
    #[arg(env = "JOB_STATUS_SQS_ENDPOINT_URL", long)]
    pub sqs_endpoint_url: Option<Url>,
}
