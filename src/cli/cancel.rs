//! Cancel command implementation

use crate::cli::CancelArgs;
use crate::client::JobsClient;
use crate::config::LookoutConfig;
use crate::roster::JobId;

/// Handle `lookout cancel` command
pub async fn handle_cancel(
    args: &CancelArgs,
    config: &LookoutConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let client = JobsClient::new(&config.service)?;
    let job = JobId::from(args.job.as_str());

    client.cancel_job(&job).await?;
    Ok(format!("Requested cancellation of {}", job))
}
