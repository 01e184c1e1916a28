//! Jobs command implementation

use crate::cli::output::{format_jobs_json, format_jobs_table, JobView};
use crate::cli::JobsArgs;
use crate::client::JobsClient;
use crate::config::LookoutConfig;
use crate::roster::JobStage;

/// Parse stage string to JobStage
fn parse_stage(s: &str) -> Result<JobStage, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "pending" => Ok(JobStage::Pending),
        "queued" => Ok(JobStage::Queued),
        "running" => Ok(JobStage::Running),
        "updating" => Ok(JobStage::Updating),
        "completed" => Ok(JobStage::Completed),
        "error" => Ok(JobStage::Error),
        _ => Err(format!(
            "Invalid stage: {}. Use: pending, queued, running, updating, completed, error",
            s
        )
        .into()),
    }
}

/// Handle `lookout jobs` command
pub async fn handle_jobs(
    args: &JobsArgs,
    config: &LookoutConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let client = JobsClient::new(&config.service)?;
    let mut jobs = client.list_jobs().await?;

    // Filter by stage if provided
    if let Some(ref stage) = args.stage {
        let target = parse_stage(stage)?;
        jobs.retain(|job| job.stage == target);
    }
    jobs.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));

    let views: Vec<JobView> = jobs.iter().map(JobView::from).collect();

    if args.json {
        Ok(format_jobs_json(&views))
    } else {
        Ok(format_jobs_table(&views))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_args(json: bool, stage: Option<&str>) -> JobsArgs {
        JobsArgs {
            json,
            stage: stage.map(String::from),
            config: PathBuf::from("lookout.toml"),
        }
    }

    fn test_config(base_url: &str) -> LookoutConfig {
        let mut config = LookoutConfig::default();
        config.service.base_url = base_url.to_string();
        config.service.user = "alice".to_string();
        config.service.token = Some("test-token".to_string());
        config
    }

    #[test]
    fn test_parse_stage_all_variants() {
        assert_eq!(parse_stage("pending").unwrap(), JobStage::Pending);
        assert_eq!(parse_stage("queued").unwrap(), JobStage::Queued);
        assert_eq!(parse_stage("running").unwrap(), JobStage::Running);
        assert_eq!(parse_stage("updating").unwrap(), JobStage::Updating);
        assert_eq!(parse_stage("completed").unwrap(), JobStage::Completed);
        assert_eq!(parse_stage("error").unwrap(), JobStage::Error);
        assert_eq!(parse_stage("RUNNING").unwrap(), JobStage::Running);
    }

    #[test]
    fn test_parse_stage_invalid() {
        assert!(parse_stage("archived").is_err());
        assert!(parse_stage("").is_err());
    }

    #[tokio::test]
    async fn test_jobs_table_lists_roster() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/jobs/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "job-1", "displayName": "train-resnet", "stage": "RUNNING"},
                {"id": "job-2", "displayName": "nightly-sync", "stage": "COMPLETED"}
            ])))
            .mount(&server)
            .await;

        let output = handle_jobs(&test_args(false, None), &test_config(&server.uri()))
            .await
            .unwrap();

        assert!(output.contains("train-resnet"));
        assert!(output.contains("nightly-sync"));
    }

    #[tokio::test]
    async fn test_jobs_stage_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/jobs/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "job-1", "displayName": "train-resnet", "stage": "RUNNING"},
                {"id": "job-2", "displayName": "nightly-sync", "stage": "COMPLETED"}
            ])))
            .mount(&server)
            .await;

        let output = handle_jobs(&test_args(false, Some("running")), &test_config(&server.uri()))
            .await
            .unwrap();

        assert!(output.contains("train-resnet"));
        assert!(!output.contains("nightly-sync"));
    }

    #[tokio::test]
    async fn test_jobs_json_output() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/jobs/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "job-1", "displayName": "train-resnet", "stage": "RUNNING"}
            ])))
            .mount(&server)
            .await;

        let output = handle_jobs(&test_args(true, None), &test_config(&server.uri()))
            .await
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["jobs"][0]["id"], "job-1");
    }

    #[tokio::test]
    async fn test_jobs_service_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/jobs/alice"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = handle_jobs(&test_args(false, None), &test_config(&server.uri())).await;
        assert!(result.is_err());
    }
}
