//! HTTP client for the remote job-execution service.
//!
//! One `JobsClient` is shared by the roster poller, the stream supervisor,
//! and the CLI commands. It owns URL construction, bearer authentication,
//! and the classification of request failures into [`ServiceError`].

mod error;

pub use error::{ServiceError, TransportKind};

pub(crate) use error::classify_transport;

use crate::config::ServiceConfig;
use crate::roster::{JobId, JobSnapshot};
use crate::stream::{LogLine, LogPayload, MetricSample, StreamKind};
use std::time::Duration;
use url::Url;

/// Identifies this library on every request.
const USER_AGENT: &str = concat!("lookout/", env!("CARGO_PKG_VERSION"));

/// Client for the job service REST and event-stream endpoints.
pub struct JobsClient {
    http: reqwest::Client,
    base: Url,
    user: String,
    token: Option<String>,
    request_timeout: Duration,
}

impl JobsClient {
    /// Create a client from service configuration.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|e| ServiceError::Unknown(e.to_string()))?;
        Self::with_client(config, http)
    }

    /// Create a client with a custom HTTP client (for testing).
    pub fn with_client(config: &ServiceConfig, http: reqwest::Client) -> Result<Self, ServiceError> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| ServiceError::InvalidEndpoint(format!("{}: {}", config.base_url, e)))?;
        // Url::join treats a path without a trailing slash as a file and
        // would replace its last segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http,
            base,
            user: config.user.clone(),
            token: config.resolve_token(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        })
    }

    /// Verify that a token and a user identity are available.
    ///
    /// Stream sessions call this before issuing any request so a missing
    /// credential fails the start without touching the network.
    pub fn ensure_credentials(&self) -> Result<&str, ServiceError> {
        if self.user.is_empty() {
            return Err(ServiceError::MissingCredential);
        }
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ServiceError::MissingCredential),
        }
    }

    /// Fetch the full job roster for the configured user.
    pub async fn list_jobs(&self) -> Result<Vec<JobSnapshot>, ServiceError> {
        let url = self.endpoint(&[])?;
        let response = self
            .get(url)?
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(ServiceError::HttpStatus(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// Point lookup of a single job, used for existence verification and
    /// stage re-checks.
    pub async fn get_job(&self, id: &JobId) -> Result<JobSnapshot, ServiceError> {
        let url = self.endpoint(&[id.as_str()])?;
        let response = self
            .get(url)?
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        match response.status() {
            s if s.is_success() => response
                .json()
                .await
                .map_err(|e| ServiceError::Decode(e.to_string())),
            reqwest::StatusCode::NOT_FOUND => Err(ServiceError::JobNotFound(id.clone())),
            s => Err(ServiceError::HttpStatus(s.as_u16())),
        }
    }

    /// Open the kind-specific event stream for a job.
    ///
    /// `total_timeout` is the whole-request ceiling; the caller enforces its
    /// own idle timeout between chunks, so this only guards against a
    /// connection that outlives any plausible job.
    pub async fn open_stream(
        &self,
        id: &JobId,
        kind: StreamKind,
        total_timeout: Duration,
    ) -> Result<reqwest::Response, ServiceError> {
        let url = self.endpoint(&[id.as_str(), kind.stream_path()])?;
        let response = self
            .get(url)?
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .timeout(total_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(ServiceError::HttpStatus(response.status().as_u16()));
        }
        Ok(response)
    }

    /// Non-streaming log snapshot fallback.
    pub async fn fetch_log_snapshot(
        &self,
        id: &JobId,
        include_timestamps: bool,
    ) -> Result<Vec<LogLine>, ServiceError> {
        let url = self.endpoint(&[id.as_str(), "logs"])?;
        let response = self
            .get(url)?
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        match response.status() {
            s if s.is_success() => {
                let payloads: Vec<LogPayload> = response
                    .json()
                    .await
                    .map_err(|e| ServiceError::Decode(e.to_string()))?;
                Ok(payloads
                    .into_iter()
                    .filter_map(|p| p.into_line(include_timestamps))
                    .collect())
            }
            reqwest::StatusCode::NOT_FOUND => Err(ServiceError::JobNotFound(id.clone())),
            s => Err(ServiceError::HttpStatus(s.as_u16())),
        }
    }

    /// Non-streaming metric snapshot fallback.
    pub async fn fetch_metric_snapshot(&self, id: &JobId) -> Result<MetricSample, ServiceError> {
        let url = self.endpoint(&[id.as_str(), "metrics"])?;
        let response = self
            .get(url)?
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        match response.status() {
            s if s.is_success() => response
                .json()
                .await
                .map_err(|e| ServiceError::Decode(e.to_string())),
            reqwest::StatusCode::NOT_FOUND => Err(ServiceError::JobNotFound(id.clone())),
            s => Err(ServiceError::HttpStatus(s.as_u16())),
        }
    }

    /// Request cancellation of a running job. The service acknowledges with
    /// 200 or 202 depending on whether the job was already terminal.
    pub async fn cancel_job(&self, id: &JobId) -> Result<(), ServiceError> {
        let url = self.endpoint(&[id.as_str(), "cancel"])?;
        let token = self.ensure_credentials()?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        match response.status().as_u16() {
            200 | 202 => Ok(()),
            404 => Err(ServiceError::JobNotFound(id.clone())),
            s => Err(ServiceError::HttpStatus(s)),
        }
    }

    fn get(&self, url: Url) -> Result<reqwest::RequestBuilder, ServiceError> {
        let token = self.ensure_credentials()?;
        Ok(self
            .http
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, USER_AGENT))
    }

    /// Build `{base}/api/jobs/{user}[/segment...]`.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut path = format!("api/jobs/{}", self.user);
        for segment in segments {
            path.push('/');
            path.push_str(segment);
        }
        self.base
            .join(&path)
            .map_err(|e| ServiceError::InvalidEndpoint(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_config(base_url: &str) -> ServiceConfig {
        ServiceConfig {
            base_url: base_url.to_string(),
            user: "alice".to_string(),
            token: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_construction() {
        let client = JobsClient::new(&service_config("https://jobs.example.com")).unwrap();

        assert_eq!(
            client.endpoint(&[]).unwrap().as_str(),
            "https://jobs.example.com/api/jobs/alice"
        );
        assert_eq!(
            client.endpoint(&["job-1"]).unwrap().as_str(),
            "https://jobs.example.com/api/jobs/alice/job-1"
        );
        assert_eq!(
            client
                .endpoint(&["job-1", StreamKind::Logs.stream_path()])
                .unwrap()
                .as_str(),
            "https://jobs.example.com/api/jobs/alice/job-1/logs-stream"
        );
        assert_eq!(
            client
                .endpoint(&["job-1", StreamKind::Metrics.stream_path()])
                .unwrap()
                .as_str(),
            "https://jobs.example.com/api/jobs/alice/job-1/metrics-stream"
        );
    }

    #[test]
    fn test_endpoint_preserves_base_path_prefix() {
        // With a trailing slash.
        let client = JobsClient::new(&service_config("https://example.com/hub/")).unwrap();
        assert_eq!(
            client.endpoint(&["j"]).unwrap().as_str(),
            "https://example.com/hub/api/jobs/alice/j"
        );

        // Without one; join would otherwise drop the last segment.
        let client = JobsClient::new(&service_config("https://example.com/hub")).unwrap();
        assert_eq!(
            client.endpoint(&["j"]).unwrap().as_str(),
            "https://example.com/hub/api/jobs/alice/j"
        );
    }

    #[test]
    fn test_invalid_base_url_is_invalid_endpoint() {
        let result = JobsClient::new(&service_config("not a url"));
        assert!(matches!(result, Err(ServiceError::InvalidEndpoint(_))));

        let result = JobsClient::new(&service_config(""));
        assert!(matches!(result, Err(ServiceError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_missing_token_is_missing_credential() {
        let mut config = service_config("https://jobs.example.com");
        config.token = None;
        config.token_env = "LOOKOUT_TEST_UNSET_TOKEN".to_string();

        let client = JobsClient::new(&config).unwrap();
        assert!(matches!(
            client.ensure_credentials(),
            Err(ServiceError::MissingCredential)
        ));
    }

    #[test]
    fn test_empty_token_is_missing_credential() {
        let mut config = service_config("https://jobs.example.com");
        config.token = Some(String::new());
        config.token_env = "LOOKOUT_TEST_UNSET_TOKEN".to_string();

        let client = JobsClient::new(&config).unwrap();
        assert!(matches!(
            client.ensure_credentials(),
            Err(ServiceError::MissingCredential)
        ));
    }

    #[test]
    fn test_empty_user_is_missing_credential() {
        let mut config = service_config("https://jobs.example.com");
        config.user = String::new();

        let client = JobsClient::new(&config).unwrap();
        assert!(matches!(
            client.ensure_credentials(),
            Err(ServiceError::MissingCredential)
        ));
    }

    #[test]
    fn test_credentials_present() {
        let client = JobsClient::new(&service_config("https://jobs.example.com")).unwrap();
        assert_eq!(client.ensure_credentials().unwrap(), "secret");
    }

    #[tokio::test]
    async fn test_requests_carry_auth_and_user_agent() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/jobs/alice"))
            .and(header("authorization", "Bearer secret"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = JobsClient::new(&service_config(&server.uri())).unwrap();
        let jobs = client.list_jobs().await.unwrap();
        assert!(jobs.is_empty());

        server.verify().await;
    }

    #[tokio::test]
    async fn test_cancel_job_accepts_200() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/jobs/alice/job-1/cancel"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = JobsClient::new(&service_config(&server.uri())).unwrap();
        client.cancel_job(&JobId::from("job-1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_job_404_is_job_not_found() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/jobs/alice/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = JobsClient::new(&service_config(&server.uri())).unwrap();
        let result = client.get_job(&JobId::from("ghost")).await;
        assert!(matches!(result, Err(ServiceError::JobNotFound(id)) if id.as_str() == "ghost"));
    }
}
