//! Model service client
//!
//! One client per remote capability (speech recognition, speaker attribution).
//! Every backend speaks the same polling contract:
//!
//! - `GET /health` → `{status, ...}`
//! - `POST <submit_path>` `{resource_ref}` → `{stage_job_id | job_id}`
//! - `GET /job/{id}` → `{status, progress, result?, error?}`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::models::StageStatus;
use crate::services::PollPolicy;

const USER_AGENT: &str = concat!("scribe-backend/", env!("CARGO_PKG_VERSION"));
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Service client errors
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Backend unreachable or rejected the input at submit time
    #[error("{service} submission failed: {message}")]
    Submission { service: String, message: String },

    /// Transient failure while polling a job
    #[error("{service} poll failed: {message}")]
    Poll { service: String, message: String },

    /// Backend reported the job itself failed
    #[error("{service} service error: {message}")]
    TerminalStage { service: String, message: String },

    /// Backend answered with something outside the contract
    #[error("{service} returned an unexpected response: {message}")]
    Protocol { service: String, message: String },

    /// Poll bound exceeded
    #[error("{service} job {stage_job_id} did not finish within {waited_secs}s")]
    Timeout {
        service: String,
        stage_job_id: String,
        waited_secs: u64,
    },
}

/// Health check result for one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub service: String,
    pub healthy: bool,
    /// Body returned by the backend, or `{status, error}` when unreachable
    pub detail: Value,
}

impl ServiceHealth {
    pub fn unhealthy(service: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            healthy: false,
            detail: json!({ "status": "unhealthy", "error": error.into() }),
        }
    }
}

/// One observation of a remote job
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: StageStatus,
    /// 0-100 when the backend reports it
    pub progress: Option<u8>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Polling client over one remote capability
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Service name used in logs and error messages
    fn name(&self) -> &str;

    /// Never fails; unreachable backends report `healthy = false`
    async fn health_check(&self) -> ServiceHealth;

    /// Start a job for `resource_ref`, returning the backend's job id
    async fn submit(&self, resource_ref: &str) -> Result<String, ServiceError>;

    /// Fetch the current status of a job
    async fn poll_status(&self, stage_job_id: &str) -> Result<StatusReport, ServiceError>;

    /// Poll until the job reaches a terminal status
    ///
    /// Calls `on_progress` whenever the reported progress differs from the
    /// last observed value. A failed poll is retried at the next scheduled
    /// poll until `policy.max_consecutive_failures` is reached.
    async fn wait_for_completion(
        &self,
        stage_job_id: &str,
        policy: &PollPolicy,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<Value, ServiceError> {
        let started = Instant::now();
        let mut last_progress: Option<u8> = None;
        let mut consecutive_failures = 0u32;
        let mut attempt = 0u32;

        loop {
            match self.poll_status(stage_job_id).await {
                Ok(report) => {
                    consecutive_failures = 0;

                    if let Some(progress) = report.progress {
                        if last_progress != Some(progress) {
                            last_progress = Some(progress);
                            on_progress(progress);
                        }
                    }

                    match report.status {
                        StageStatus::Completed => {
                            tracing::info!(
                                service = self.name(),
                                stage_job_id,
                                "Stage job completed"
                            );
                            return report.result.ok_or_else(|| ServiceError::Protocol {
                                service: self.name().to_string(),
                                message: format!("job {} completed without a result", stage_job_id),
                            });
                        }
                        StageStatus::Error => {
                            let message = report
                                .error
                                .unwrap_or_else(|| "Unknown error".to_string());
                            tracing::error!(
                                service = self.name(),
                                stage_job_id,
                                error = %message,
                                "Stage job failed"
                            );
                            return Err(ServiceError::TerminalStage {
                                service: self.name().to_string(),
                                message,
                            });
                        }
                        StageStatus::Queued | StageStatus::Processing => {}
                    }
                }
                Err(e @ ServiceError::Poll { .. }) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= policy.max_consecutive_failures.max(1) {
                        return Err(e);
                    }
                    tracing::warn!(
                        service = self.name(),
                        stage_job_id,
                        consecutive_failures,
                        error = %e,
                        "Poll failed, retrying at next interval"
                    );
                }
                Err(e) => return Err(e),
            }

            if let Some(max_wait) = policy.max_wait {
                if started.elapsed() >= max_wait {
                    return Err(ServiceError::Timeout {
                        service: self.name().to_string(),
                        stage_job_id: stage_job_id.to_string(),
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
            }

            tokio::time::sleep(policy.delay(attempt)).await;
            attempt = attempt.saturating_add(1);
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    resource_ref: &'a str,
    /// Accepted by backends that key jobs on file name
    filename: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(alias = "job_id")]
    stage_job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    status: StageStatus,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl From<JobStatusResponse> for StatusReport {
    fn from(response: JobStatusResponse) -> Self {
        Self {
            status: response.status,
            progress: response
                .progress
                .map(|p| p.clamp(0.0, 100.0).floor() as u8),
            result: response.result,
            error: response.error,
        }
    }
}

/// HTTP implementation of [`ServiceClient`]
pub struct HttpServiceClient {
    name: String,
    base_url: String,
    submit_path: String,
    http_client: reqwest::Client,
}

impl HttpServiceClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        submit_path: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        let name = name.into();
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ServiceError::Protocol {
                service: name.clone(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        let submit_path = submit_path.into();
        let submit_path = if submit_path.starts_with('/') {
            submit_path
        } else {
            format!("/{}", submit_path)
        };

        Ok(Self {
            name,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            submit_path,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ServiceClient for HttpServiceClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> ServiceHealth {
        let response = match self
            .http_client
            .get(self.url("/health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(service = %self.name, error = %e, "Health check failed");
                return ServiceHealth::unhealthy(&self.name, e.to_string());
            }
        };

        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                return ServiceHealth::unhealthy(
                    &self.name,
                    format!("HTTP {}: unreadable health body: {}", status.as_u16(), e),
                )
            }
        };

        let reported = body.get("status").and_then(Value::as_str).unwrap_or("");
        let healthy = status.is_success() && matches!(reported, "healthy" | "ok");

        ServiceHealth {
            service: self.name.clone(),
            healthy,
            detail: body,
        }
    }

    async fn submit(&self, resource_ref: &str) -> Result<String, ServiceError> {
        let submission_error = |message: String| ServiceError::Submission {
            service: self.name.clone(),
            message,
        };

        let response = self
            .http_client
            .post(self.url(&self.submit_path))
            .timeout(SUBMIT_TIMEOUT)
            .json(&SubmitRequest {
                resource_ref,
                filename: resource_ref,
            })
            .send()
            .await
            .map_err(|e| submission_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(submission_error(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| submission_error(format!("invalid submit response: {}", e)))?;

        tracing::info!(
            service = %self.name,
            resource_ref,
            stage_job_id = %submitted.stage_job_id,
            "Stage job submitted"
        );

        Ok(submitted.stage_job_id)
    }

    async fn poll_status(&self, stage_job_id: &str) -> Result<StatusReport, ServiceError> {
        let poll_error = |message: String| ServiceError::Poll {
            service: self.name.clone(),
            message,
        };

        let response = self
            .http_client
            .get(self.url(&format!("/job/{}", stage_job_id)))
            .timeout(POLL_TIMEOUT)
            .send()
            .await
            .map_err(|e| poll_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(poll_error(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let body: JobStatusResponse =
            response.json().await.map_err(|e| ServiceError::Protocol {
                service: self.name.clone(),
                message: format!("invalid job status: {}", e),
            })?;

        tracing::debug!(
            service = %self.name,
            stage_job_id,
            status = ?body.status,
            progress = ?body.progress,
            "Polled stage job"
        );

        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of poll outcomes
    struct ScriptedClient {
        polls: Mutex<VecDeque<Result<StatusReport, ServiceError>>>,
    }

    impl ScriptedClient {
        fn new(polls: Vec<Result<StatusReport, ServiceError>>) -> Self {
            Self {
                polls: Mutex::new(polls.into()),
            }
        }
    }

    #[async_trait]
    impl ServiceClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> ServiceHealth {
            ServiceHealth {
                service: "scripted".into(),
                healthy: true,
                detail: json!({"status": "healthy"}),
            }
        }

        async fn submit(&self, _resource_ref: &str) -> Result<String, ServiceError> {
            Ok("job-1".into())
        }

        async fn poll_status(&self, _stage_job_id: &str) -> Result<StatusReport, ServiceError> {
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(report(StageStatus::Processing, None)))
        }
    }

    fn report(status: StageStatus, progress: Option<u8>) -> StatusReport {
        StatusReport {
            status,
            progress,
            result: None,
            error: None,
        }
    }

    fn completed(result: Value) -> StatusReport {
        StatusReport {
            status: StageStatus::Completed,
            progress: Some(100),
            result: Some(result),
            error: None,
        }
    }

    fn poll_error() -> ServiceError {
        ServiceError::Poll {
            service: "scripted".into(),
            message: "connection reset".into(),
        }
    }

    fn policy() -> PollPolicy {
        PollPolicy::fixed(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn progress_reported_on_change_only() {
        let client = ScriptedClient::new(vec![
            Ok(report(StageStatus::Queued, Some(0))),
            Ok(report(StageStatus::Processing, Some(50))),
            Ok(report(StageStatus::Processing, Some(50))),
            Ok(completed(json!({"language": "en"}))),
        ]);
        let seen = Mutex::new(Vec::new());

        let result = client
            .wait_for_completion("job-1", &policy(), &|p: u8| seen.lock().unwrap().push(p))
            .await
            .unwrap();

        assert_eq!(result["language"], "en");
        assert_eq!(*seen.lock().unwrap(), vec![0, 50, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_error_is_terminal_with_message() {
        let client = ScriptedClient::new(vec![Ok(StatusReport {
            status: StageStatus::Error,
            progress: None,
            result: None,
            error: Some("CUDA out of memory".into()),
        })]);

        let err = client
            .wait_for_completion("job-1", &policy(), &|_: u8| {})
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::TerminalStage { .. }));
        assert_eq!(err.to_string(), "scripted service error: CUDA out of memory");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_failure_retried_at_next_interval() {
        let client = ScriptedClient::new(vec![
            Err(poll_error()),
            Err(poll_error()),
            Ok(completed(json!({"segments": []}))),
        ]);

        let result = client.wait_for_completion("job-1", &policy(), &|_: u8| {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_poll_failures_give_up() {
        let client = ScriptedClient::new(vec![Err(poll_error()), Err(poll_error()), Err(poll_error())]);

        let err = client
            .wait_for_completion("job-1", &policy(), &|_: u8| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Poll { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn max_wait_bounds_a_stalled_job() {
        let client = ScriptedClient::new(Vec::new());
        let policy = policy().with_max_wait(Some(Duration::from_secs(30)));

        let err = client
            .wait_for_completion("job-9", &policy, &|_: u8| {})
            .await
            .unwrap_err();

        match err {
            ServiceError::Timeout { stage_job_id, waited_secs, .. } => {
                assert_eq!(stage_job_id, "job-9");
                assert!(waited_secs >= 30);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completed_without_result_is_protocol_error() {
        let client = ScriptedClient::new(vec![Ok(report(StageStatus::Completed, Some(100)))]);
        let err = client
            .wait_for_completion("job-1", &policy(), &|_: u8| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Protocol { .. }));
    }

    #[test]
    fn wire_status_progress_is_clamped() {
        let wire: JobStatusResponse =
            serde_json::from_str(r#"{"status": "processing", "progress": 142.7}"#).unwrap();
        let report = StatusReport::from(wire);
        assert_eq!(report.progress, Some(100));
        assert_eq!(report.status, StageStatus::Processing);
    }

    #[test]
    fn submit_response_accepts_job_id_alias() {
        let parsed: SubmitResponse =
            serde_json::from_str(r#"{"job_id": "abc", "status": "queued"}"#).unwrap();
        assert_eq!(parsed.stage_job_id, "abc");
    }

    #[test]
    fn submit_path_is_normalized() {
        let client = HttpServiceClient::new("whisper", "http://localhost:8501/", "transcribe").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8501");
        assert_eq!(client.url(&client.submit_path), "http://localhost:8501/transcribe");
    }
}
