//! HTTP reasoning service client
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `POST /respond` with a [`ReplyRequest`] body, answering `{"text": ...}`
//!   or `{"jobId": ...}`
//! - `GET /jobs/{id}` answering `{"status": "pending"|"done"|"failed", "text"?: ...}`
//! - `POST /summarize` with `{"messages": [...], "profileContext": {...}}`,
//!   answering `{"text": ...}`

use async_trait::async_trait;
use reqwest::{Client, Response};
use sdk::{Message, UserProfile};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{JobStatus, ReasoningError, ReasoningService, ReplyRequest, Result, ServiceReply};

/// Reasoning service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpReasoningService {
    /// Base URL without a trailing slash
    base_url: String,

    client: Client,
}

impl HttpReasoningService {
    /// Create a client with a per-request timeout
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ReasoningError::ServiceUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> ReasoningError {
        if e.is_timeout() {
            ReasoningError::Timeout
        } else if e.is_connect() {
            ReasoningError::ServiceUnavailable(format!(
                "Cannot connect to reasoning service at {}",
                self.base_url
            ))
        } else {
            ReasoningError::NetworkError(e.to_string())
        }
    }

    async fn check_status(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ReasoningError::ServiceUnavailable(format!(
            "Reasoning service error ({}): {}",
            status, body
        )))
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| ReasoningError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningService {
    fn name(&self) -> &str {
        "http"
    }

    async fn reply(&self, request: &ReplyRequest) -> Result<ServiceReply> {
        let url = format!("{}/respond", self.base_url);
        tracing::debug!(
            "Reasoning request: prior_messages={}, chars={}",
            request.prior_messages.len(),
            request.new_user_text.chars().count()
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;
        let body: RespondBody = Self::parse(response).await?;

        match body {
            RespondBody {
                text: Some(text), ..
            } => Ok(ServiceReply::Text(text)),
            RespondBody {
                job_id: Some(job_id),
                ..
            } => Ok(ServiceReply::Pending { job_id }),
            _ => Err(ReasoningError::ParseError(
                "response has neither text nor jobId".to_string(),
            )),
        }
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;
        let body: JobBody = Self::parse(response).await?;

        match body.status {
            JobState::Pending => Ok(JobStatus::Pending),
            JobState::Done => body.text.map(JobStatus::Done).ok_or_else(|| {
                ReasoningError::ParseError(format!("job {} is done but has no text", job_id))
            }),
            JobState::Failed => Ok(JobStatus::Failed(
                body.text.unwrap_or_else(|| "no reason given".to_string()),
            )),
        }
    }

    async fn summarize(&self, messages: &[Message], profile: &UserProfile) -> Result<String> {
        let url = format!("{}/summarize", self.base_url);
        let request = SummarizeBody {
            messages,
            profile_context: profile,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;
        let body: RespondBody = Self::parse(response).await?;

        body.text
            .ok_or_else(|| ReasoningError::ParseError("summary response has no text".to_string()))
    }
}

// Wire types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RespondBody {
    text: Option<String>,
    job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum JobState {
    Pending,
    Done,
    Failed,
}

#[derive(Debug, Deserialize)]
struct JobBody {
    status: JobState,
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeBody<'a> {
    messages: &'a [Message],
    profile_context: &'a UserProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let service =
            HttpReasoningService::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(service.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        // Port 9 (discard) is closed on test hosts
        let service =
            HttpReasoningService::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = service.poll("job-1").await.unwrap_err();
        assert!(matches!(
            err,
            ReasoningError::ServiceUnavailable(_) | ReasoningError::NetworkError(_)
        ));
    }
}
