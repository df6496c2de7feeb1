//! Reply orchestration with offline fallback
//!
//! The [`Advisor`] asks the configured reasoning service first and falls back
//! to the deterministic oracles when the service is absent, errors, times out
//! or never finishes a job within the polling budget. Only cancellation is
//! reported to the caller.

use chrono::NaiveDate;
use sdk::{AdvisorError, Message, SummaryText, UserProfile};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{JobStatus, ReasoningError, ReasoningService, ReplyRequest, ServiceReply};
use crate::config::ReasoningConfig;
use crate::oracle::{ResponseOracle, SummaryOracle};

/// Timing budget for talking to the reasoning service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before each job status check
    pub interval: Duration,

    /// Job status checks before giving up
    pub max_attempts: u32,

    /// Ceiling for any single request
    pub request_timeout: Duration,
}

impl PollPolicy {
    /// Wall-clock ceiling for one reply: the initial request plus the
    /// polling window of `interval * max_attempts`
    ///
    /// Slow status checks eat into the window instead of extending it.
    pub fn deadline(&self) -> Duration {
        self.request_timeout
            .saturating_add(self.interval.saturating_mul(self.max_attempts))
    }

    pub fn from_config(config: &ReasoningConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
            request_timeout: config.request_timeout(),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&ReasoningConfig::default())
    }
}

/// Where a reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Service,
    Fallback,
}

/// Advisor reply text and its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

/// Produces advisor replies and summaries, preferring the reasoning service
pub struct Advisor {
    service: Option<Arc<dyn ReasoningService>>,
    oracle: ResponseOracle,
    summaries: SummaryOracle,
    policy: PollPolicy,
}

impl Advisor {
    /// Advisor backed by a reasoning service, if one is given
    pub fn new(service: Option<Arc<dyn ReasoningService>>, policy: PollPolicy) -> Self {
        Self {
            service,
            oracle: ResponseOracle::new(),
            summaries: SummaryOracle::new(),
            policy,
        }
    }

    /// Advisor that only uses the offline oracles
    pub fn offline() -> Self {
        Self::new(None, PollPolicy::default())
    }

    /// Replace the offline routing table
    pub fn with_oracle(mut self, oracle: ResponseOracle) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn oracle(&self) -> &ResponseOracle {
        &self.oracle
    }

    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }

    /// Reply to `text`, given the transcript so far
    ///
    /// Fails only with [`AdvisorError::Cancelled`] when `cancel` fires first.
    pub async fn reply(
        &self,
        history: &[Message],
        text: &str,
        profile: &UserProfile,
        cancel: &CancellationToken,
    ) -> Result<Reply, AdvisorError> {
        if cancel.is_cancelled() {
            return Err(AdvisorError::Cancelled);
        }

        let Some(service) = &self.service else {
            return Ok(self.fallback_reply(text, profile));
        };

        let request = ReplyRequest {
            prior_messages: history.to_vec(),
            new_user_text: text.to_string(),
            profile_context: profile.clone(),
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Reply cancelled");
                Err(AdvisorError::Cancelled)
            }
            result = self.fetch_reply(service.as_ref(), &request) => match result {
                Ok(reply_text) => {
                    info!("Reply from {} service", service.name());
                    Ok(Reply {
                        text: reply_text,
                        source: ReplySource::Service,
                    })
                }
                Err(e) => {
                    warn!("Reasoning service {} failed, using fallback: {}", service.name(), e);
                    Ok(self.fallback_reply(text, profile))
                }
            },
        }
    }

    /// Summarize a transcript; never fails
    pub async fn summarize(
        &self,
        messages: &[Message],
        profile: &UserProfile,
        date: NaiveDate,
    ) -> SummaryText {
        if let Some(service) = &self.service {
            let result =
                tokio::time::timeout(self.policy.request_timeout, service.summarize(messages, profile))
                    .await
                    .unwrap_or(Err(ReasoningError::Timeout))
                    .and_then(non_empty);

            match result {
                Ok(text) => return SummaryText::new(text),
                Err(e) => warn!(
                    "Summary from {} service failed, using fallback: {}",
                    service.name(),
                    e
                ),
            }
        }

        self.summaries.summarize(messages, profile, date)
    }

    fn fallback_reply(&self, text: &str, profile: &UserProfile) -> Reply {
        Reply {
            text: self.oracle.respond(text, profile),
            source: ReplySource::Fallback,
        }
    }

    async fn fetch_reply(
        &self,
        service: &dyn ReasoningService,
        request: &ReplyRequest,
    ) -> Result<String, ReasoningError> {
        let attempt = async {
            let first = tokio::time::timeout(self.policy.request_timeout, service.reply(request))
                .await
                .map_err(|_| ReasoningError::Timeout)??;

            match first {
                ServiceReply::Text(text) => non_empty(text),
                ServiceReply::Pending { job_id } => self.poll_job(service, &job_id).await,
            }
        };

        tokio::time::timeout(self.policy.deadline(), attempt)
            .await
            .unwrap_or_else(|_| {
                warn!("No reply within {:?}", self.policy.deadline());
                Err(ReasoningError::Timeout)
            })
    }

    /// Poll a job until it settles or the attempt ceiling is hit
    async fn poll_job(
        &self,
        service: &dyn ReasoningService,
        job_id: &str,
    ) -> Result<String, ReasoningError> {
        for attempt in 1..=self.policy.max_attempts {
            tokio::time::sleep(self.policy.interval).await;

            match tokio::time::timeout(self.policy.request_timeout, service.poll(job_id)).await {
                Err(_) => debug!("Poll {} for job {} timed out", attempt, job_id),
                Ok(Ok(JobStatus::Pending)) => debug!("Job {} pending ({})", job_id, attempt),
                Ok(Ok(JobStatus::Done(text))) => return non_empty(text),
                Ok(Ok(JobStatus::Failed(reason))) => return Err(ReasoningError::JobFailed(reason)),
                Ok(Err(e)) => return Err(e),
            }
        }

        warn!(
            "Job {} still pending after {} attempts",
            job_id, self.policy.max_attempts
        );
        Err(ReasoningError::Timeout)
    }
}

fn non_empty(text: String) -> Result<String, ReasoningError> {
    if text.trim().is_empty() {
        Err(ReasoningError::ParseError("empty text".to_string()))
    } else {
        Ok(text)
    }
}
