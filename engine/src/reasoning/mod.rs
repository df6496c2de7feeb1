//! External reasoning service abstraction
//!
//! An optional remote service can answer questions and summarize chats in
//! place of the offline oracles. A reply is either returned inline or as a
//! job that has to be polled until it settles.
//!
//! Errors from this layer never reach a conversation: the [`Advisor`]
//! orchestrator maps every failure to the deterministic fallback.

use async_trait::async_trait;
use sdk::{Message, UserProfile};
use serde::{Deserialize, Serialize};

pub mod fallback;
pub mod http;

pub use fallback::{Advisor, PollPolicy, Reply, ReplySource};
pub use http::HttpReasoningService;

/// Result type for reasoning service operations
pub type Result<T> = std::result::Result<T, ReasoningError>;

/// Errors that can occur talking to a reasoning service
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Job failed: {0}")]
    JobFailed(String),
}

/// Everything the service needs to answer one user message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    /// Transcript before the new message
    pub prior_messages: Vec<Message>,

    pub new_user_text: String,

    pub profile_context: UserProfile,
}

/// Immediate answer to a reply request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceReply {
    /// The reply is ready
    Text(String),

    /// The reply is being generated; poll the job
    Pending { job_id: String },
}

/// State of an asynchronous reply job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Done(String),
    Failed(String),
}

/// Remote advisor that may answer in place of the offline oracles
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Ask for a reply to the newest user message
    async fn reply(&self, request: &ReplyRequest) -> Result<ServiceReply>;

    /// Check on a job returned by [`ReasoningService::reply`]
    async fn poll(&self, job_id: &str) -> Result<JobStatus>;

    /// Summarize a finished transcript
    async fn summarize(&self, messages: &[Message], profile: &UserProfile) -> Result<String>;
}
