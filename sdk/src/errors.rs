//! Error types and handling
//!
//! This module provides the error types used throughout the Haven advisor.
//! All errors implement the `HavenErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Degraded states
//!
//! Nothing in the advisor core is fatal. Validation rejections are handed
//! back to the caller, service failures are replaced by the deterministic
//! oracle, and persistence failures only weaken the daily quota.

use thiserror::Error;

/// Trait for Haven error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information.
pub trait HavenErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// file paths, service URLs, or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors leave the session usable; the caller may retry
    /// with corrected input.
    fn is_recoverable(&self) -> bool;
}

/// Main advisor error type
///
/// # Error Categories
///
/// - **Validation**: rejected operations on a conversation session
/// - **Quota**: the daily session ceiling has been reached
/// - **Service**: the external reasoning service failed or is absent
/// - **Persistence**: the key-value store or database is unavailable
/// - **Configuration**: invalid or missing configuration
///
/// # Examples
///
/// ```
/// use sdk::errors::{AdvisorError, HavenErrorExt};
///
/// let error = AdvisorError::EmptyMessage;
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let limit = AdvisorError::DailyLimitReached { used: 10, limit: 10 };
/// assert!(!limit.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum AdvisorError {
    // Validation rejections
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Session has ended")]
    SessionEnded,

    #[error("Message limit reached: {count}/{limit} messages")]
    MessageLimitReached { count: usize, limit: usize },

    #[error("Reply was cancelled before it completed")]
    Cancelled,

    // Quota errors
    #[error("Daily limit reached: {used}/{limit} sessions started today")]
    DailyLimitReached { used: u32, limit: u32 },

    // Service errors
    #[error("Reasoning service unavailable: {0}")]
    ServiceUnavailable(String),

    // Persistence errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdvisorError {
    /// Returns true for the rejected-operation family of errors
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyMessage | Self::SessionEnded | Self::MessageLimitReached { .. }
        )
    }
}

impl HavenErrorExt for AdvisorError {
    fn user_hint(&self) -> &str {
        match self {
            // Validation rejections
            Self::EmptyMessage => "Type a question before sending",
            Self::SessionEnded => "This conversation has ended. Start a new chat",
            Self::MessageLimitReached { .. } => {
                "This conversation is full. Save it or start a new chat"
            }
            Self::Cancelled => "The reply was cancelled",

            // Quota errors
            Self::DailyLimitReached { .. } => {
                "You've reached today's limit. Your limit resets at midnight"
            }

            // Service errors
            Self::ServiceUnavailable(_) => "Advisor service unavailable. Using offline guidance",

            // Persistence errors
            Self::Persistence(_) => "Could not save usage data",

            // Configuration errors
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Serialization(_) => "Stored data could not be read",

            // Generic IO error
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // The quota only resets with the calendar day
            Self::DailyLimitReached { .. } | Self::Config(_) => false,

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}
