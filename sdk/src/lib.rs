//! Haven SDK
//!
//! Shared library providing the conversation types and error taxonomy for
//! the Haven advisor. This crate is used by the engine and by any host that
//! renders a conversation.

/// Error types and handling
pub mod errors;

/// Onboarding profile passed to the advisor as context
pub mod profile;

/// Message, usage, and record types
pub mod types;

// Re-export commonly used types
pub use errors::{AdvisorError, HavenErrorExt};
pub use profile::{GoalTag, UserProfile};
pub use types::{Message, MessageAnnotation, MessageRole, SessionRecord, SessionUsage, SummaryText};
