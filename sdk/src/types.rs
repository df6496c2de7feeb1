//! Conversation types shared between the engine and its hosts

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a message author
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message typed by the person using the app
    User,

    /// Message authored by the advisor (service or fallback oracle)
    Advisor,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Advisor => write!(f, "advisor"),
        }
    }
}

/// Rendering hints attached to a message
///
/// Annotations never change how the session behaves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageAnnotation {
    /// Content embeds a `[...]` call-to-action that opens the advisor scheduler
    ScheduleLink,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,

    pub content: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<MessageAnnotation>,
}

impl Message {
    /// Create a new user message stamped with the current time
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create a new advisor message stamped with the current time
    pub fn advisor(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Advisor, content)
    }

    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            annotations: Vec::new(),
        }
    }

    /// Attach a rendering annotation
    pub fn with_annotation(mut self, annotation: MessageAnnotation) -> Self {
        if !self.annotations.contains(&annotation) {
            self.annotations.push(annotation);
        }
        self
    }

    /// Replace the creation timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn has_annotation(&self, annotation: MessageAnnotation) -> bool {
        self.annotations.contains(&annotation)
    }
}

/// Daily session counter as persisted by the usage ledger
///
/// Serialized as `{"date":"YYYY-MM-DD","sessionsStartedToday":N}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUsage {
    /// Local calendar date the counter applies to
    pub date: NaiveDate,

    /// Number of sessions started on `date`
    pub sessions_started_today: u32,
}

impl SessionUsage {
    /// A zeroed counter for the given day
    pub fn zeroed(date: NaiveDate) -> Self {
        Self {
            date,
            sessions_started_today: 0,
        }
    }
}

/// Condensed takeaways for a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SummaryText(String);

impl SummaryText {
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SummaryText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A saved conversation handed to the message center
///
/// Records are created once when the user saves a chat and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,

    pub messages: Vec<Message>,

    pub summary: SummaryText,

    pub saved_at: DateTime<Utc>,
}
