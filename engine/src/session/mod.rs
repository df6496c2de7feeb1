//! Conversation session
//!
//! One chat from greeting to end. A session owns its ordered transcript,
//! enforces the per-message character limit and the per-session message
//! quota, and asks the [`Advisor`] for each reply.
//!
//! # Lifecycle
//!
//! ```text
//!  start ──► Active ──(quota exhausted | end_session)──► Ended
//! ```
//!
//! Ending is irreversible. Every exchange takes two slots (user message and
//! advisor reply), so a session ends as soon as fewer than two slots remain.
//! The transcript therefore never grows past the message limit.

use sdk::{AdvisorError, Message, MessageAnnotation, SessionRecord, UserProfile};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bus::{EndReason, Event, MessageBus};
use crate::clock::Clock;
use crate::config::LimitsConfig;
use crate::reasoning::Advisor;
use crate::usage_ledger::UsageLedger;

/// Slots consumed by one user message and its reply
const EXCHANGE_SLOTS: usize = 2;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Ended,
}

/// Opening advisor message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greeting {
    /// First chat on the screen, with the scheduling call-to-action
    Welcome,
    /// A new chat started right after another one
    FreshStart,
}

impl Greeting {
    pub fn message(self, profile: &UserProfile) -> Message {
        match self {
            Greeting::Welcome => {
                let name = profile
                    .display_name()
                    .map(|name| format!(" {}", name))
                    .unwrap_or_default();
                Message::advisor(format!(
                    "Hi{}! I'm here to help you navigate your day-to-day financial questions.\n\n\
                     For meaningful changes to your overall approach, [schedule time with your AI Advisor].",
                    name
                ))
                .with_annotation(MessageAnnotation::ScheduleLink)
            }
            Greeting::FreshStart => Message::advisor("Starting fresh! What's on your mind?"),
        }
    }
}

/// Per-session quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Characters kept from each user message
    pub max_chars: usize,

    /// Messages in the transcript, greeting included
    pub max_messages: usize,
}

impl From<&LimitsConfig> for SessionLimits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            max_messages: config.max_messages,
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

/// Collaborators shared by every session of a host
#[derive(Clone)]
pub struct SessionContext {
    pub advisor: Arc<Advisor>,
    pub bus: Arc<MessageBus>,
    pub clock: Arc<dyn Clock>,
}

/// Truncate to `max_chars` characters, then trim surrounding whitespace
pub fn normalize_input(text: &str, max_chars: usize) -> String {
    let truncated: String = text.chars().take(max_chars).collect();
    truncated.trim().to_string()
}

/// A single conversation with the advisor
pub struct ConversationSession {
    id: String,
    messages: Vec<Message>,
    status: SessionStatus,
    limits: SessionLimits,
    profile: UserProfile,
    ctx: SessionContext,
}

impl ConversationSession {
    /// Start a session seeded with `greeting`
    ///
    /// Counts exactly one session against today's usage.
    pub async fn start(
        ctx: SessionContext,
        ledger: &UsageLedger,
        limits: SessionLimits,
        profile: UserProfile,
        greeting: Greeting,
    ) -> Self {
        ledger.increment_today().await;
        Self::seeded(ctx, limits, profile, greeting).await
    }

    /// Seed a session whose start was already counted against today's usage
    pub(crate) async fn seeded(
        ctx: SessionContext,
        limits: SessionLimits,
        profile: UserProfile,
        greeting: Greeting,
    ) -> Self {
        let mut session = Self {
            id: Uuid::new_v4().to_string(),
            messages: Vec::with_capacity(limits.max_messages),
            status: SessionStatus::Active,
            limits,
            profile,
            ctx,
        };

        info!("Session started: {}", session.id);
        session
            .ctx
            .bus
            .publish(Event::SessionStarted {
                session_id: session.id.clone(),
            })
            .await;

        let opening = greeting
            .message(&session.profile)
            .with_timestamp(session.ctx.clock.now());
        session.append(opening).await;
        session.settle_quota().await;

        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Free message slots
    pub fn messages_remaining(&self) -> usize {
        self.limits.max_messages.saturating_sub(self.messages.len())
    }

    /// Characters still available for a draft
    pub fn chars_remaining(&self, draft: &str) -> usize {
        self.limits.max_chars.saturating_sub(draft.chars().count())
    }

    /// Send a user message and wait for the advisor's reply
    ///
    /// Text longer than the character limit is truncated silently. Returns
    /// the appended advisor message. Rejections leave the session unchanged.
    /// If `cancel` fires while the reply is pending, the user message stays
    /// in the transcript, no reply is appended and `Cancelled` is returned.
    pub async fn submit_message(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Message, AdvisorError> {
        if self.status == SessionStatus::Ended {
            return Err(AdvisorError::SessionEnded);
        }

        let content = normalize_input(text, self.limits.max_chars);
        if content.is_empty() {
            return Err(AdvisorError::EmptyMessage);
        }

        if self.messages.len() + EXCHANGE_SLOTS > self.limits.max_messages {
            return Err(AdvisorError::MessageLimitReached {
                count: self.messages.len(),
                limit: self.limits.max_messages,
            });
        }

        let history = self.messages.clone();
        let user = Message::user(content.clone()).with_timestamp(self.ctx.clock.now());
        self.append(user).await;

        self.ctx
            .bus
            .publish(Event::AdvisorTyping {
                session_id: self.id.clone(),
            })
            .await;

        let reply = match self
            .ctx
            .advisor
            .reply(&history, &content, &self.profile, cancel)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                self.settle_quota().await;
                return Err(e);
            }
        };
        debug!("Reply source for {}: {:?}", self.id, reply.source);

        let advisor = Message::advisor(reply.text).with_timestamp(self.ctx.clock.now());
        self.append(advisor.clone()).await;
        self.settle_quota().await;

        Ok(advisor)
    }

    /// End the session early
    pub async fn end_session(&mut self) -> Result<(), AdvisorError> {
        if self.status == SessionStatus::Ended {
            return Err(AdvisorError::SessionEnded);
        }
        self.end(EndReason::UserEnded).await;
        Ok(())
    }

    /// Summarize the transcript into a record ready to save
    ///
    /// Allowed in any state; does not change the status.
    pub async fn summarize(&self) -> SessionRecord {
        let summary = self
            .ctx
            .advisor
            .summarize(&self.messages, &self.profile, self.ctx.clock.today())
            .await;

        SessionRecord {
            session_id: self.id.clone(),
            messages: self.messages.clone(),
            summary,
            saved_at: self.ctx.clock.now(),
        }
    }

    async fn append(&mut self, message: Message) {
        debug!(
            "Message appended to {}: role={}, chars={}",
            self.id,
            message.role,
            message.content.chars().count()
        );
        self.messages.push(message.clone());
        self.ctx
            .bus
            .publish(Event::MessageAppended {
                session_id: self.id.clone(),
                message,
            })
            .await;
    }

    /// End the session once another exchange no longer fits
    async fn settle_quota(&mut self) {
        if self.status == SessionStatus::Active
            && self.messages.len() + EXCHANGE_SLOTS > self.limits.max_messages
        {
            self.end(EndReason::QuotaExhausted).await;
        }
    }

    async fn end(&mut self, reason: EndReason) {
        self.status = SessionStatus::Ended;
        info!("Session ended: {} ({:?})", self.id, reason);
        self.ctx
            .bus
            .publish(Event::SessionEnded {
                session_id: self.id.clone(),
                reason,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventType;
    use crate::clock::FixedClock;
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;
    use sdk::MessageRole;

    fn context() -> (SessionContext, UsageLedger) {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        ));
        let ledger = UsageLedger::new(Arc::new(MemoryStore::new()), clock.clone());
        let ctx = SessionContext {
            advisor: Arc::new(Advisor::offline()),
            bus: Arc::new(MessageBus::new()),
            clock,
        };
        (ctx, ledger)
    }

    async fn session_with(max_messages: usize) -> (ConversationSession, UsageLedger) {
        let (ctx, ledger) = context();
        let limits = SessionLimits {
            max_chars: 500,
            max_messages,
        };
        let session = ConversationSession::start(
            ctx,
            &ledger,
            limits,
            UserProfile::default(),
            Greeting::Welcome,
        )
        .await;
        (session, ledger)
    }

    #[test]
    fn test_normalize_truncates_then_trims() {
        assert_eq!(normalize_input("  hello  ", 500), "hello");
        assert_eq!(normalize_input("abcdef", 3), "abc");
        assert_eq!(normalize_input("ab   cdef", 4), "ab");
        assert_eq!(normalize_input("ééé", 2), "éé");
        assert_eq!(normalize_input("   ", 500), "");
    }

    #[test]
    fn test_welcome_greeting() {
        let profile = UserProfile {
            name: "Sam".to_string(),
            ..Default::default()
        };
        let message = Greeting::Welcome.message(&profile);
        assert!(message.content.starts_with("Hi Sam! "));
        assert!(message.has_annotation(MessageAnnotation::ScheduleLink));

        let anonymous = Greeting::Welcome.message(&UserProfile::default());
        assert!(anonymous.content.starts_with("Hi! "));

        let fresh = Greeting::FreshStart.message(&profile);
        assert_eq!(fresh.content, "Starting fresh! What's on your mind?");
        assert!(fresh.annotations.is_empty());
    }

    #[tokio::test]
    async fn test_start_seeds_greeting_and_counts_usage() {
        let (session, ledger) = session_with(20).await;

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, MessageRole::Advisor);
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.messages_remaining(), 19);
        assert_eq!(ledger.read_today().await.sessions_started_today, 1);
    }

    #[tokio::test]
    async fn test_submit_appends_exchange() {
        let (mut session, _ledger) = session_with(20).await;
        let cancel = CancellationToken::new();

        let reply = session
            .submit_message("  Help me understand my debt  ", &cancel)
            .await
            .unwrap();

        assert_eq!(reply.role, MessageRole::Advisor);
        assert!(reply.content.contains("highest interest rate"));
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages()[1].content, "Help me understand my debt");
        assert_eq!(session.messages()[2], reply);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (mut session, _ledger) = session_with(20).await;
        let cancel = CancellationToken::new();

        let err = session.submit_message(" \n\t ", &cancel).await.unwrap_err();
        assert!(matches!(err, AdvisorError::EmptyMessage));
        assert_eq!(session.messages().len(), 1);
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn test_quota_ends_session() {
        let (mut session, _ledger) = session_with(4).await;
        let cancel = CancellationToken::new();

        session.submit_message("first", &cancel).await.unwrap();
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.status(), SessionStatus::Ended);

        let err = session.submit_message("second", &cancel).await.unwrap_err();
        assert!(matches!(err, AdvisorError::SessionEnded));
        assert_eq!(session.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_too_small_limit_starts_ended() {
        let (session, ledger) = session_with(2).await;
        assert_eq!(session.status(), SessionStatus::Ended);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(ledger.read_today().await.sessions_started_today, 1);
    }

    #[tokio::test]
    async fn test_end_session_is_irreversible() {
        let (mut session, _ledger) = session_with(20).await;
        let cancel = CancellationToken::new();

        session.end_session().await.unwrap();
        assert_eq!(session.status(), SessionStatus::Ended);
        assert!(matches!(
            session.end_session().await,
            Err(AdvisorError::SessionEnded)
        ));
        assert!(session.submit_message("hello", &cancel).await.is_err());
    }

    #[tokio::test]
    async fn test_summarize_keeps_status() {
        let (mut session, _ledger) = session_with(20).await;
        let cancel = CancellationToken::new();
        session
            .submit_message("What should I focus on first?", &cancel)
            .await
            .unwrap();

        let record = session.summarize().await;
        assert_eq!(record.session_id, session.id());
        assert_eq!(record.messages.len(), 3);
        assert!(record
            .summary
            .as_str()
            .contains("What should I focus on first?"));
        assert!(session.is_active());

        session.end_session().await.unwrap();
        let ended = session.summarize().await;
        assert_eq!(ended.messages, record.messages);
    }

    #[tokio::test]
    async fn test_cancelled_reply_appends_nothing_more() {
        let (mut session, _ledger) = session_with(20).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = session.submit_message("hello", &cancel).await.unwrap_err();
        assert!(matches!(err, AdvisorError::Cancelled));
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].role, MessageRole::User);
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn test_events_published_in_order() {
        let (ctx, ledger) = context();
        let mut rx = ctx.bus.subscribe(EventType::All).await;

        let mut session = ConversationSession::start(
            ctx,
            &ledger,
            SessionLimits {
                max_chars: 500,
                max_messages: 4,
            },
            UserProfile::default(),
            Greeting::FreshStart,
        )
        .await;
        session
            .submit_message("How am I doing?", &CancellationToken::new())
            .await
            .unwrap();

        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.session_id(), session.id());
            types.push(event.event_type());
        }
        assert_eq!(
            types,
            vec![
                EventType::SessionStarted,
                EventType::MessageAppended,
                EventType::MessageAppended,
                EventType::AdvisorTyping,
                EventType::MessageAppended,
                EventType::SessionEnded,
            ]
        );
    }

    #[tokio::test]
    async fn test_chars_remaining() {
        let (session, _ledger) = session_with(20).await;
        assert_eq!(session.chars_remaining(""), 500);
        assert_eq!(session.chars_remaining("héllo"), 495);
        assert_eq!(session.chars_remaining(&"x".repeat(600)), 0);
    }
}
