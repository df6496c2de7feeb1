//! Integration tests for conversation sessions
//!
//! Drives sessions through the public API the way a host would: greeting
//! seeding, keyword routing, quota exhaustion, daily reset and fallback when
//! the reasoning service misbehaves.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use haven_engine::bus::MessageBus;
use haven_engine::clock::{Clock, FixedClock};
use haven_engine::db::Database;
use haven_engine::oracle::ResponseOracle;
use haven_engine::reasoning::{
    Advisor, JobStatus, PollPolicy, ReasoningError, ReasoningService, ReplyRequest, ServiceReply,
};
use haven_engine::session::{
    ConversationSession, Greeting, SessionContext, SessionLimits, SessionStatus,
};
use haven_engine::storage::MemoryStore;
use haven_engine::usage_ledger::UsageLedger;
use sdk::{AdvisorError, Message, MessageRole, UserProfile};

/// Service that fails every call
struct BrokenService;

#[async_trait]
impl ReasoningService for BrokenService {
    fn name(&self) -> &str {
        "broken"
    }

    async fn reply(&self, _request: &ReplyRequest) -> haven_engine::reasoning::Result<ServiceReply> {
        Err(ReasoningError::ServiceUnavailable("always down".to_string()))
    }

    async fn poll(&self, _job_id: &str) -> haven_engine::reasoning::Result<JobStatus> {
        Err(ReasoningError::ServiceUnavailable("always down".to_string()))
    }

    async fn summarize(
        &self,
        _messages: &[Message],
        _profile: &UserProfile,
    ) -> haven_engine::reasoning::Result<String> {
        Err(ReasoningError::Timeout)
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

struct Harness {
    clock: Arc<FixedClock>,
    ledger: UsageLedger,
    ctx: SessionContext,
}

impl Harness {
    fn new(advisor: Advisor) -> Self {
        let clock = Arc::new(FixedClock::on(day(19)));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let ledger = UsageLedger::new(Arc::new(MemoryStore::new()), dyn_clock.clone());
        let ctx = SessionContext {
            advisor: Arc::new(advisor),
            bus: Arc::new(MessageBus::new()),
            clock: dyn_clock,
        };
        Self { clock, ledger, ctx }
    }

    async fn start(&self, max_messages: usize) -> ConversationSession {
        ConversationSession::start(
            self.ctx.clone(),
            &self.ledger,
            SessionLimits {
                max_chars: 500,
                max_messages,
            },
            UserProfile::default(),
            Greeting::Welcome,
        )
        .await
    }
}

#[tokio::test]
async fn test_new_session_is_seeded_with_greeting() {
    let harness = Harness::new(Advisor::offline());
    let session = harness.start(20).await;

    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.messages()[0].role, MessageRole::Advisor);
    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(
        harness.ledger.read_today().await.sessions_started_today,
        1
    );
}

#[tokio::test]
async fn test_keyword_routing_through_session() {
    let harness = Harness::new(Advisor::offline());
    let mut session = harness.start(20).await;
    let cancel = CancellationToken::new();

    let debt = session
        .submit_message("I'm worried about my credit card debt", &cancel)
        .await
        .unwrap();
    assert!(debt.content.contains("highest interest rate"));

    let focus = session
        .submit_message("what should I focus on first", &cancel)
        .await
        .unwrap();
    assert!(focus.content.contains("foundation"));

    let roles: Vec<MessageRole> = session.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::Advisor,
            MessageRole::User,
            MessageRole::Advisor,
            MessageRole::User,
            MessageRole::Advisor,
        ]
    );
}

#[tokio::test]
async fn test_quota_exhaustion_with_small_limit() {
    let harness = Harness::new(Advisor::offline());
    let mut session = harness.start(4).await;
    let cancel = CancellationToken::new();

    // The first exchange leaves one slot, which cannot hold another exchange
    session.submit_message("How am I doing?", &cancel).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Ended);
    assert!(session.messages().len() <= 4);

    let before = session.messages().to_vec();
    let err = session.submit_message("Anything else?", &cancel).await.unwrap_err();
    assert!(matches!(err, AdvisorError::SessionEnded));
    assert_eq!(session.messages(), before.as_slice());
}

#[tokio::test]
async fn test_default_limit_allows_nine_exchanges() {
    let harness = Harness::new(Advisor::offline());
    let mut session = harness.start(20).await;
    let cancel = CancellationToken::new();

    for i in 0..9 {
        assert!(session.is_active(), "ended early at exchange {}", i);
        session
            .submit_message(&format!("question {}", i), &cancel)
            .await
            .unwrap();
    }

    assert_eq!(session.messages().len(), 19);
    assert_eq!(session.messages_remaining(), 1);
    assert_eq!(session.status(), SessionStatus::Ended);
}

#[tokio::test]
async fn test_truncated_message_is_stored() {
    let harness = Harness::new(Advisor::offline());
    let mut session = harness.start(20).await;

    let long = "a".repeat(750);
    session
        .submit_message(&long, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(session.messages()[1].content.chars().count(), 500);
}

#[tokio::test]
async fn test_fallback_on_service_failure() {
    let policy = PollPolicy {
        interval: std::time::Duration::from_millis(5),
        max_attempts: 2,
        request_timeout: std::time::Duration::from_secs(1),
    };
    let harness = Harness::new(Advisor::new(Some(Arc::new(BrokenService)), policy));
    let mut session = harness.start(20).await;

    let reply = session
        .submit_message("How am I doing?", &CancellationToken::new())
        .await
        .unwrap();

    let expected = ResponseOracle::new().respond("How am I doing?", &UserProfile::default());
    assert!(!reply.content.is_empty());
    assert_eq!(reply.content, expected);

    // Summaries fall back silently too
    let record = session.summarize().await;
    assert!(record.summary.as_str().contains("How am I doing?"));
}

#[tokio::test]
async fn test_daily_reset_across_midnight() {
    let harness = Harness::new(Advisor::offline());
    for _ in 0..3 {
        harness.start(20).await;
    }
    assert_eq!(harness.ledger.read_today().await.sessions_started_today, 3);

    harness.clock.advance(chrono::Duration::days(1));

    let usage = harness.ledger.read_today().await;
    assert_eq!(usage.date, day(20));
    assert_eq!(usage.sessions_started_today, 0);
}

#[tokio::test]
async fn test_ledger_survives_database_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("haven.db");
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(day(19)));

    {
        let db = Database::new(&db_path).await.unwrap();
        let ledger = UsageLedger::new(Arc::new(db.kv_store()), clock.clone());
        ledger.increment_today().await;
        ledger.increment_today().await;
        db.close().await.unwrap();
    }

    let db = Database::new(&db_path).await.unwrap();
    let ledger = UsageLedger::new(Arc::new(db.kv_store()), clock);
    let usage = ledger.read_today().await;
    assert_eq!(usage.sessions_started_today, 2);
    assert!(ledger.can_start_session(3).await);
    assert!(!ledger.can_start_session(2).await);
    db.close().await.unwrap();
}
