//! Session host
//!
//! Owns the process-wide collaborators (usage ledger, advisor, event bus and
//! saved-chat storage) and hands out conversation sessions while today's
//! chat allowance lasts.

use anyhow::{Context, Result};
use sdk::{AdvisorError, SessionRecord, SessionUsage, UserProfile};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::bus::{Event, MessageBus};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, LimitsConfig, StorageBackend};
use crate::db::{Database, SessionRecordRepository};
use crate::reasoning::{Advisor, HttpReasoningService, PollPolicy, ReasoningService};
use crate::session::{ConversationSession, Greeting, SessionContext, SessionLimits};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::usage_ledger::UsageLedger;

/// Where saved chats go
pub enum SavedSessions {
    Sqlite(SessionRecordRepository),
    /// Kept for the lifetime of the process only
    Memory(Mutex<Vec<SessionRecord>>),
}

impl SavedSessions {
    pub fn in_memory() -> Self {
        Self::Memory(Mutex::new(Vec::new()))
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        match self {
            Self::Sqlite(repo) => repo.save(record).await,
            Self::Memory(records) => {
                let mut records = records.lock().await;
                if records.iter().any(|r| r.session_id == record.session_id) {
                    anyhow::bail!("Session {} is already saved", record.session_id);
                }
                records.push(record.clone());
                Ok(())
            }
        }
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        match self {
            Self::Sqlite(repo) => repo.list_recent(i64::try_from(limit).unwrap_or(i64::MAX)).await,
            Self::Memory(records) => {
                let mut records = records.lock().await.clone();
                records.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
                records.truncate(limit);
                Ok(records)
            }
        }
    }
}

/// Entry point for hosts that run conversations
pub struct SessionHost {
    limits: LimitsConfig,
    ledger: Arc<UsageLedger>,
    ctx: SessionContext,
    saved: SavedSessions,
    profile: UserProfile,
    database: Option<Database>,
}

impl SessionHost {
    pub fn new(
        limits: LimitsConfig,
        ledger: Arc<UsageLedger>,
        ctx: SessionContext,
        saved: SavedSessions,
    ) -> Self {
        Self {
            limits,
            ledger,
            ctx,
            saved,
            profile: UserProfile::default(),
            database: None,
        }
    }

    /// Wire up storage, the ledger and the advisor from configuration
    pub async fn open(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (store, saved, database) = match config.storage.backend {
            StorageBackend::Sqlite => {
                let db = Database::new(&config.database_path())
                    .await
                    .context("Failed to open usage database")?;
                let store: Arc<dyn KeyValueStore> = Arc::new(db.kv_store());
                (store, SavedSessions::Sqlite(db.records()), Some(db))
            }
            StorageBackend::Memory => {
                let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
                (store, SavedSessions::in_memory(), None)
            }
        };

        let service: Option<Arc<dyn ReasoningService>> = if config.reasoning.enabled {
            match HttpReasoningService::new(
                config.reasoning.base_url.clone(),
                config.reasoning.request_timeout(),
            ) {
                Ok(service) => {
                    info!("Reasoning service: {}", service.base_url());
                    let service: Arc<dyn ReasoningService> = Arc::new(service);
                    Some(service)
                }
                Err(e) => {
                    warn!("Reasoning service disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let ledger = Arc::new(UsageLedger::new(store, clock.clone()));
        let ctx = SessionContext {
            advisor: Arc::new(Advisor::new(
                service,
                PollPolicy::from_config(&config.reasoning),
            )),
            bus: Arc::new(MessageBus::new()),
            clock,
        };

        let mut host = Self::new(config.limits.clone(), ledger, ctx, saved);
        host.database = database;
        Ok(host)
    }

    /// Profile passed to every new session
    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.ctx.bus
    }

    pub fn advisor(&self) -> &Arc<Advisor> {
        &self.ctx.advisor
    }

    /// Start the first chat of a visit
    pub async fn start_session(&self) -> Result<ConversationSession, AdvisorError> {
        self.start_with(Greeting::Welcome).await
    }

    /// Start another chat after the previous one was saved or ended
    pub async fn start_fresh_session(&self) -> Result<ConversationSession, AdvisorError> {
        self.start_with(Greeting::FreshStart).await
    }

    async fn start_with(&self, greeting: Greeting) -> Result<ConversationSession, AdvisorError> {
        let limit = self.limits.max_chats_per_day;
        self.ledger
            .try_increment_today(limit)
            .await
            .map_err(|usage| AdvisorError::DailyLimitReached {
                used: usage.sessions_started_today,
                limit,
            })?;

        Ok(ConversationSession::seeded(
            self.ctx.clone(),
            SessionLimits::from(&self.limits),
            self.profile.clone(),
            greeting,
        )
        .await)
    }

    /// Summarize and store a chat
    pub async fn save_session(
        &self,
        session: &ConversationSession,
    ) -> Result<SessionRecord, AdvisorError> {
        let record = session.summarize().await;

        self.saved
            .save(&record)
            .await
            .map_err(|e| AdvisorError::Persistence(format!("{:#}", e)))?;
        info!("Session saved: {}", record.session_id);

        self.ctx
            .bus
            .publish(Event::SummaryReady {
                session_id: record.session_id.clone(),
                summary: record.summary.clone(),
            })
            .await;

        Ok(record)
    }

    /// Saved chats, newest first
    pub async fn saved_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, AdvisorError> {
        self.saved
            .list_recent(limit)
            .await
            .map_err(|e| AdvisorError::Persistence(format!("{:#}", e)))
    }

    pub async fn usage_today(&self) -> SessionUsage {
        self.ledger.read_today().await
    }

    pub async fn chats_remaining_today(&self) -> u32 {
        self.ledger
            .sessions_remaining(self.limits.max_chats_per_day)
            .await
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Flush and close storage
    pub async fn close(self) -> Result<()> {
        if let Some(db) = self.database {
            db.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventType;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;
    use tokio_util::sync::CancellationToken;

    fn host(max_chats_per_day: u32) -> SessionHost {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        ));
        let ledger = Arc::new(UsageLedger::new(Arc::new(MemoryStore::new()), clock.clone()));
        let ctx = SessionContext {
            advisor: Arc::new(Advisor::offline()),
            bus: Arc::new(MessageBus::new()),
            clock,
        };
        let limits = LimitsConfig {
            max_chats_per_day,
            ..Default::default()
        };
        SessionHost::new(limits, ledger, ctx, SavedSessions::in_memory())
    }

    #[tokio::test]
    async fn test_daily_limit_enforced() {
        let host = host(2);

        host.start_session().await.unwrap();
        host.start_fresh_session().await.unwrap();
        assert_eq!(host.chats_remaining_today().await, 0);

        let err = host.start_session().await.err().unwrap();
        assert!(matches!(
            err,
            AdvisorError::DailyLimitReached { used: 2, limit: 2 }
        ));
        assert_eq!(host.usage_today().await.sessions_started_today, 2);
    }

    #[tokio::test]
    async fn test_concurrent_starts_share_the_last_slot() {
        let host = host(1);

        let (first, second) = tokio::join!(host.start_session(), host.start_fresh_session());
        let started = [first.is_ok(), second.is_ok()]
            .iter()
            .filter(|ok| **ok)
            .count();

        assert_eq!(started, 1);
        assert_eq!(host.usage_today().await.sessions_started_today, 1);
    }

    #[tokio::test]
    async fn test_save_session_publishes_summary() {
        let host = host(10);
        let mut rx = host.bus().subscribe(EventType::SummaryReady).await;

        let mut session = host.start_session().await.unwrap();
        session
            .submit_message("Is this purchase worth it?", &CancellationToken::new())
            .await
            .unwrap();

        let record = host.save_session(&session).await.unwrap();
        match rx.recv().await.unwrap() {
            Event::SummaryReady {
                session_id,
                summary,
            } => {
                assert_eq!(session_id, record.session_id);
                assert_eq!(summary, record.summary);
            }
            other => panic!("Wrong event received: {:?}", other),
        }

        let saved = host.saved_sessions(10).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0], record);

        // Records are insert-only
        assert!(matches!(
            host.save_session(&session).await,
            Err(AdvisorError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_profile_reaches_sessions() {
        let profile = UserProfile {
            name: "Ada".to_string(),
            ..Default::default()
        };
        let host = host(10).with_profile(profile);

        let session = host.start_session().await.unwrap();
        assert!(session.messages()[0].content.starts_with("Hi Ada!"));
    }
}
