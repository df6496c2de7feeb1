//! Daily usage ledger
//!
//! Tracks how many conversation sessions were started on the current local
//! calendar date and enforces the per-day ceiling.
//!
//! # Storage
//!
//! The counter lives under a single key as JSON:
//! `{"date":"YYYY-MM-DD","sessionsStartedToday":N}`.
//!
//! # Daily Reset
//!
//! There is no midnight timer. A stored record whose date is not today reads
//! as zero usage for today; nothing is written until the next increment.
//!
//! # Degraded Operation
//!
//! Storage failures never block a conversation. Unreadable or malformed
//! records read as zero usage, and failed writes are logged and dropped.
//! The worst outcome is an under-enforced daily quota.

use sdk::SessionUsage;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::storage::KeyValueStore;

/// Key holding the serialized [`SessionUsage`]
pub const USAGE_KEY: &str = "haven.sessions_today";

/// Ledger of sessions started per day
pub struct UsageLedger {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,

    /// Serializes read-modify-write increments within this process
    increment_lock: Mutex<()>,
}

impl UsageLedger {
    /// Create a new usage ledger
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            increment_lock: Mutex::new(()),
        }
    }

    /// Usage for today's local date
    ///
    /// Returns a zeroed record when nothing is stored, the stored value
    /// cannot be read or parsed, or it belongs to another day.
    pub async fn read_today(&self) -> SessionUsage {
        let today = self.clock.today();

        let raw = match self.store.get(USAGE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No usage recorded yet");
                return SessionUsage::zeroed(today);
            }
            Err(e) => {
                warn!("Failed to read usage ledger, assuming no usage today: {:#}", e);
                return SessionUsage::zeroed(today);
            }
        };

        match serde_json::from_str::<SessionUsage>(&raw) {
            Ok(usage) if usage.date == today => usage,
            Ok(usage) => {
                debug!(
                    "Usage record is from {}, resetting for {}",
                    usage.date, today
                );
                SessionUsage::zeroed(today)
            }
            Err(e) => {
                warn!("Malformed usage record, assuming no usage today: {}", e);
                SessionUsage::zeroed(today)
            }
        }
    }

    /// Count one more session for today and persist it
    ///
    /// The write is best-effort: the incremented value is returned even if
    /// persisting it failed.
    pub async fn increment_today(&self) -> SessionUsage {
        let _guard = self.increment_lock.lock().await;
        let usage = self.read_today().await;
        self.record_increment(usage).await
    }

    /// Count one more session unless today's usage already reached `limit`
    ///
    /// The check and the increment run under one lock, so concurrent callers
    /// cannot both take the last slot. On refusal the current usage is
    /// returned unchanged.
    pub async fn try_increment_today(&self, limit: u32) -> Result<SessionUsage, SessionUsage> {
        let _guard = self.increment_lock.lock().await;
        let usage = self.read_today().await;
        if usage.sessions_started_today >= limit {
            info!(
                "Daily limit reached: {}/{}",
                usage.sessions_started_today, limit
            );
            return Err(usage);
        }
        Ok(self.record_increment(usage).await)
    }

    // Caller holds `increment_lock`
    async fn record_increment(&self, mut usage: SessionUsage) -> SessionUsage {
        usage.sessions_started_today = usage.sessions_started_today.saturating_add(1);

        match serde_json::to_string(&usage) {
            Ok(encoded) => {
                if let Err(e) = self.store.set(USAGE_KEY, &encoded).await {
                    warn!("Failed to persist usage ledger: {:#}", e);
                }
            }
            Err(e) => warn!("Failed to encode usage record: {}", e),
        }

        info!(
            "Session started: {} today ({})",
            usage.sessions_started_today, usage.date
        );

        usage
    }

    /// Whether another session may start under `limit`
    pub async fn can_start_session(&self, limit: u32) -> bool {
        self.read_today().await.sessions_started_today < limit
    }

    /// Sessions left today under `limit`
    pub async fn sessions_remaining(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.read_today().await.sessions_started_today)
    }
}
