//! Session event bus
//!
//! The MessageBus lets a host observe conversation sessions without the
//! session knowing who is listening. It uses bounded channels and supports
//! both specific event subscriptions and global "All" subscriptions.
//!
//! Publishing never waits on a slow subscriber: if a subscriber's channel is
//! full or closed, the event is dropped for that subscriber only.

use sdk::{Message, SummaryText};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Channel buffer size for bounded channels
const CHANNEL_BUFFER_SIZE: usize = 100;

/// Event types that can be published on the bus
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum EventType {
    SessionStarted,
    MessageAppended,
    AdvisorTyping,
    SessionEnded,
    SummaryReady,
    /// Subscribe to all event types
    All,
}

/// Why a session stopped accepting messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// No room left for another exchange
    QuotaExhausted,
    /// The user ended the conversation
    UserEnded,
}

/// Events published by sessions and the session host
#[derive(Debug, Clone)]
pub enum Event {
    SessionStarted {
        session_id: String,
    },
    MessageAppended {
        session_id: String,
        message: Message,
    },
    /// A reply is being prepared
    AdvisorTyping {
        session_id: String,
    },
    SessionEnded {
        session_id: String,
        reason: EndReason,
    },
    SummaryReady {
        session_id: String,
        summary: SummaryText,
    },
}

impl Event {
    /// Get the event type for this event
    pub fn event_type(&self) -> EventType {
        match self {
            Event::SessionStarted { .. } => EventType::SessionStarted,
            Event::MessageAppended { .. } => EventType::MessageAppended,
            Event::AdvisorTyping { .. } => EventType::AdvisorTyping,
            Event::SessionEnded { .. } => EventType::SessionEnded,
            Event::SummaryReady { .. } => EventType::SummaryReady,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Event::SessionStarted { session_id }
            | Event::MessageAppended { session_id, .. }
            | Event::AdvisorTyping { session_id }
            | Event::SessionEnded { session_id, .. }
            | Event::SummaryReady { session_id, .. } => session_id,
        }
    }
}

/// Pub/sub bus for session events
pub struct MessageBus {
    /// Map of event types to lists of subscribers
    channels: Arc<Mutex<HashMap<EventType, Vec<mpsc::Sender<Event>>>>>,
}

impl MessageBus {
    /// Create a new MessageBus
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to a specific event type, or `EventType::All`
    ///
    /// The returned channel holds at most CHANNEL_BUFFER_SIZE undelivered
    /// events.
    pub async fn subscribe(&self, event_type: EventType) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut channels = self.channels.lock().await;
        channels.entry(event_type).or_default().push(tx);
        rx
    }

    /// Publish an event to subscribers of its type and to "All" subscribers
    ///
    /// Subscribers whose receiver was dropped are pruned.
    pub async fn publish(&self, event: Event) {
        let mut channels = self.channels.lock().await;
        let event_type = event.event_type();

        for key in [event_type, EventType::All] {
            if let Some(subscribers) = channels.get_mut(&key) {
                subscribers.retain(|tx| match tx.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        debug!("Subscriber channel full, dropping {:?}", event_type);
                        true
                    }
                    Err(TrySendError::Closed(_)) => false,
                });
            }
        }
    }

    /// Number of live subscribers across all event types
    pub async fn subscriber_count(&self) -> usize {
        let channels = self.channels.lock().await;
        channels
            .values()
            .flatten()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
