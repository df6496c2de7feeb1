//! Haven Engine Library
//!
//! This library provides the advisor conversation core: usage quotas,
//! offline oracles, the optional reasoning service and conversation
//! sessions. It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Time source for quotas and timestamps
pub mod clock;

/// Key-value persistence abstraction
pub mod storage;

/// Database persistence module
pub mod db;

/// Daily usage ledger
pub mod usage_ledger;

/// Offline response and summary oracles
pub mod oracle;

/// External reasoning service and fallback orchestration
pub mod reasoning;

/// Session event bus
pub mod bus;

/// Conversation session state machine
pub mod session;

/// Session host
pub mod host;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
