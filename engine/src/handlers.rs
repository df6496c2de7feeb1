//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - chat: interactive conversation
//! - ask: one offline answer
//! - usage: today's chat allowance
//! - saved: saved conversations

use anyhow::{Context, Result};
use sdk::{AdvisorError, HavenErrorExt, Message, SessionRecord, UserProfile};
use serde_json::json;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::bus::{EndReason, Event, EventType};
use crate::config::Config;
use crate::host::SessionHost;
use crate::oracle::{ResponseOracle, QUICK_PROMPTS};
use crate::session::ConversationSession;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Load a profile file, then apply a name override
pub async fn load_profile(path: Option<&Path>, name: Option<String>) -> Result<UserProfile> {
    let mut profile = match path {
        Some(path) => {
            let contents = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read profile {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse profile {}", path.display()))?
        }
        None => UserProfile::default(),
    };

    if let Some(name) = name {
        profile.name = name;
    }
    Ok(profile)
}

fn print_message(message: &Message, remaining: usize, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!();
            println!("Advisor: {}", message.content);
            println!("  ({} messages left)", remaining);
        }
        OutputFormat::Json => {
            let output = json!({
                "message": message,
                "messagesRemaining": remaining,
            });
            println!("{}", serde_json::to_string(&output)?);
        }
    }
    Ok(())
}

fn print_record(record: &SessionRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", record.summary);
            println!();
            println!("Saved as {}", record.session_id);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(record)?),
    }
    Ok(())
}

fn print_rejection(error: &AdvisorError, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", error.user_hint()),
        OutputFormat::Json => {
            let output = json!({
                "error": error.to_string(),
                "hint": error.user_hint(),
                "recoverable": error.is_recoverable(),
            });
            println!("{}", serde_json::to_string(&output)?);
        }
    }
    Ok(())
}

async fn open_session(
    host: &SessionHost,
    fresh: bool,
    format: OutputFormat,
) -> Result<Option<ConversationSession>> {
    let started = if fresh {
        host.start_fresh_session().await
    } else {
        host.start_session().await
    };

    match started {
        Ok(session) => {
            if let Some(greeting) = session.messages().first() {
                print_message(greeting, session.messages_remaining(), format)?;
            }
            if matches!(format, OutputFormat::Text) && !fresh {
                println!();
                println!("Try one of:");
                for prompt in QUICK_PROMPTS {
                    println!("  {}", prompt);
                }
            }
            Ok(Some(session))
        }
        Err(e @ AdvisorError::DailyLimitReached { .. }) => {
            print_rejection(&e, format)?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Send one line and wait for the reply, cancelling on Ctrl-C
async fn exchange(session: &mut ConversationSession, line: &str) -> Result<Message, AdvisorError> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = session.submit_message(line, &cancel).await;
    watcher.abort();
    result
}

/// Whether the chat loop keeps reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Host plus the conversation currently on screen
struct ChatShell {
    host: SessionHost,
    session: Option<ConversationSession>,
    format: OutputFormat,
}

impl ChatShell {
    async fn open(host: SessionHost, format: OutputFormat) -> Result<Self> {
        let session = open_session(&host, false, format).await?;
        Ok(Self {
            host,
            session,
            format,
        })
    }

    /// Handle one input line
    ///
    /// Lines starting with `/` are commands: `/end`, `/save`, `/new`, `/quit`.
    async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let format = self.format;

        match line.trim() {
            "/quit" => return Ok(Flow::Quit),
            "/new" => {
                // At the daily limit the current chat stays on screen
                if let Some(fresh) = open_session(&self.host, true, format).await? {
                    self.session = Some(fresh);
                }
            }
            "/end" => {
                if let Some(current) = self.session.as_mut() {
                    match current.end_session().await {
                        Ok(()) => {
                            if matches!(format, OutputFormat::Text) {
                                println!("Conversation ended. /save it or start a /new one.");
                            }
                        }
                        Err(e) => print_rejection(&e, format)?,
                    }
                }
            }
            "/save" => {
                if let Some(current) = self.session.as_ref() {
                    match self.host.save_session(current).await {
                        Ok(record) => print_record(&record, format)?,
                        Err(e) => print_rejection(&e, format)?,
                    }
                }
            }
            text => {
                let Some(current) = self.session.as_mut() else {
                    let remaining = self.host.chats_remaining_today().await;
                    if matches!(format, OutputFormat::Text) {
                        println!("No active conversation ({} chats left today)", remaining);
                    }
                    return Ok(Flow::Continue);
                };

                match exchange(current, text).await {
                    Ok(reply) => print_message(&reply, current.messages_remaining(), format)?,
                    Err(e) => print_rejection(&e, format)?,
                }
            }
        }

        Ok(Flow::Continue)
    }

    async fn close(self) -> Result<()> {
        self.host.close().await
    }
}

/// Interactive conversation over stdin
pub async fn handle_chat(
    config: &Config,
    profile: UserProfile,
    format: OutputFormat,
) -> Result<()> {
    let host = SessionHost::open(config).await?.with_profile(profile);

    // Render lifecycle events the session reports on its own
    let mut events = host.bus().subscribe(EventType::All).await;
    let renderer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                Event::AdvisorTyping { .. } => {
                    if matches!(format, OutputFormat::Text) {
                        eprintln!("Advisor is typing...");
                    }
                }
                Event::SessionEnded {
                    reason: EndReason::QuotaExhausted,
                    ..
                } => {
                    if matches!(format, OutputFormat::Text) {
                        eprintln!("This conversation is full. /save it or start a /new one.");
                    }
                }
                other => tracing::debug!("Event: {:?}", other.event_type()),
            }
        }
    });

    let mut shell = ChatShell::open(host, format).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if shell.handle_line(&line).await? == Flow::Quit {
            break;
        }
    }

    renderer.abort();
    shell.close().await
}

/// Answer one question with the offline oracle
///
/// Does not start a session or count against the daily allowance.
pub async fn handle_ask(text: String, profile: UserProfile, format: OutputFormat) -> Result<()> {
    let oracle = ResponseOracle::new();
    let reply = oracle.respond(&text, &profile);

    match format {
        OutputFormat::Text => println!("{}", reply),
        OutputFormat::Json => {
            let output = json!({
                "question": text,
                "rule": oracle.route(&text).map(|rule| rule.name),
                "reply": reply,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Show today's usage
pub async fn handle_usage(config: &Config, format: OutputFormat) -> Result<()> {
    let host = SessionHost::open(config).await?;
    let usage = host.usage_today().await;
    let remaining = host.chats_remaining_today().await;
    let limit = host.limits().max_chats_per_day;

    match format {
        OutputFormat::Text => {
            println!("Date: {}", usage.date);
            println!(
                "Chats started: {}/{}",
                usage.sessions_started_today, limit
            );
            println!("Chats remaining: {}", remaining);
        }
        OutputFormat::Json => {
            let output = json!({
                "usage": usage,
                "limit": limit,
                "remaining": remaining,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    host.close().await
}

/// List saved conversations, newest first
pub async fn handle_saved(limit: usize, config: &Config, format: OutputFormat) -> Result<()> {
    let host = SessionHost::open(config).await?;
    let records = host.saved_sessions(limit).await?;

    match format {
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No saved conversations");
            } else {
                println!("Saved conversations (last {}):", limit);
                println!();

                for record in &records {
                    println!("Session: {}", record.session_id);
                    println!(
                        "  Saved: {}",
                        record
                            .saved_at
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M:%S")
                    );
                    println!("  Messages: {}", record.messages.len());
                    println!(
                        "  Topic: {}",
                        crate::oracle::SummaryOracle::main_topic(&record.messages)
                    );
                    println!();
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "sessions": records,
                "count": records.len(),
                "limit": limit
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    host.close().await
}
