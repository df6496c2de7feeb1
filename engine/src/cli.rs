//! CLI interface for Haven
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for the advisor chat shell.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Haven financial advisor
///
/// Chat with a day-to-day money advisor from the terminal. Conversations
/// are limited per session and per day; saved chats keep a short summary.
#[derive(Parser, Debug)]
#[command(name = "haven")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive conversation
    Chat {
        /// Name to greet you with (overrides the profile)
        #[arg(long)]
        name: Option<String>,

        /// JSON file with your onboarding profile
        #[arg(long, value_name = "PATH")]
        profile: Option<PathBuf>,
    },

    /// Get a single offline answer without starting a session
    Ask {
        /// The question to ask
        text: String,

        /// JSON file with your onboarding profile
        #[arg(long, value_name = "PATH")]
        profile: Option<PathBuf>,
    },

    /// Show how many chats are left today
    Usage,

    /// List saved conversations
    Saved {
        /// Number of conversations to show (default: 10)
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}
