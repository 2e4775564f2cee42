//! Command-line interface for todobot.
//!
//! This module provides the CLI structure for the `todobot` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, ListCommand, ParseCommand, ServeCommand};

/// todobot - A to-do list you keep by chatting
///
/// Runs the chat-bot webhook and web dashboard, sends reminder digests, and
/// inspects stored tasks and configuration.
#[derive(Debug, Parser)]
#[command(name = "todobot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the webhook and dashboard server
    Serve(ServeCommand),

    /// Send every user their reminder digest now
    Remind,

    /// List a user's tasks
    List(ListCommand),

    /// Show how a chat message would be parsed
    Parse(ParseCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }
}
