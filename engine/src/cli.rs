//! CLI interface for Moustachar
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Moustachar — assistant juridique
///
/// A grounded question-answering assistant over Moroccan labor law. Answers
/// are composed strictly from a legal knowledge graph, a semantic passage
/// index, and web search; anything unsupported is refused.
#[derive(Parser, Debug)]
#[command(name = "moustachar")]
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
    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// Session to continue (a fresh session is created when omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Start an interactive chat session
    Chat {
        /// Session to continue (a fresh session is created when omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Show the stored turns of a session
    History {
        /// Session id
        session_id: String,

        /// Number of turns to show (default: all)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create the default configuration file if missing
    Init,

    /// Print the active configuration
    Show,

    /// Print the configuration file path
    Path,
}
