//! Command-line argument parsing for guardhouse
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// guardhouse - sandboxed tool execution for a remote reasoning engine
#[derive(Parser, Debug)]
#[command(name = "guardhouse")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Confinement root (overrides sandbox.root)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Verbosity level: -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress everything except the result)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Send one message through the agent loop
    Chat {
        /// Message text
        #[arg(value_name = "MESSAGE")]
        message: String,

        /// Conversation owner
        #[arg(short, long, default_value = "default")]
        user: String,

        /// Keep history in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// List the tools offered to the engine
    Tools {
        /// Print the raw manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one tool directly through the executor
    Exec {
        /// Tool name
        #[arg(value_name = "TOOL")]
        tool: String,

        /// Arguments as a JSON object
        #[arg(value_name = "ARGS_JSON", default_value = "{}")]
        args: String,
    },

    /// Show the path guard decision for a path
    CheckPath {
        #[arg(value_name = "PATH")]
        path: String,

        /// Check write intent instead of read
        #[arg(long)]
        write: bool,
    },

    /// Show the command guard decision for a command
    CheckCommand {
        #[arg(value_name = "COMMAND")]
        command: String,
    },

    /// Show or clear stored conversation history
    History {
        #[arg(short, long, default_value = "default")]
        user: String,

        /// Number of most recent turns to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Delete the user's history
        #[arg(long)]
        clear: bool,
    },

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Log filter implied by the flags, if they override the configured one
    pub fn log_filter(&self) -> Option<&'static str> {
        match self {
            Verbosity::Quiet => Some("error"),
            Verbosity::Normal => None,
            Verbosity::Verbose => Some("debug"),
            Verbosity::VeryVerbose => Some("trace"),
        }
    }

    /// Check if should show telemetry summary
    pub fn show_events(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}
