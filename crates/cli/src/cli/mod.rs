// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "ebb")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and drive the offline sync queue")]
#[command(
    long_about = "Inspect and drive the offline sync queue.\n\n\
    Local changes are queued durably and pushed to the remote store when online; \
    remote changes are pulled back with last-write-wins merging."
)]
pub struct Cli {
    /// Path to config.toml
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Directory holding the queue and local store
    #[arg(long, global = true, value_name = "path")]
    pub state_dir: Option<PathBuf>,

    /// Increase log verbosity (debug logs to stderr)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write the remote endpoint and identity into config.toml
    Configure {
        /// Project URL; `/rest/v1` is appended when missing
        #[arg(long, value_parser = non_empty_string)]
        url: String,

        /// API key sent in the `apikey` header
        #[arg(long, value_parser = non_empty_string)]
        api_key: String,

        /// Bearer token (defaults to the API key)
        #[arg(long)]
        access_token: Option<String>,

        /// Signed-in user that owns the synced rows
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Show aggregate sync status
    Status,

    /// List unsynced operations in queue order
    Pending {
        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Push pending operations to the remote
    Sync {
        /// Pull remote changes after pushing
        #[arg(long)]
        pull: bool,
    },

    /// Retry failed operations with exponential backoff
    Retry,

    /// Pull remote changes into the local store
    Pull,

    /// Drop operations that already reached the remote
    Purge,

    /// Reset an operation's retry count so automatic sync picks it up again
    Reset {
        /// Operation ID
        #[arg(value_parser = non_empty_string)]
        id: String,
    },

    /// Remove every queued operation, synced or not
    Clear {
        /// Confirm discarding unsynced work
        #[arg(long)]
        yes: bool,
    },
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
