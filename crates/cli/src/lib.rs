// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ebb - offline-first sync for local records.
//!
//! Local mutations are recorded in a durable FIFO queue (see [`ebb_core`])
//! and pushed to a remote record store when connectivity allows. This crate
//! provides the push/pull machinery and the `ebb` operator CLI.
//!
//! # Main Components
//!
//! - [`sync::SyncManager`] - drains the queue, resolves conflicts, retries
//! - [`sync::RemoteBackend`] - remote store abstraction, with [`sync::RestBackend`]
//! - [`sync::run_trigger`] - runs passes on connectivity and enqueue signals
//! - [`Config`] - TOML configuration
//! - [`Error`] - CLI-level errors
//!
//! # Embedding
//!
//! ```rust,ignore
//! use ebb::sync::{shared, run_trigger, StaticIdentity, SyncConfig, SyncManager};
//!
//! let queue = shared(SyncQueue::open_file(&path)?);
//! let manager = SyncManager::new(SyncConfig::default(), queue, backend, identity);
//! let (online_tx, online_rx) = tokio::sync::watch::channel(true);
//! run_trigger(&manager, online_rx).await;
//! ```

mod cli;
mod commands;

pub mod config;
pub mod error;
pub mod sync;

pub use cli::{Cli, Command, OutputFormat};
pub use config::{Config, RemoteConfig};
pub use error::{Error, Result};

use std::io::Write;

use commands::Context;

/// Execute a CLI invocation, writing command output to `out`. This is the
/// main entry point for library users and provides a testable way to run
/// commands without process execution.
pub async fn run<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    let ctx = Context::open(cli.config.as_deref(), cli.state_dir.as_deref())?;

    match cli.command {
        Command::Configure { url, api_key, access_token, user_id } => {
            let remote = RemoteConfig {
                url,
                api_key,
                access_token,
                user_id,
            };
            commands::configure::configure(&ctx, remote, out)
        }
        Command::Status => commands::status::status(&ctx, out),
        Command::Pending { output } => commands::status::pending(&ctx, output, out),
        Command::Sync { pull } => commands::sync::sync(&ctx, pull, out).await,
        Command::Retry => commands::sync::retry(&ctx, out).await,
        Command::Pull => commands::sync::pull(&ctx, out).await,
        Command::Purge => commands::maintenance::purge(&ctx, out),
        Command::Reset { id } => commands::maintenance::reset(&ctx, &id, out),
        Command::Clear { yes } => commands::maintenance::clear(&ctx, yes, out),
    }
}
