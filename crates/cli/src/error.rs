// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::sync::{RemoteError, SyncError};

/// All possible errors surfaced by the ebb CLI.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("remote is not configured\n  hint: run 'ebb configure' or add [remote] to {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Core(#[from] ebb_core::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state directory is locked: {0}\n  hint: another ebb process is using it")]
    Locked(String),

    #[error("refusing to clear the queue without --yes")]
    ConfirmationRequired,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
