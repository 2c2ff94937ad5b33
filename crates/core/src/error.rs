// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for ebb-core operations.

use thiserror::Error;

/// All possible errors that can occur in ebb-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("operation not found: {0}")]
    OperationNotFound(String),

    #[error("invalid table: '{0}'\n  hint: valid tables are: tasks, sleep_records, distractions, audit_sessions, coach_conversations")]
    InvalidTable(String),

    #[error("invalid operation kind: '{0}'\n  hint: valid kinds are: create, update, delete")]
    InvalidKind(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for ebb-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
