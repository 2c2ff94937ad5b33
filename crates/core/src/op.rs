// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operation records: the durable unit of pending work.
//!
//! Every local mutation raises exactly one [`OperationRecord`]. Records are
//! never coalesced; three edits to one task produce three records, drained in
//! the order they were enqueued.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Record body sent to the remote store: field name to value.
///
/// Opaque to the sync layer; no shape validation happens on enqueue.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Unique identifier for an operation record.
///
/// Format: `{created_at_ms}-{random}`. Assigned once at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Generates a fresh id for an operation enqueued at `now_ms`.
    pub fn generate(now_ms: u64) -> Self {
        let mut suffix = Uuid::new_v4().simple().to_string();
        suffix.truncate(9);
        OperationId(format!("{now_ms}-{suffix}"))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        OperationId(s.to_string())
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        OperationId(s)
    }
}

/// The kind of mutation an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create" => Ok(OpKind::Create),
            "update" => Ok(OpKind::Update),
            "delete" => Ok(OpKind::Delete),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

/// Remote collections the sync layer writes to.
///
/// Closed set: supporting a new collection means adding a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tasks,
    SleepRecords,
    Distractions,
    AuditSessions,
    CoachConversations,
}

impl Table {
    /// Every table, in a stable order (used by the pull path).
    pub const ALL: [Table; 5] = [
        Table::Tasks,
        Table::SleepRecords,
        Table::Distractions,
        Table::AuditSessions,
        Table::CoachConversations,
    ];

    /// Returns the remote table name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Tasks => "tasks",
            Table::SleepRecords => "sleep_records",
            Table::Distractions => "distractions",
            Table::AuditSessions => "audit_sessions",
            Table::CoachConversations => "coach_conversations",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Table::ALL
            .into_iter()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| Error::InvalidTable(s.to_string()))
    }
}

/// One intended mutation against one remote table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    /// Assigned at enqueue time, never reused.
    pub id: OperationId,
    pub kind: OpKind,
    pub table: Table,
    /// Record body for Create/Update; empty for Delete.
    #[serde(default)]
    pub payload: Payload,
    /// Identifier the local store assigned to the affected record. Correlates
    /// with the remote `local_id` column.
    pub local_id: String,
    /// Enqueue time in ms since epoch. Doubles as the mutation's logical time
    /// for conflict resolution.
    pub created_at: u64,
    /// Failed sync attempts so far.
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Terminal flag: eligible for purge, never re-sent.
    #[serde(default)]
    pub synced: bool,
}

impl OperationRecord {
    /// Creates a fresh, unsynced record.
    pub fn new(
        kind: OpKind,
        table: Table,
        payload: Payload,
        local_id: String,
        now_ms: u64,
    ) -> Self {
        let payload = match kind {
            OpKind::Delete => Payload::new(),
            OpKind::Create | OpKind::Update => payload,
        };
        OperationRecord {
            id: OperationId::generate(now_ms),
            kind,
            table,
            payload,
            local_id,
            created_at: now_ms,
            retry_count: 0,
            last_error: None,
            synced: false,
        }
    }

    /// Returns true if the record still has to reach the server.
    pub fn is_pending(&self) -> bool {
        !self.synced
    }

    /// Returns true if the record hit the retry ceiling and is parked until a
    /// manual retry.
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        !self.synced && self.retry_count >= max_retries
    }

    /// Applies a partial update.
    pub fn apply(&mut self, patch: &OperationPatch) {
        if let Some(retry_count) = patch.retry_count {
            self.retry_count = retry_count;
        }
        if let Some(last_error) = &patch.last_error {
            self.last_error = last_error.clone();
        }
    }
}

/// Partial field update for [`OperationRecord`].
///
/// `None` leaves a field untouched. `last_error: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationPatch {
    pub retry_count: Option<u32>,
    pub last_error: Option<Option<String>>,
}

impl OperationPatch {
    /// Patch recording a failed attempt.
    pub fn failure(retry_count: u32, error: impl Into<String>) -> Self {
        OperationPatch {
            retry_count: Some(retry_count),
            last_error: Some(Some(error.into())),
        }
    }

    /// Patch resetting a record to a fresh state (manual retry path).
    pub fn fresh() -> Self {
        OperationPatch {
            retry_count: Some(0),
            last_error: Some(None),
        }
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
