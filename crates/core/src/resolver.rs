// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Last-write-wins conflict resolution keyed by server time.
//!
//! Rules:
//! - Create: always applies (first write wins, nothing to conflict with)
//! - Update: discarded when the server has a strictly newer state than the
//!   local mutation, otherwise applied
//! - Delete: always applies; a missing remote row is an idempotent success
//!
//! Comparing client enqueue time against server wall-clock time is only as
//! good as the skew between the two clocks. Good enough for one user across a
//! few devices, not for concurrent writers.

use serde::{Deserialize, Serialize};

use crate::op::{OpKind, OperationRecord};

/// Server-side correlation record for one `(table, local_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Client-reported time of the last successful push (ms since epoch).
    pub last_synced_at: u64,
    /// Server-assigned time of the last remote change (ms since epoch).
    pub server_updated_at: u64,
}

/// Outcome of conflict resolution for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Write the local change to the server.
    Apply,
    /// The server already holds newer state; drop the local change.
    Discard,
}

/// Decides whether a pending operation should reach the server.
pub fn resolve(op: &OperationRecord, remote: Option<&SyncMetadata>) -> Resolution {
    match op.kind {
        OpKind::Create | OpKind::Delete => Resolution::Apply,
        OpKind::Update => match remote {
            Some(meta) if meta.server_updated_at > op.created_at => Resolution::Discard,
            _ => Resolution::Apply,
        },
    }
}

/// Pull-side rule: should a remote row replace the local copy?
///
/// Remote wins only when strictly newer, or when there is no local copy.
pub fn remote_wins(local_updated_at: Option<u64>, remote_updated_at: u64) -> bool {
    match local_updated_at {
        Some(local) => remote_updated_at > local,
        None => true,
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
