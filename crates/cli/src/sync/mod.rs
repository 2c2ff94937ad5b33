// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Push/pull synchronization with the remote record store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  enqueue  ┌─────────────┐  dispatch  ┌─────────────┐
//! │  Producers  │──────────►│  SyncQueue  │───────────►│   Remote    │
//! │(LocalWriter)│           │  (durable)  │◄───────────│  (backend)  │
//! └─────────────┘           └─────────────┘   pull     └─────────────┘
//!                                  ▲
//!                                  │ sync_all / retry_failed
//!                           ┌─────────────┐
//!                           │ SyncManager │◄── connectivity trigger
//!                           └─────────────┘
//! ```
//!
//! # Features
//!
//! - FIFO drain with at most one pass in flight
//! - Last-write-wins conflict resolution by server modification time
//! - Per-operation retry ceiling, manual retry with exponential backoff
//! - Per-call timeout so a hung request cannot wedge a pass
//! - Injectable backend trait for testing

mod backoff;
mod identity;
mod manager;
mod pull;
mod remote;
mod rest;
mod trigger;

pub use backoff::backoff_delay;
pub use identity::{IdentityProvider, SharedIdentity, StaticIdentity};
pub use manager::{
    derive_status, shared, SharedQueue, SyncConfig, SyncError, SyncManager, SyncOutcome, SyncReport,
    SyncResult, SyncSnapshot, SyncStatus,
};
pub use pull::PullReport;
pub use remote::{
    row_timestamp_ms, Filter, RemoteBackend, RemoteError, RemoteFuture, RemoteResult, Row,
    LOCAL_ID_COLUMN, UPDATED_AT_COLUMN, USER_ID_COLUMN,
};
pub use rest::{normalize_rest_url, RestBackend};
pub use trigger::run_trigger;

#[cfg(test)]
mod test_helpers;
