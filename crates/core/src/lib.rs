// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ebb-core: Shared library for the ebb offline sync layer
//!
//! This crate provides the durable operation queue, the conflict resolver,
//! and the local-store primitives that the sync manager drives.

pub mod clock;
pub mod error;
pub mod local;
pub mod op;
pub mod producer;
pub mod queue;
pub mod resolver;
pub mod store;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use local::{LocalRecord, LocalStore, SqliteLocalStore};
pub use op::{OpKind, OperationId, OperationPatch, OperationRecord, Payload, Table};
pub use producer::LocalWriter;
pub use queue::{QueueState, SyncQueue};
pub use resolver::{remote_wins, resolve, Resolution, SyncMetadata};
pub use store::{FileStore, MemoryStore, QueueStore};
