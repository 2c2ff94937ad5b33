// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Producer side of the queue: local mutations that raise operations.
//!
//! Each call writes the local store first and then enqueues exactly one
//! operation record, so the UI sees the change immediately and the queue
//! carries it to the server later.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::local::{LocalRecord, LocalStore};
use crate::op::{OpKind, OperationRecord, Payload, Table};
use crate::queue::SyncQueue;

/// Generates a fresh locally-unique record id.
pub fn new_local_id() -> String {
    Uuid::new_v4().to_string()
}

/// Applies mutations to a local store and queues them for sync.
pub struct LocalWriter<'a, S: LocalStore> {
    store: &'a mut S,
    queue: &'a mut SyncQueue,
}

impl<'a, S: LocalStore> LocalWriter<'a, S> {
    pub fn new(store: &'a mut S, queue: &'a mut SyncQueue) -> Self {
        LocalWriter { store, queue }
    }

    /// Creates a new local record and queues a Create.
    pub fn create(
        &mut self,
        table: Table,
        body: Payload,
    ) -> Result<(LocalRecord, OperationRecord)> {
        let record = LocalRecord {
            local_id: new_local_id(),
            body,
            updated_at: self.queue.clock().now_ms(),
        };
        self.store.upsert(table, &record)?;
        let op = self.queue.enqueue(OpKind::Create, table, record.body.clone(), &record.local_id)?;
        Ok((record, op))
    }

    /// Replaces an existing record's body and queues an Update.
    pub fn update(
        &mut self,
        table: Table,
        local_id: &str,
        body: Payload,
    ) -> Result<(LocalRecord, OperationRecord)> {
        if self.store.get(table, local_id)?.is_none() {
            return Err(Error::InvalidInput(format!("no local {table} record '{local_id}'")));
        }
        let record = LocalRecord {
            local_id: local_id.to_string(),
            body,
            updated_at: self.queue.clock().now_ms(),
        };
        self.store.upsert(table, &record)?;
        let op = self.queue.enqueue(OpKind::Update, table, record.body.clone(), local_id)?;
        Ok((record, op))
    }

    /// Removes a local record and queues a Delete.
    ///
    /// A Delete is queued even if the record is already gone locally, so the
    /// remote copy is still removed.
    pub fn delete(&mut self, table: Table, local_id: &str) -> Result<OperationRecord> {
        self.store.remove(table, local_id)?;
        self.queue.enqueue(OpKind::Delete, table, Payload::new(), local_id)
    }
}

#[cfg(test)]
#[path = "producer_tests.rs"]
mod tests;
