// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local queue maintenance: purge, reset, clear.

use std::io::Write;

use ebb_core::OperationId;

use crate::error::{Error, Result};

use super::Context;

/// Drop operations that already reached the remote.
pub fn purge<W: Write>(ctx: &Context, out: &mut W) -> Result<()> {
    let mut queue = ctx.open_queue()?;
    let purged = queue.purge_synced()?;
    writeln!(out, "Purged {} synced operation(s)", purged)?;
    Ok(())
}

/// Reset an operation's retry count and error.
pub fn reset<W: Write>(ctx: &Context, id: &str, out: &mut W) -> Result<()> {
    let mut queue = ctx.open_queue()?;
    let id = OperationId::from(id.trim());
    queue.mark_fresh(&id)?;
    writeln!(out, "Reset {}", id)?;
    Ok(())
}

/// Remove every queued operation.
pub fn clear<W: Write>(ctx: &Context, yes: bool, out: &mut W) -> Result<()> {
    if !yes {
        return Err(Error::ConfirmationRequired);
    }
    let mut queue = ctx.open_queue()?;
    let total = queue.len();
    let unsynced = queue.unsynced_count();
    queue.clear()?;
    if unsynced > 0 {
        tracing::warn!(unsynced, "cleared queue with unsynced operations");
    }
    writeln!(out, "Cleared {} operation(s) ({} unsynced)", total, unsynced)?;
    Ok(())
}
