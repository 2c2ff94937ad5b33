// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only queue inspection commands.

use std::io::Write;

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::sync::SyncSnapshot;

use super::{format_time, Context};

/// Show aggregate sync status.
///
/// The CLI has no connectivity signal of its own, so it reports as online.
pub fn status<W: Write>(ctx: &Context, out: &mut W) -> Result<()> {
    let queue = ctx.open_queue()?;
    let max_retries = ctx.config.sync.max_retries;
    let snapshot = SyncSnapshot::capture(&queue, max_retries, queue.is_syncing(), true);

    writeln!(out, "Status: {}", snapshot.status)?;
    writeln!(out, "Pending ops: {}", snapshot.pending)?;
    if snapshot.exhausted > 0 {
        writeln!(
            out,
            "Exhausted ops: {} (run 'ebb retry' or 'ebb reset <id>')",
            snapshot.exhausted
        )?;
    }
    match snapshot.last_sync_time {
        Some(ms) => writeln!(out, "Last sync: {}", format_time(ms))?,
        None => writeln!(out, "Last sync: never")?,
    }
    if let Some(error) = &snapshot.last_error {
        writeln!(out, "Last error: {}", error)?;
    }
    if ctx.config.remote.is_none() {
        writeln!(out, "Remote: not configured")?;
    }
    Ok(())
}

/// List unsynced operations in queue order.
pub fn pending<W: Write>(ctx: &Context, output: OutputFormat, out: &mut W) -> Result<()> {
    let queue = ctx.open_queue()?;
    let pending = queue.pending();

    match output {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &pending)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            if pending.is_empty() {
                writeln!(out, "No pending operations")?;
                return Ok(());
            }
            for op in &pending {
                write!(
                    out,
                    "{}  {:<6}  {:<19}  {}  created {}  retries {}",
                    op.id,
                    op.kind.as_str(),
                    op.table.as_str(),
                    op.local_id,
                    format_time(op.created_at),
                    op.retry_count
                )?;
                match &op.last_error {
                    Some(error) => writeln!(out, "  ({})", error)?,
                    None => writeln!(out)?,
                }
            }
        }
    }
    Ok(())
}
