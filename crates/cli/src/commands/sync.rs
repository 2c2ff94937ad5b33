// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Commands that talk to the remote.

use std::io::Write;

use crate::error::Result;
use crate::sync::{IdentityProvider, PullReport, RemoteBackend, SyncManager, SyncOutcome};

use super::Context;

/// Push pending operations, optionally pulling afterwards.
pub async fn sync<W: Write>(ctx: &Context, pull: bool, out: &mut W) -> Result<()> {
    let manager = ctx.manager()?;
    let outcome = manager.sync_all().await?;
    report_outcome(&manager, "Sync", outcome, out)?;

    if pull {
        let mut store = ctx.open_local_store()?;
        let report = manager.pull_remote_changes(&mut store).await;
        report_pull(&report, out)?;
    }
    Ok(())
}

/// Retry failed operations with backoff.
pub async fn retry<W: Write>(ctx: &Context, out: &mut W) -> Result<()> {
    let manager = ctx.manager()?;
    let outcome = manager.retry_failed().await?;
    report_outcome(&manager, "Retry", outcome, out)
}

/// Pull remote changes into the local store.
pub async fn pull<W: Write>(ctx: &Context, out: &mut W) -> Result<()> {
    let manager = ctx.manager()?;
    let mut store = ctx.open_local_store()?;
    let report = manager.pull_remote_changes(&mut store).await;
    report_pull(&report, out)
}

fn report_outcome<R, I, W>(
    manager: &SyncManager<R, I>,
    label: &str,
    outcome: SyncOutcome,
    out: &mut W,
) -> Result<()>
where
    R: RemoteBackend,
    I: IdentityProvider,
    W: Write,
{
    let report = match outcome {
        SyncOutcome::Completed(report) => report,
        SyncOutcome::AlreadyRunning => {
            writeln!(out, "{label} skipped: a pass is already running")?;
            return Ok(());
        }
    };

    writeln!(out, "{label}: {report}")?;
    let snapshot = manager.snapshot();
    writeln!(out, "Status: {}", snapshot.status)?;
    if let Some(error) = snapshot.last_error {
        writeln!(out, "Last error: {error}")?;
    }
    Ok(())
}

fn report_pull<W: Write>(report: &PullReport, out: &mut W) -> Result<()> {
    writeln!(out, "Pull: {} applied, {} skipped", report.applied, report.skipped)?;
    if !report.failed_tables.is_empty() {
        let tables: Vec<&str> = report.failed_tables.iter().map(|t| t.as_str()).collect();
        writeln!(out, "Pull failed for: {}", tables.join(", "))?;
    }
    Ok(())
}
