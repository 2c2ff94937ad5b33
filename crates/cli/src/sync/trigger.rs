// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity-driven sync trigger.
//!
//! Glue between the host's reachability signal and the manager: a pass runs
//! when the device comes back online, and when work is enqueued while online.

use tokio::sync::watch;

use super::identity::IdentityProvider;
use super::manager::{SyncManager, SyncOutcome};
use super::remote::RemoteBackend;

/// Drives sync passes from connectivity changes and enqueue signals.
///
/// The initial value of `connectivity` counts as a transition, so startup
/// while online drains leftover work. Runs until the sender is dropped and
/// returns how many passes it completed.
pub async fn run_trigger<R, I>(
    manager: &SyncManager<R, I>,
    mut connectivity: watch::Receiver<bool>,
) -> usize
where
    R: RemoteBackend,
    I: IdentityProvider,
{
    let mut passes = 0;
    let online = *connectivity.borrow_and_update();
    manager.set_online(online);
    if online {
        passes += sync_if_pending(manager).await;
    }

    loop {
        tokio::select! {
            changed = connectivity.changed() => {
                if changed.is_err() {
                    tracing::debug!("connectivity source closed, stopping trigger");
                    break;
                }
                let online = *connectivity.borrow_and_update();
                let was_online = manager.is_online();
                manager.set_online(online);
                match (was_online, online) {
                    (false, true) => {
                        tracing::info!("connectivity restored");
                        passes += sync_if_pending(manager).await;
                    }
                    (true, false) => tracing::info!("connectivity lost"),
                    _ => {}
                }
            }
            _ = manager.enqueued() => {
                if manager.is_online() {
                    passes += sync_if_pending(manager).await;
                }
            }
        }
    }
    passes
}

/// Runs one pass if anything is eligible for it. Returns 1 if a pass ran.
async fn sync_if_pending<R, I>(manager: &SyncManager<R, I>) -> usize
where
    R: RemoteBackend,
    I: IdentityProvider,
{
    let max_retries = manager.config().max_retries;
    let eligible = {
        let queue = manager.queue().lock().unwrap_or_else(|e| e.into_inner());
        queue.pending().iter().any(|op| !op.is_exhausted(max_retries))
    };
    if !eligible {
        return 0;
    }

    match manager.sync_all().await {
        Ok(SyncOutcome::Completed(report)) => {
            tracing::debug!("triggered pass: {}", report);
            1
        }
        Ok(SyncOutcome::AlreadyRunning) => 0,
        Err(e) => {
            tracing::error!("triggered pass failed: {}", e);
            0
        }
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
