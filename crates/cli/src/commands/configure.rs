// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use crate::config::RemoteConfig;
use crate::error::Result;
use crate::sync::normalize_rest_url;

use super::Context;

/// Store `remote` as the `[remote]` section, keeping the rest of the config.
pub fn configure<W: Write>(ctx: &Context, remote: RemoteConfig, out: &mut W) -> Result<()> {
    let rest_url = normalize_rest_url(&remote.url)?;
    if remote.user_id.is_none() {
        tracing::warn!("no user id configured; sync will fail until one is set");
    }

    let mut config = ctx.config.clone();
    config.remote = Some(remote);
    config.save(&ctx.config_path)?;

    writeln!(out, "Remote: {}", rest_url)?;
    writeln!(out, "Config written to {}", ctx.config_path.display())?;
    Ok(())
}
