// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff for manual retries.

use std::time::Duration;

/// Delay before retrying an operation that has already failed
/// `retry_count` times: `min(base * 2^retry_count, max)`.
pub fn backoff_delay(retry_count: u32, base_ms: u64, max_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}
