//! Exponential backoff with jitter for retried transfers.

use std::time::Duration;

use rand::Rng;

/// Base delay for the first retry (500 ms).
const BASE_DELAY_MS: u64 = 500;

/// Cap on the doubling exponent. 2^10 * 500ms = 512s.
const MAX_EXPONENT: u32 = 10;

/// Returns how long to sleep before retry number `cur_retry` (1-indexed).
///
/// The deterministic part doubles each retry up to the exponent cap; jitter
/// adds a uniform random amount in `[0, base/10)` so simultaneous failures
/// don't retry in lockstep. For retry `k` the result `s` satisfies
/// `500 * 2^min(k, 10) <= s < 1.1 * 500 * 2^min(k, 10)` milliseconds.
#[must_use]
pub fn backoff(cur_retry: u32) -> Duration {
    let exponent = cur_retry.min(MAX_EXPONENT);
    let base_ms = BASE_DELAY_MS << exponent;
    let jitter_ms = rand::thread_rng().gen_range(0..base_ms / 10);
    Duration::from_millis(base_ms + jitter_ms)
}
