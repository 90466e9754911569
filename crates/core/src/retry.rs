//! Retry policy constants and backoff computation.
//!
//! The durable queue applies this policy when a job attempt fails: while
//! attempts remain, the job is rescheduled after [`backoff_delay`]; once
//! attempts are exhausted the processor records a terminal failure.

use std::time::Duration;

/// Default number of delivery attempts before a job fails terminally.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base delay before the first redelivery.
pub const BASE_BACKOFF_SECS: u64 = 10;

/// Upper bound on a single backoff delay.
pub const MAX_BACKOFF_SECS: u64 = 300;

/// Exponential backoff for the given completed attempt number (1-based).
///
/// Attempt 1 waits `base`, attempt 2 waits `2 * base`, doubling up to
/// [`MAX_BACKOFF_SECS`]. An attempt number of 0 is treated as 1.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    let secs = base
        .as_secs()
        .saturating_mul(1u64 << exp)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}
