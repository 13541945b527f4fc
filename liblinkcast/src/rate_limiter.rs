//! Per-account posting limits
//!
//! Every platform declares `posts_per_hour` and `posts_per_day`. Successful
//! posts are counted in fixed windows (floored to the hour and to the UTC
//! day) per account, and a new post is refused once either window is full.

use std::sync::Arc;

use crate::error::{Result, ValidationError};
use crate::platforms::Platform;
use crate::storage::Storage;

const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;

/// Rate limiter backed by the `rate_limits` table
#[derive(Clone)]
pub struct RateLimiter {
    storage: Arc<dyn Storage>,
}

impl RateLimiter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Refuse with `RateLimited` when either window for the account is full
    pub async fn check(&self, account_id: &str, platform: Platform, now: i64) -> Result<()> {
        let limits = platform.config().limits;

        for (window_secs, label, limit) in [
            (HOUR, "hour", limits.posts_per_hour),
            (DAY, "day", limits.posts_per_day),
        ] {
            let count = self
                .storage
                .window_count(account_id, window_secs, window_start(now, window_secs))
                .await?;

            if count >= limit {
                tracing::debug!(
                    "Account {} reached {} posts this {} on {}",
                    account_id,
                    count,
                    label,
                    platform
                );
                return Err(ValidationError::RateLimited {
                    platform: platform.to_string(),
                    limit,
                    window: label.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Count a successful post against both windows
    pub async fn record(&self, account_id: &str, now: i64) -> Result<()> {
        for window_secs in [HOUR, DAY] {
            self.storage
                .increment_window(account_id, window_secs, window_start(now, window_secs))
                .await?;
        }
        Ok(())
    }

    /// Drop windows that started before `cutoff`
    ///
    /// Anything older than the current day can no longer affect a check.
    pub async fn cleanup_old_windows(&self, cutoff: i64) -> Result<u64> {
        self.storage.delete_windows_before(cutoff).await
    }

    /// Cutoff that keeps every window still relevant at `now`
    pub fn retention_cutoff(now: i64) -> i64 {
        window_start(now, DAY)
    }
}

/// Floor a timestamp to the start of its window
fn window_start(timestamp: i64, window_secs: i64) -> i64 {
    timestamp.div_euclid(window_secs) * window_secs
}
