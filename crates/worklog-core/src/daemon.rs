//! Helpers for scheduled runs: single-run exclusivity and retry spacing.
//! The timer itself lives with the async runtime in the CLI.

use crate::lockfile::LockFile;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

const MAX_DELAY_SECS: u64 = 3600;

#[derive(Debug, PartialEq, Eq)]
pub enum LockedRun<T> {
    Ran(T),
    Skipped,
}

/// Runs `job` while holding the lock at `lock_path`. Skips when another run
/// holds it.
pub async fn run_once_with_lock<F, Fut, T>(lock_path: &Path, job: F) -> anyhow::Result<LockedRun<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    match LockFile::try_acquire(lock_path)? {
        Some(_lock) => Ok(LockedRun::Ran(job().await)),
        None => {
            warn!(path = %lock_path.display(), "another sync run holds the lock; skipping run");
            Ok(LockedRun::Skipped)
        }
    }
}

/// Delay before the next scheduled run. Consecutive failed runs back off
/// exponentially from the interval, capped at one hour.
pub fn daemon_backoff_delay(interval: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return interval;
    }
    let base = interval.as_secs().max(1);
    let exp = failures.saturating_sub(1).min(5);
    let delay = base.saturating_mul(2u64.saturating_pow(exp));
    Duration::from_secs(delay.min(MAX_DELAY_SECS.max(base)))
}

/// Tracks consecutive failed runs of the daemon loop.
#[derive(Debug, Clone)]
pub struct DaemonSchedule {
    interval: Duration,
    failures: u32,
}

impl DaemonSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            failures: 0,
        }
    }

    pub fn record_success(&mut self) -> Duration {
        self.failures = 0;
        self.interval
    }

    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        daemon_backoff_delay(self.interval, self.failures)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
