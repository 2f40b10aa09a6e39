//! Retry with exponential backoff for filesystem calls, and the
//! process-wide error reporter that aggregates what was skipped.
//!
//! Walker directory reads and loader file reads go through [`with_retry`];
//! transient errors back off and retry, permanent ones fail immediately,
//! and every give-up or skip lands in the [`ErrorReporter`] so the final
//! stats can surface them without failing the scan.

use crate::core_types::{RetryStats, ScanErrorEntry};
use crate::errors::IoClassification;
use log::{debug, warn};
use rand::Rng;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Backoff policy for retryable filesystem errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Ceiling for the per-attempt delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// The backoff delay before attempt `attempt` (1-based), with jitter.
    /// Doubles each attempt, capped, then jittered by up to ±25%.
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.max_delay);
        let jitter_range = base.as_millis() as u64 / 4;
        if jitter_range == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_range * 2);
        Duration::from_millis((base.as_millis() as u64 - jitter_range) + jitter)
    }
}

/// Classifies an I/O error for the retry policy.
///
/// Busy/interrupted/exhausted-descriptor conditions are retryable; missing
/// paths, permission failures, and wrong-kind errors are permanent.
/// Anything unrecognized is treated as retryable up to the attempt cap.
pub fn classify(error: &io::Error) -> IoClassification {
    use io::ErrorKind::*;
    match error.kind() {
        NotFound | PermissionDenied | NotADirectory | IsADirectory | InvalidInput => {
            IoClassification::Permanent
        }
        Interrupted | WouldBlock | ResourceBusy | TimedOut => IoClassification::Retryable,
        _ => IoClassification::Retryable,
    }
}

/// Runs `op` under the retry policy, reporting outcomes to `reporter`.
///
/// Returns the operation's value, or the final error once the policy is
/// exhausted or a permanent error is seen.
pub fn with_retry<T, F>(
    policy: &RetryPolicy,
    reporter: &ErrorReporter,
    path: &Path,
    mut op: F,
) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => {
                if attempt > 1 {
                    reporter.record_success_after_retry();
                }
                return Ok(value);
            }
            Err(error) => match classify(&error) {
                IoClassification::Permanent => {
                    debug!("Permanent error on {}: {error}", path.display());
                    reporter.record_permanent(path, &error);
                    return Err(error);
                }
                _ if attempt >= policy.max_attempts => {
                    warn!(
                        "Giving up on {} after {attempt} attempts: {error}",
                        path.display()
                    );
                    reporter.record_give_up(path, &error, attempt);
                    return Err(error);
                }
                _ => {
                    let delay = policy.delay_for(attempt);
                    debug!(
                        "Retrying {} after {error} (attempt {attempt}, waiting {delay:?})",
                        path.display()
                    );
                    reporter.record_retry();
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            },
        }
    }
}

/// Aggregates retry outcomes and skipped paths across one scan.
///
/// Counters are lock-free; the per-path entry log is lock-protected and
/// append-only.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    retries: AtomicU64,
    given_up: AtomicU64,
    permanent: AtomicU64,
    success_after_retry: AtomicU64,
    entries: Mutex<Vec<ScanErrorEntry>>,
}

impl ErrorReporter {
    /// A fresh reporter with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_success_after_retry(&self) {
        self.success_after_retry.fetch_add(1, Ordering::Relaxed);
    }

    fn record_permanent(&self, path: &Path, error: &io::Error) {
        self.permanent.fetch_add(1, Ordering::Relaxed);
        self.push_entry(path, error, IoClassification::Permanent, 1);
    }

    fn record_give_up(&self, path: &Path, error: &io::Error, attempts: u32) {
        self.given_up.fetch_add(1, Ordering::Relaxed);
        self.push_entry(path, error, IoClassification::GaveUp, attempts);
    }

    fn push_entry(
        &self,
        path: &Path,
        error: &io::Error,
        classification: IoClassification,
        attempts: u32,
    ) {
        let entry = ScanErrorEntry {
            path: path.display().to_string(),
            error_code: error
                .raw_os_error()
                .map(|code| code.to_string())
                .unwrap_or_else(|| format!("{:?}", error.kind())),
            classification: classification.to_string(),
            attempts,
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    /// Snapshot of the counters and the entry log.
    pub fn snapshot(&self) -> (RetryStats, Vec<ScanErrorEntry>) {
        let stats = RetryStats {
            retries: self.retries.load(Ordering::Relaxed),
            given_up: self.given_up.load(Ordering::Relaxed),
            permanent: self.permanent.load(Ordering::Relaxed),
            success_after_retry: self.success_after_retry.load(Ordering::Relaxed),
        };
        let entries = self
            .entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default();
        (stats, entries)
    }
}
