//! Bounded retry for credentialed remote operations.
//!
//! The delay between attempts is fixed; it does not grow.

use backon::{ConstantBuilder, Retryable};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;

use crate::error::GitError;

pub const DEFAULT_MAX_RETRIES: usize = 5;
pub const DEFAULT_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 means a single attempt
    pub max_retries: usize,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Upper bound on how many times an operation runs
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_retries)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out. Exhaustion yields [`GitError::RetriesExhausted`].
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    op: F,
) -> Result<T, GitError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, GitError>>,
{
    let attempts = AtomicUsize::new(0);
    let attempts_ref = &attempts;
    let op_ref = &op;

    let result = (move || async move {
        attempts_ref.fetch_add(1, Ordering::SeqCst);
        op_ref().await
    })
    .retry(policy.backoff())
    .when(GitError::is_retryable)
    .notify(|err: &GitError, delay: Duration| {
        warn!(
            command = label,
            attempt = attempts_ref.load(Ordering::SeqCst),
            max_attempts = policy.max_attempts(),
            ?delay,
            error = %err,
            "git command failed, retrying"
        );
    })
    .await;

    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_retryable() => Err(GitError::RetriesExhausted {
            command: label.to_string(),
            attempts: attempts.load(Ordering::SeqCst),
            last_error: Box::new(err),
        }),
        Err(err) => Err(err),
    }
}
