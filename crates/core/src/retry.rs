//! Retry ceiling for stage failures.
//!
//! Structural failures (missing payload field) and capability failures share
//! one counter. A job whose counter reaches the ceiling is failed for good.

/// Default number of failed attempts before a job is marked `failed`.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Default number of jobs claimed per batch.
pub const DEFAULT_BATCH_SIZE: i64 = 5;

/// Default lease duration for a claimed job, in seconds.
pub const DEFAULT_LEASE_SECS: i64 = 300;

/// `last_error` written when a claim takes over a lease that expired. The
/// previous holder never reported back, so its attempt counts as a failure.
pub const LEASE_EXPIRED_ERROR: &str = "lease expired";

/// What to do with a job after one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Release the job to its pending stage; it is picked up again later.
    Retry { retry_count: i32 },
    /// The ceiling was reached; the job is failed permanently.
    GiveUp { retry_count: i32 },
}

impl RetryDecision {
    pub fn retry_count(self) -> i32 {
        match self {
            RetryDecision::Retry { retry_count } | RetryDecision::GiveUp { retry_count } => {
                retry_count
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: i32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_retries: i32) -> Self {
        Self { max_retries }
    }

    /// Whether a job with this many recorded failures may still be claimed.
    pub fn is_eligible(self, retry_count: i32) -> bool {
        retry_count < self.max_retries
    }

    /// Decide after a failure, given the count *before* this failure.
    pub fn on_failure(self, retry_count: i32) -> RetryDecision {
        let retry_count = retry_count.saturating_add(1);
        if retry_count >= self.max_retries {
            RetryDecision::GiveUp { retry_count }
        } else {
            RetryDecision::Retry { retry_count }
        }
    }
}
