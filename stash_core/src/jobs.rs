//! Job queue payloads and retry policy shared by the dispatcher, the worker
//! pool and the queue backends.

use crate::types::{CaptureId, OwnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unit of work placed on the queue, keyed by capture id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureJob {
    pub job_id: String,
    pub capture_id: CaptureId,
    pub owner_id: OwnerId,
    /// Number of attempts already made. Zero on first enqueue.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl CaptureJob {
    pub fn new(capture_id: CaptureId, owner_id: OwnerId) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            capture_id,
            owner_id,
            attempt: 0,
            enqueued_at: Utc::now(),
            last_error: None,
        }
    }

    /// Copy for the next attempt, carrying the failure reason.
    pub fn next_attempt(&self, error: impl Into<String>) -> Self {
        Self {
            job_id: self.job_id.clone(),
            capture_id: self.capture_id.clone(),
            owner_id: self.owner_id.clone(),
            attempt: self.attempt + 1,
            enqueued_at: Utc::now(),
            last_error: Some(error.into()),
        }
    }
}

/// A job handed to a worker together with the raw payload the backend
/// needs to acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDelivery {
    pub job: CaptureJob,
    pub receipt: String,
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` failed attempts (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }

    /// `attempts_made` counts the attempt that just failed.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Proof of holding the per-capture execution guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardToken {
    pub capture_id: CaptureId,
    pub token: String,
}

impl GuardToken {
    pub fn new(capture_id: CaptureId) -> Self {
        Self {
            capture_id,
            token: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(10), Duration::from_millis(1_000));
    }

    #[test]
    fn test_default_policy_allows_three_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_next_attempt_keeps_identity() {
        let job = CaptureJob::new(
            CaptureId::generate(),
            OwnerId::new("owner".to_string()).unwrap(),
        );
        let retry = job.next_attempt("timeout");
        assert_eq!(retry.job_id, job.job_id);
        assert_eq!(retry.capture_id, job.capture_id);
        assert_eq!(retry.attempt, 1);
        assert_eq!(retry.last_error.as_deref(), Some("timeout"));
    }
}
