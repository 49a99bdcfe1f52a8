//! Bounded polling of long-running remote operations

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Attempt budget and spacing for a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of status checks
    pub max_attempts: u32,
    /// Fixed delay between checks
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(2),
        }
    }
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

/// Classified state of a remote operation
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    /// Still in progress, check again
    Running,
    /// Terminal failure reported by the service
    Failed(String),
    /// Terminal success carrying the final body
    Done(T),
}

/// Classify a Content Understanding operation body by its `status` field
///
/// `Running` retries, `Failed` is terminal, anything else is treated as done.
pub fn classify_status(body: Value) -> PollStatus<Value> {
    match body.get("status").and_then(Value::as_str) {
        Some("Running") => PollStatus::Running,
        Some("Failed") => PollStatus::Failed(body.to_string()),
        _ => PollStatus::Done(body),
    }
}

/// Run `check` until it reports a terminal state or the budget runs out
///
/// Errors returned by `check` itself (transport failures) propagate at once.
pub async fn poll_until_done<T, F, Fut>(policy: PollPolicy, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>>>,
{
    for attempt in 1..=policy.max_attempts {
        match check().await? {
            PollStatus::Done(value) => return Ok(value),
            PollStatus::Failed(reason) => return Err(Error::EnrichmentFailed(reason)),
            PollStatus::Running => {
                tracing::debug!("Operation still running (attempt {}/{})", attempt, policy.max_attempts);
                if attempt < policy.max_attempts {
                    sleep(policy.interval).await;
                }
            }
        }
    }

    Err(Error::EnrichmentTimeout {
        attempts: policy.max_attempts,
    })
}
