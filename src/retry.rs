//! Per-node retry policy.
//!
//! Only the `compute` hook is retried; `prepare` and `finalize` run exactly
//! once per visit. When the final attempt fails, the step's `fallback` hook
//! gets one shot with the prepare result and the last error. Attempt
//! counters live on the stack of the driving call, so concurrent executions
//! of the same node never share retry state.

use std::time::Duration;

use serde_json::Value;

use crate::errors::StepError;
use crate::step::{AsyncStep, Step};

/// Bounded-attempt retry with a fixed inter-attempt delay.
///
/// `max_attempts` counts total attempts, not re-tries; the default of 1
/// means a single attempt and no waiting. A configured value of 0 is
/// treated as 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total compute attempts (including the first). Minimum 1.
    pub max_attempts: u32,
    /// Delay between consecutive attempts.
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            wait: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` total attempts and `wait` between them.
    #[must_use]
    pub fn new(max_attempts: u32, wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            wait,
        }
    }

    /// Policy with `n` attempts and no delay.
    #[must_use]
    pub fn attempts(n: u32) -> Self {
        Self::new(n, Duration::ZERO)
    }

    fn limit(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Drives a blocking step's compute through the policy. Sleeps the
    /// current thread between attempts.
    pub(crate) fn drive_sync(&self, step: &dyn Step, prep: &Value) -> Result<Value, StepError> {
        let limit = self.limit();
        let mut attempt = 1u32;
        loop {
            match step.compute(prep.clone()) {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= limit => {
                    return step.fallback(prep.clone(), error);
                }
                Err(error) => {
                    tracing::debug!(attempt, limit, %error, "compute failed, retrying");
                    if !self.wait.is_zero() {
                        std::thread::sleep(self.wait);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Drives a blocking step from an async traversal. The compute itself
    /// still blocks, but the inter-attempt delay suspends instead of
    /// parking the worker thread.
    pub(crate) async fn drive_sync_in_async(
        &self,
        step: &dyn Step,
        prep: &Value,
    ) -> Result<Value, StepError> {
        let limit = self.limit();
        let mut attempt = 1u32;
        loop {
            match step.compute(prep.clone()) {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= limit => {
                    return step.fallback(prep.clone(), error);
                }
                Err(error) => {
                    tracing::debug!(attempt, limit, %error, "compute failed, retrying");
                    if !self.wait.is_zero() {
                        tokio::time::sleep(self.wait).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Drives a suspension-capable step's compute through the policy.
    pub(crate) async fn drive_async(
        &self,
        step: &dyn AsyncStep,
        prep: &Value,
    ) -> Result<Value, StepError> {
        let limit = self.limit();
        let mut attempt = 1u32;
        loop {
            match step.compute(prep.clone()).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= limit => {
                    return step.fallback(prep.clone(), error).await;
                }
                Err(error) => {
                    tracing::debug!(attempt, limit, %error, "compute failed, retrying");
                    if !self.wait.is_zero() {
                        tokio::time::sleep(self.wait).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
