//! Retry policy for rate-limited backends
//!
//! This module implements bounded retry with exponential backoff and jitter.
//! Only failures whose kind is on the policy's allow-list are retried; any
//! other failure is returned on the spot.

use crate::logging::{observation, ConversationLog, LogHandle};
use crate::providers::error::{BackendError, TransportError, TransportErrorKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Delay the backoff starts from (milliseconds)
    pub initial_delay_ms: u64,

    /// Base for exponential backoff (e.g., 2.0 for doubling)
    pub exponential_base: f64,

    /// Multiply each delay by a random factor in `[1, 2)`
    pub jitter: bool,

    /// Failure kinds that are retried
    pub retry_on: Vec<TransportErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay_ms: 1_000,
            exponential_base: 2.0,
            jitter: true,
            retry_on: TransportErrorKind::RETRYABLE.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom retry budget
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Disable jitter, making delays deterministic
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Start the backoff from `delay`, at millisecond resolution
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Delay to wait after `previous`
    pub fn next_delay(&self, previous: Duration) -> Duration {
        let jitter = if self.jitter {
            rand::thread_rng().gen::<f64>()
        } else {
            0.0
        };
        let factor = self.exponential_base * (1.0 + jitter);
        Duration::try_from_secs_f64(previous.as_secs_f64() * factor).unwrap_or(previous)
    }

    /// Check if the failure is on the allow-list
    pub fn is_retryable(&self, error: &TransportError) -> bool {
        self.retry_on.contains(&error.kind())
    }
}

/// Outcome of a retried operation together with what it took
#[derive(Debug)]
pub struct RetryReport<T> {
    /// Final result
    pub result: Result<T, BackendError>,

    /// Number of times the operation ran
    pub attempts: u32,

    /// Delays slept between attempts, in order
    pub delays: Vec<Duration>,
}

/// Executor for retry operations
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    log: LogHandle,
}

impl RetryExecutor {
    /// Create a new retry executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            log: LogHandle::default(),
        }
    }

    /// Report failed attempts and waits to a conversation log
    pub fn with_log(mut self, log: Arc<dyn ConversationLog>) -> Self {
        self.log = LogHandle::new(Some(log));
        self
    }

    pub(crate) fn with_log_handle(mut self, log: LogHandle) -> Self {
        self.log = log;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.execute_with_report(operation).await.result
    }

    /// Execute an operation with retry logic and report attempts and delays
    pub async fn execute_with_report<F, Fut, T>(&self, mut operation: F) -> RetryReport<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempts = 0;
        let mut num_retries = 0;
        let mut delay = self.policy.initial_delay();
        let mut delays = Vec::new();

        loop {
            attempts += 1;
            let error = match operation().await {
                Ok(result) => {
                    return RetryReport {
                        result: Ok(result),
                        attempts,
                        delays,
                    };
                }
                Err(error) => error,
            };

            if !self.policy.is_retryable(&error) {
                return RetryReport {
                    result: Err(BackendError::Transport(error)),
                    attempts,
                    delays,
                };
            }

            warn!("Attempt {} failed: {}", attempts, error);
            self.log.observe(observation::ERROR, error.to_string());
            self.log.flush();

            num_retries += 1;
            if num_retries > self.policy.max_retries {
                return RetryReport {
                    result: Err(BackendError::RetriesExhausted {
                        max_retries: self.policy.max_retries,
                        last_error: error,
                    }),
                    attempts,
                    delays,
                };
            }

            delay = self.policy.next_delay(delay);
            info!("Waiting {:?} before another attempt", delay);
            self.log
                .observe(observation::INFO, format!("Waiting {:?} before another attempt.", delay));
            self.log.flush();

            delays.push(delay);
            tokio::time::sleep(delay).await;
        }
    }
}
