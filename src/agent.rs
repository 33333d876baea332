//! Bounded-retry runner for structured-output model calls
//!
//! Both the query analyzer and the answer generator send a few-shot message
//! list and expect a JSON object back. This module owns the shared retry
//! machinery: failure is a typed outcome, never a swallowed exception, and
//! each attempt runs under its own deadline.

use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::errors::LlmError;
use crate::llm::{ChatClient, ChatMessage};

/// Retry policy for structured model calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts before giving up
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per retry
    pub initial_backoff: Duration,
    /// Deadline for a single model call
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Why a structured call ultimately failed.
#[derive(Debug)]
pub enum AgentFailure {
    /// Every attempt produced unusable output
    RetriesExhausted { attempts: u32 },
    /// The final attempt exceeded its deadline
    Timeout { duration_ms: u64 },
    /// The final attempt failed at the transport/API layer
    Llm(LlmError),
}

/// Run a structured model call under a retry policy.
///
/// `validate` turns raw completion text into the typed output; an `Err`
/// carries the rejection reason and triggers a retry. Timeouts count as
/// failed attempts.
pub async fn run_structured<T>(
    client: &dyn ChatClient,
    messages: &[ChatMessage],
    policy: &RetryPolicy,
    validate: impl Fn(&str) -> Result<T, String>,
) -> Result<T, AgentFailure> {
    let mut backoff = policy.initial_backoff;
    let mut timed_out_last = false;

    for attempt in 1..=policy.max_attempts {
        timed_out_last = false;

        match timeout(policy.attempt_timeout, client.chat(messages)).await {
            Err(_) => {
                tracing::warn!(attempt, "model call timed out");
                timed_out_last = true;
            }
            Ok(Err(err)) => {
                tracing::warn!(attempt, error = %err, "model call failed");
                if attempt == policy.max_attempts {
                    return Err(AgentFailure::Llm(err));
                }
            }
            Ok(Ok(output)) => match validate(&output) {
                Ok(value) => return Ok(value),
                Err(reason) => {
                    tracing::warn!(attempt, %reason, "model output rejected");
                }
            },
        }

        if attempt < policy.max_attempts {
            sleep(backoff).await;
            backoff *= 2;
        }
    }

    if timed_out_last {
        Err(AgentFailure::Timeout {
            duration_ms: policy.attempt_timeout.as_millis() as u64,
        })
    } else {
        Err(AgentFailure::RetriesExhausted {
            attempts: policy.max_attempts,
        })
    }
}
