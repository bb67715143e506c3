//! Bounded fixed-interval polling for asynchronous server-side processing

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PublishError;

/// Polling budget
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

/// Result of one status check
#[derive(Debug)]
pub enum PollStatus<T> {
    Ready(T),
    Pending,
    Failed(String),
}

/// Final result of a polling loop
#[derive(Debug)]
pub enum PollOutcome<T> {
    Ready(T),
    Failed(String),
    TimedOut { attempts: u32 },
}

impl<T> PollOutcome<T> {
    /// Map onto the publish error taxonomy, keeping failure and timeout distinct
    pub fn into_result(self, resource_id: &str) -> Result<T, PublishError> {
        match self {
            PollOutcome::Ready(value) => Ok(value),
            PollOutcome::Failed(message) => Err(PublishError::ProcessingFailed(format!(
                "{}: {}",
                resource_id, message
            ))),
            PollOutcome::TimedOut { attempts } => Err(PublishError::ProcessingTimeout {
                resource: resource_id.to_string(),
                attempts,
            }),
        }
    }
}

/// Check `resource_id` until it is ready, failed, or the budget runs out.
///
/// An error from `check` itself aborts the loop.
pub async fn await_completion<T, F, Fut>(
    resource_id: &str,
    policy: PollPolicy,
    mut check: F,
) -> Result<PollOutcome<T>, PublishError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, PublishError>>,
{
    for attempt in 0..policy.max_attempts {
        match check().await? {
            PollStatus::Ready(value) => {
                tracing::debug!(
                    resource_id = %resource_id,
                    attempts = attempt + 1,
                    "Remote processing completed"
                );
                return Ok(PollOutcome::Ready(value));
            }
            PollStatus::Failed(message) => {
                tracing::warn!(
                    resource_id = %resource_id,
                    attempt = attempt + 1,
                    error = %message,
                    "Remote processing failed"
                );
                return Ok(PollOutcome::Failed(message));
            }
            PollStatus::Pending => {
                tracing::debug!(
                    resource_id = %resource_id,
                    attempt = attempt + 1,
                    "Waiting for remote processing"
                );
                if attempt + 1 < policy.max_attempts {
                    sleep(policy.interval).await;
                }
            }
        }
    }

    Ok(PollOutcome::TimedOut {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_ready_after_pending_ticks() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let outcome = await_completion("c1", fast_policy(5), move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Ok(PollStatus::Pending)
                } else {
                    Ok(PollStatus::Ready("done"))
                }
            }
        })
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::Ready("done")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_is_terminal_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let outcome: PollOutcome<()> = await_completion("c1", fast_policy(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(PollStatus::Failed("ERROR".to_string()))
            }
        })
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::Failed(ref m) if m == "ERROR"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_times_out() {
        let outcome: PollOutcome<()> =
            await_completion("c1", fast_policy(3), || async { Ok(PollStatus::Pending) })
                .await
                .unwrap();

        assert!(matches!(outcome, PollOutcome::TimedOut { attempts: 3 }));
        let err = outcome.into_result("container c1").unwrap_err();
        assert!(matches!(err, PublishError::ProcessingTimeout { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_check_error_aborts() {
        let result: Result<PollOutcome<()>, _> = await_completion("c1", fast_policy(3), || async {
            Err(PublishError::protocol(
                crosspost_core::models::Network::Instagram,
                500,
                "down",
            ))
        })
        .await;
        assert!(result.is_err());
    }
}
