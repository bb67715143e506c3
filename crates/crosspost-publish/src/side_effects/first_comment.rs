use std::time::Duration;

use crosspost_core::PublishConfig;

use super::Delivery;
use crate::adapter::{CommentRequest, PlatformAdapter};

/// Timing for follow-up comments
#[derive(Debug, Clone, Copy)]
pub struct FirstCommentPolicy {
    /// Wait before the first attempt so the new object is visible to the comments API
    pub delay: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl FirstCommentPolicy {
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            delay: Duration::from_secs(config.first_comment_delay_secs),
            max_attempts: config.first_comment_max_attempts.max(1),
            backoff: Duration::from_millis(config.first_comment_backoff_ms),
        }
    }
}

/// Post the destination's configured first comment under a delivered object.
///
/// Returns the comment id when one was posted. Failures are logged only.
#[tracing::instrument(
    skip(adapter, delivery, text, policy),
    fields(destination_id = %delivery.destination.id, network = %delivery.destination.network)
)]
pub async fn post_first_comment(
    adapter: &dyn PlatformAdapter,
    delivery: &Delivery,
    text: &str,
    policy: &FirstCommentPolicy,
) -> Option<String> {
    if !policy.delay.is_zero() {
        tokio::time::sleep(policy.delay).await;
    }

    let request = CommentRequest {
        destination: delivery.destination.clone(),
        credentials: delivery.credentials.clone(),
        parent_id: delivery.external_id.clone(),
        text: text.to_string(),
    };

    for attempt in 1..=policy.max_attempts {
        match adapter.post_comment(&request).await {
            Ok(comment_id) => {
                tracing::info!(
                    attempt,
                    parent_id = %delivery.external_id,
                    comment_id = %comment_id,
                    "First comment posted"
                );
                return Some(comment_id);
            }
            Err(e) if !e.is_retryable() => {
                tracing::warn!(attempt, error = %e, "First comment rejected, not retrying");
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "First comment attempt failed"
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    tracing::error!(
        parent_id = %delivery.external_id,
        "Giving up on first comment after {} attempts",
        policy.max_attempts
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::fixtures::{bearer, destination};
    use crate::test_helpers::mock_adapter::MockAdapter;
    use crosspost_core::models::Network;

    fn delivery() -> Delivery {
        Delivery {
            destination: destination(Network::Facebook, Some(bearer("page-token"))),
            credentials: bearer("page-token"),
            external_id: "123_456".to_string(),
        }
    }

    fn policy(max_attempts: u32) -> FirstCommentPolicy {
        FirstCommentPolicy {
            delay: Duration::ZERO,
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let adapter = MockAdapter::succeeding(Network::Facebook, "123_456")
            .with_comments(vec![Err(500), Err(503), Ok("comment-3".to_string())]);

        let id = post_first_comment(&adapter, &delivery(), "link in bio", &policy(3)).await;

        assert_eq!(id.as_deref(), Some("comment-3"));
        assert_eq!(adapter.comment_calls(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let adapter =
            MockAdapter::succeeding(Network::Facebook, "123_456").with_comments(vec![Err(403)]);

        let id = post_first_comment(&adapter, &delivery(), "hello", &policy(3)).await;

        assert!(id.is_none());
        assert_eq!(adapter.comment_calls(), 1);
    }

    #[tokio::test]
    async fn test_attempt_budget_is_respected() {
        let adapter = MockAdapter::succeeding(Network::Facebook, "123_456")
            .with_comments(vec![Err(500), Err(500), Err(500), Err(500)]);

        let id = post_first_comment(&adapter, &delivery(), "hello", &policy(2)).await;

        assert!(id.is_none());
        assert_eq!(adapter.comment_calls(), 2);
    }
}
