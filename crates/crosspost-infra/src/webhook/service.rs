use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crosspost_core::models::{PublishEvent, WebhookHookInfo, WebhookPayload, WebhookTarget};
use crosspost_core::{PublishConfig, PublishNotifier};
use crosspost_db::PublishWebhookRepository;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
const USER_AGENT: &str = "Crosspost-Webhook/1.0";

/// Configuration for webhook service
#[derive(Debug, Clone)]
pub struct WebhookServiceConfig {
    pub timeout_seconds: u64,
    pub max_concurrent_deliveries: usize,
}

impl Default for WebhookServiceConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_concurrent_deliveries: 10,
        }
    }
}

impl WebhookServiceConfig {
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            timeout_seconds: config.webhook_timeout_secs,
            max_concurrent_deliveries: config.webhook_max_concurrent.max(1),
        }
    }
}

/// Delivers publish events to the channel's subscribed webhook targets
#[derive(Clone)]
pub struct WebhookService {
    webhook_repo: Arc<dyn PublishWebhookRepository>,
    http_client: Client,
    semaphore: Arc<Semaphore>,
}

impl WebhookService {
    pub fn new(
        webhook_repo: Arc<dyn PublishWebhookRepository>,
        config: WebhookServiceConfig,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client for webhooks")?;

        Ok(Self {
            webhook_repo,
            http_client,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_deliveries)),
        })
    }

    /// Send `event` to every active target of its channel subscribed to it.
    ///
    /// Returns how many deliveries got a 2xx answer. Individual delivery
    /// failures are logged, not returned.
    #[tracing::instrument(skip(self, event), fields(content_id = %event.content_id, channel_id = %event.channel_id))]
    pub async fn trigger_event(&self, event: PublishEvent) -> Result<usize> {
        let targets = self
            .webhook_repo
            .find_active_targets(event.channel_id, event.event)
            .await
            .context("Failed to find active webhooks")?;

        if targets.is_empty() {
            tracing::debug!(event_type = %event.event, "No active webhooks found for event");
            return Ok(0);
        }

        tracing::info!(
            event_type = %event.event,
            webhook_count = targets.len(),
            "Triggering webhooks for event"
        );

        let mut deliveries = JoinSet::new();
        for target in targets {
            let payload = WebhookPayload {
                hook: WebhookHookInfo {
                    id: target.id,
                    event: event.event.to_string(),
                    target: target.url.clone(),
                    channel: target.channel_id,
                    created_at: target.created_at,
                },
                data: event.clone(),
            };

            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .context("Failed to acquire semaphore permit")?;
            let service = self.clone();

            deliveries.spawn(async move {
                let result = service.send_webhook(&target, &payload).await;
                drop(permit);

                match result {
                    Ok(status_code) => {
                        tracing::info!(webhook_id = %target.id, status_code, "Webhook delivered successfully");
                        true
                    }
                    Err(e) => {
                        tracing::warn!(webhook_id = %target.id, error = %e, "Webhook delivery failed");
                        false
                    }
                }
            });
        }

        let mut delivered = 0;
        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(e) => tracing::error!(error = %e, "Webhook delivery task failed"),
            }
        }
        Ok(delivered)
    }

    /// POST the payload, returning the status code of a 2xx answer
    async fn send_webhook(&self, target: &WebhookTarget, payload: &WebhookPayload) -> Result<u16> {
        let body = serde_json::to_string(payload).context("Failed to serialize webhook payload")?;

        let mut request = self
            .http_client
            .post(&target.url)
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT);

        if let Some(secret) = target.signing_secret.as_deref().filter(|s| !s.is_empty()) {
            let signature = sign_payload(&body, secret)?;
            request = request.header(SIGNATURE_HEADER, format!("v1={}", signature));
        }

        let response = request
            .body(body)
            .send()
            .await
            .context("Failed to send webhook request")?;

        let status = response.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }

        let response_body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("Failed to read response body"));
        anyhow::bail!(
            "Webhook returned non-2xx status: {} - {}",
            status.as_u16(),
            response_body
        )
    }
}

/// Hex HMAC-SHA256 of the raw body
pub fn sign_payload(body: &str, secret: &str) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).context("Invalid signing secret")?;
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a `v1=<hex>` signature header value against the body
pub fn verify_signature(body: &str, secret: &str, header_value: &str) -> bool {
    let Some(signature) = header_value.strip_prefix("v1=") else {
        return false;
    };
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[async_trait]
impl PublishNotifier for WebhookService {
    async fn notify(&self, event: PublishEvent) -> std::result::Result<(), String> {
        self.trigger_event(event)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crosspost_core::models::{
        Actor, DestinationResult, Network, NotificationEventType,
    };
    use mockito::Matcher;
    use serde_json::json;
    use uuid::Uuid;

    struct StaticTargets(Vec<WebhookTarget>);

    #[async_trait]
    impl PublishWebhookRepository for StaticTargets {
        async fn find_active_targets(
            &self,
            channel_id: Uuid,
            event: NotificationEventType,
        ) -> Result<Vec<WebhookTarget>> {
            Ok(self
                .0
                .iter()
                .filter(|t| t.channel_id == channel_id && t.is_active && t.events.contains(&event))
                .cloned()
                .collect())
        }
    }

    fn target(channel_id: Uuid, url: String, secret: Option<&str>) -> WebhookTarget {
        WebhookTarget {
            id: Uuid::new_v4(),
            channel_id,
            url,
            events: vec![NotificationEventType::PostPublished],
            signing_secret: secret.map(String::from),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn event(channel_id: Uuid) -> PublishEvent {
        PublishEvent {
            event: NotificationEventType::PostPublished,
            content_id: Uuid::new_v4(),
            channel_id,
            actor: Actor::Scheduler,
            occurred_at: Utc::now(),
            results: vec![DestinationResult {
                destination_id: Uuid::new_v4(),
                network: Some(Network::Facebook),
                account_id: Some("page-1".to_string()),
                success: true,
                external_id: Some("123_456".to_string()),
                error: None,
            }],
            media_count: 2,
        }
    }

    fn service(targets: Vec<WebhookTarget>) -> WebhookService {
        WebhookService::new(Arc::new(StaticTargets(targets)), WebhookServiceConfig::default())
            .unwrap()
    }

    #[test]
    fn test_sign_payload_known_vector() {
        let signature =
            sign_payload("The quick brown fox jumps over the lazy dog", "key").unwrap();
        assert_eq!(
            signature,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_verify_signature() {
        let body = r#"{"hello":"world"}"#;
        let header = format!("v1={}", sign_payload(body, "whsec").unwrap());
        assert!(verify_signature(body, "whsec", &header));
        assert!(!verify_signature(body, "other", &header));
        assert!(!verify_signature(body, "whsec", "v2=abc"));
        assert!(!verify_signature(body, "whsec", "v1=not-hex"));
    }

    #[tokio::test]
    async fn test_signed_delivery() {
        let mut server = mockito::Server::new_async().await;
        let channel_id = Uuid::new_v4();
        let hook = server
            .mock("POST", "/hooks/publish")
            .match_header(
                "x-webhook-signature",
                Matcher::Regex("^v1=[0-9a-f]{64}$".to_string()),
            )
            .match_body(Matcher::PartialJson(json!({
                "hook": {"event": "post.published", "channel": channel_id},
                "data": {"channel_id": channel_id, "media_count": 2, "actor": {"type": "scheduler"}}
            })))
            .with_status(204)
            .create_async()
            .await;

        let delivered = service(vec![target(
            channel_id,
            format!("{}/hooks/publish", server.url()),
            Some("whsec_test"),
        )])
        .trigger_event(event(channel_id))
        .await
        .unwrap();

        hook.assert_async().await;
        assert_eq!(delivered, 1);
    }

    #[tokio::test]
    async fn test_unsigned_target_has_no_signature() {
        let mut server = mockito::Server::new_async().await;
        let channel_id = Uuid::new_v4();
        let hook = server
            .mock("POST", "/plain")
            .match_header("x-webhook-signature", Matcher::Missing)
            .with_status(200)
            .create_async()
            .await;

        service(vec![target(channel_id, format!("{}/plain", server.url()), None)])
            .trigger_event(event(channel_id))
            .await
            .unwrap();

        hook.assert_async().await;
    }

    #[tokio::test]
    async fn test_failing_target_does_not_block_others() {
        let mut server = mockito::Server::new_async().await;
        let channel_id = Uuid::new_v4();
        let _broken = server
            .mock("POST", "/broken")
            .with_status(500)
            .with_body("oops")
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/ok")
            .with_status(200)
            .create_async()
            .await;

        let notifier = service(vec![
            target(channel_id, format!("{}/broken", server.url()), Some("s")),
            target(channel_id, format!("{}/ok", server.url()), Some("s")),
        ]);
        let delivered = notifier.trigger_event(event(channel_id)).await.unwrap();

        ok.assert_async().await;
        assert_eq!(delivered, 1);
        assert!(notifier.notify(event(channel_id)).await.is_ok());
    }

    #[tokio::test]
    async fn test_other_channels_are_ignored() {
        let delivered = service(vec![target(
            Uuid::new_v4(),
            "http://127.0.0.1:9/unused".to_string(),
            None,
        )])
        .trigger_event(event(Uuid::new_v4()))
        .await
        .unwrap();
        assert_eq!(delivered, 0);
    }
}
