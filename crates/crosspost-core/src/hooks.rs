//! Hooks for collaborators outside the publish core
//!
//! The coordinator reports each finished pass through `PublishNotifier`.
//! Delivery formatting and transport belong to the implementor (the infra
//! crate ships a signed-webhook implementation).

use async_trait::async_trait;

use crate::models::PublishEvent;

/// Receives one event per completed publish pass
#[async_trait]
pub trait PublishNotifier: Send + Sync {
    async fn notify(&self, event: PublishEvent) -> Result<(), String>;
}

/// No-op implementation for deployments without notification targets
pub struct NoOpPublishNotifier;

#[async_trait]
impl PublishNotifier for NoOpPublishNotifier {
    async fn notify(&self, _event: PublishEvent) -> Result<(), String> {
        Ok(())
    }
}
