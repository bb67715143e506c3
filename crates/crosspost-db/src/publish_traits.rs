//! Repository trait abstractions for the publish pipeline
//!
//! These traits define the minimal interface the publish coordinator, token
//! refresher and webhook service need from storage, allowing them to be
//! exercised against in-memory mocks without a database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosspost_core::error::AppError;
use crosspost_core::models::{
    ContentItem, ContentStatus, Destination, DestinationOutcome, NotificationEventType,
    WebhookTarget,
};
use uuid::Uuid;

use crate::db::{
    ContentRepository, DestinationRepository, OutcomeRepository, WebhookTargetRepository,
};

/// Content item store
#[async_trait]
pub trait PublishContentRepository: Send + Sync {
    async fn get_content(&self, id: Uuid) -> Result<Option<ContentItem>>;

    async fn set_status(&self, id: Uuid, status: ContentStatus) -> Result<()>;
}

/// Outcome store
#[async_trait]
pub trait PublishOutcomeRepository: Send + Sync {
    /// Outcomes of an item ordered by enqueue time
    async fn list_for_content(&self, content_id: Uuid) -> Result<Vec<DestinationOutcome>>;

    /// Returns false when the outcome was no longer pending
    async fn mark_published(
        &self,
        outcome_id: Uuid,
        external_id: &str,
        published_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Returns false when the outcome was no longer pending
    async fn mark_failed(&self, outcome_id: Uuid, error_message: &str) -> Result<bool>;
}

/// Destination and credential store
#[async_trait]
pub trait PublishDestinationRepository: Send + Sync {
    async fn get_destination(&self, id: Uuid) -> Result<Option<Destination>>;

    async fn save_refreshed_token(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// Webhook target store
#[async_trait]
pub trait PublishWebhookRepository: Send + Sync {
    async fn find_active_targets(
        &self,
        channel_id: Uuid,
        event: NotificationEventType,
    ) -> Result<Vec<WebhookTarget>>;
}

// Implementations for concrete repository types

#[async_trait]
impl PublishContentRepository for ContentRepository {
    async fn get_content(&self, id: Uuid) -> Result<Option<ContentItem>> {
        self.get_by_id(id)
            .await
            .map_err(|e: AppError| anyhow::anyhow!(e))
    }

    async fn set_status(&self, id: Uuid, status: ContentStatus) -> Result<()> {
        let updated = self
            .update_status(id, status)
            .await
            .map_err(|e: AppError| anyhow::anyhow!(e))?;
        if !updated {
            anyhow::bail!("content item {} not found", id);
        }
        Ok(())
    }
}

#[async_trait]
impl PublishOutcomeRepository for OutcomeRepository {
    async fn list_for_content(&self, content_id: Uuid) -> Result<Vec<DestinationOutcome>> {
        OutcomeRepository::list_for_content(self, content_id)
            .await
            .map_err(|e: AppError| anyhow::anyhow!(e))
    }

    async fn mark_published(
        &self,
        outcome_id: Uuid,
        external_id: &str,
        published_at: DateTime<Utc>,
    ) -> Result<bool> {
        OutcomeRepository::mark_published(self, outcome_id, external_id, published_at)
            .await
            .map_err(|e: AppError| anyhow::anyhow!(e))
    }

    async fn mark_failed(&self, outcome_id: Uuid, error_message: &str) -> Result<bool> {
        OutcomeRepository::mark_failed(self, outcome_id, error_message)
            .await
            .map_err(|e: AppError| anyhow::anyhow!(e))
    }
}

#[async_trait]
impl PublishDestinationRepository for DestinationRepository {
    async fn get_destination(&self, id: Uuid) -> Result<Option<Destination>> {
        self.get_by_id(id)
            .await
            .map_err(|e: AppError| anyhow::anyhow!(e))
    }

    async fn save_refreshed_token(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.update_tokens(id, access_token, refresh_token, expires_at)
            .await
            .map_err(|e: AppError| anyhow::anyhow!(e))
    }
}

#[async_trait]
impl PublishWebhookRepository for WebhookTargetRepository {
    async fn find_active_targets(
        &self,
        channel_id: Uuid,
        event: NotificationEventType,
    ) -> Result<Vec<WebhookTarget>> {
        self.find_active_by_event(channel_id, event)
            .await
            .map_err(|e: AppError| anyhow::anyhow!(e))
    }
}
