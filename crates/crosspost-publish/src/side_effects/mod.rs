//! Work that follows a publish pass
//!
//! Nothing here can change an outcome that is already persisted. Errors are
//! logged and dropped.

mod first_comment;

pub use first_comment::{post_first_comment, FirstCommentPolicy};

use crosspost_core::models::{Credentials, Destination, PublishEvent};
use crosspost_core::PublishNotifier;
use std::sync::Arc;

use crate::registry::AdapterRegistry;

/// A destination the pass published to successfully
#[derive(Debug, Clone)]
pub struct Delivery {
    pub destination: Destination,
    /// Credentials the publish call used (after any refresh)
    pub credentials: Credentials,
    pub external_id: String,
}

#[derive(Clone)]
pub struct SideEffects {
    registry: AdapterRegistry,
    notifier: Arc<dyn PublishNotifier>,
    comment_policy: FirstCommentPolicy,
}

impl SideEffects {
    pub fn new(
        registry: AdapterRegistry,
        notifier: Arc<dyn PublishNotifier>,
        comment_policy: FirstCommentPolicy,
    ) -> Self {
        Self {
            registry,
            notifier,
            comment_policy,
        }
    }

    /// Notify first, then post any configured first comments.
    ///
    /// Does nothing when the pass produced no successful delivery.
    #[tracing::instrument(skip_all, fields(content_id = %event.content_id, deliveries = deliveries.len()))]
    pub async fn run(&self, event: PublishEvent, deliveries: Vec<Delivery>) {
        if deliveries.is_empty() {
            return;
        }

        if let Err(e) = self.notifier.notify(event).await {
            tracing::error!(error = %e, "Failed to deliver publish notification");
        }

        for delivery in &deliveries {
            let Some(text) = delivery.destination.settings.first_comment_text() else {
                continue;
            };
            let Some(adapter) = self.registry.get(delivery.destination.network).await else {
                continue;
            };
            if !adapter.supports_comments() {
                tracing::debug!(
                    network = %delivery.destination.network,
                    "Skipping first comment, network has no comment support"
                );
                continue;
            }

            post_first_comment(adapter.as_ref(), delivery, text, &self.comment_policy).await;
        }
    }
}
