//! Publish pass over every pending destination of one content item
//!
//! Destinations are handled one at a time in enqueue order. Whatever happens
//! inside one destination (an error or a panic in its adapter) ends up as that
//! destination's failed outcome and never stops the others. Only problems
//! resolving the item itself abort the pass, before any destination is tried.

use anyhow::Context;
use chrono::Utc;
use crosspost_core::models::{
    Actor, ContentItem, ContentStatus, Destination, DestinationOutcome, DestinationResult,
    NotificationEventType, OutcomeState, PublishEvent,
};
use crosspost_core::AppError;
use crosspost_db::{PublishContentRepository, PublishDestinationRepository, PublishOutcomeRepository};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapter::PublishInput;
use crate::content::resolve_text;
use crate::error::PublishError;
use crate::media::MediaResolver;
use crate::registry::AdapterRegistry;
use crate::side_effects::{Delivery, SideEffects};
use crate::token::TokenRefresher;

/// Result of one publish pass
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub content_id: Uuid,
    pub status: ContentStatus,
    pub results: Vec<DestinationResult>,
    pub all_succeeded: bool,
}

/// What happened to one destination
struct Attempt {
    /// None when the destination could not be loaded
    destination: Option<Destination>,
    result: Result<Delivery, PublishError>,
}

impl Attempt {
    fn failed(destination: Option<Destination>, error: PublishError) -> Self {
        Self {
            destination,
            result: Err(error),
        }
    }
}

pub struct PublishCoordinator {
    contents: Arc<dyn PublishContentRepository>,
    outcomes: Arc<dyn PublishOutcomeRepository>,
    destinations: Arc<dyn PublishDestinationRepository>,
    registry: AdapterRegistry,
    media_resolver: MediaResolver,
    token_refresher: TokenRefresher,
    side_effects: SideEffects,
    defer_side_effects: bool,
}

impl PublishCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        contents: Arc<dyn PublishContentRepository>,
        outcomes: Arc<dyn PublishOutcomeRepository>,
        destinations: Arc<dyn PublishDestinationRepository>,
        registry: AdapterRegistry,
        media_resolver: MediaResolver,
        token_refresher: TokenRefresher,
        side_effects: SideEffects,
        defer_side_effects: bool,
    ) -> Self {
        Self {
            contents,
            outcomes,
            destinations,
            registry,
            media_resolver,
            token_refresher,
            side_effects,
            defer_side_effects,
        }
    }

    /// Publish `content_id` to all of its pending destinations
    #[tracing::instrument(skip(self), fields(content_id = %content_id, actor = %actor))]
    pub async fn run(&self, content_id: Uuid, actor: Actor) -> Result<PublishReport, AppError> {
        let item = self
            .contents
            .get_content(content_id)
            .await
            .context("Failed to load content item")?
            .ok_or_else(|| AppError::NotFound(format!("Content item {} not found", content_id)))?;

        let pending: Vec<DestinationOutcome> = self
            .outcomes
            .list_for_content(content_id)
            .await
            .context("Failed to load destination outcomes")?
            .into_iter()
            .filter(|o| o.state == OutcomeState::Pending)
            .collect();

        if pending.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Content item {} has no pending destinations",
                content_id
            )));
        }

        self.contents
            .set_status(content_id, ContentStatus::Publishing)
            .await
            .context("Failed to mark content item as publishing")?;

        tracing::info!(destinations = pending.len(), "Starting publish pass");

        let mut results = Vec::with_capacity(pending.len());
        let mut deliveries = Vec::new();

        for outcome in &pending {
            let attempt = self.attempt(&item, outcome.destination_id).await;
            self.persist(outcome, &attempt).await;

            let destination = attempt.destination.as_ref();
            let result = DestinationResult {
                destination_id: outcome.destination_id,
                network: destination.map(|d| d.network),
                account_id: destination.map(|d| d.account_id.clone()),
                success: attempt.result.is_ok(),
                external_id: attempt.result.as_ref().ok().map(|d| d.external_id.clone()),
                error: attempt.result.as_ref().err().map(ToString::to_string),
            };
            results.push(result);

            if let Ok(delivery) = attempt.result {
                deliveries.push(delivery);
            }
        }

        let states = self
            .outcomes
            .list_for_content(content_id)
            .await
            .context("Failed to reload destination outcomes")?
            .into_iter()
            .map(|o| o.state);
        let status = ContentStatus::from_outcomes(states);

        self.contents
            .set_status(content_id, status)
            .await
            .context("Failed to store aggregate status")?;

        let all_succeeded = results.iter().all(|r| r.success);
        tracing::info!(
            status = %status,
            published = deliveries.len(),
            failed = results.len() - deliveries.len(),
            "Publish pass finished"
        );

        if deliveries.is_empty() {
            tracing::info!("No destination succeeded, skipping side effects");
            return Ok(PublishReport {
                content_id,
                status,
                results,
                all_succeeded,
            });
        }

        let event = PublishEvent {
            event: NotificationEventType::PostPublished,
            content_id,
            channel_id: item.channel_id,
            actor,
            occurred_at: Utc::now(),
            results: results.clone(),
            media_count: item.media.len(),
        };
        self.dispatch_side_effects(event, deliveries).await;

        Ok(PublishReport {
            content_id,
            status,
            results,
            all_succeeded,
        })
    }

    async fn dispatch_side_effects(&self, event: PublishEvent, deliveries: Vec<Delivery>) {
        if self.defer_side_effects {
            let side_effects = self.side_effects.clone();
            tokio::spawn(async move {
                side_effects.run(event, deliveries).await;
            });
        } else {
            self.side_effects.run(event, deliveries).await;
        }
    }

    #[tracing::instrument(skip(self, item), fields(destination_id = %destination_id))]
    async fn attempt(&self, item: &ContentItem, destination_id: Uuid) -> Attempt {
        let mut destination = match self.destinations.get_destination(destination_id).await {
            Ok(Some(destination)) => destination,
            Ok(None) => {
                return Attempt::failed(
                    None,
                    PublishError::Connection(format!("destination {} not found", destination_id)),
                )
            }
            Err(e) => {
                return Attempt::failed(
                    None,
                    PublishError::Connection(format!("could not load destination: {}", e)),
                )
            }
        };

        let Some(credentials) = destination.credentials.clone() else {
            let network = destination.network;
            return Attempt::failed(
                Some(destination),
                PublishError::Connection(format!(
                    "no stored credentials for {} destination",
                    network
                )),
            );
        };

        let Some(adapter) = self.registry.get(destination.network).await else {
            let network = destination.network;
            return Attempt::failed(
                Some(destination),
                PublishError::Unsupported(format!("no adapter registered for {}", network)),
            );
        };

        let media = match self.media_resolver.resolve_all(&item.media) {
            Ok(media) => media,
            Err(e) => return Attempt::failed(Some(destination), e),
        };

        let mut input = PublishInput {
            text: resolve_text(item, destination.network),
            destination: destination.clone(),
            credentials,
            media,
        };

        let dispatched = AssertUnwindSafe(async {
            adapter.validate(&input)?;

            input.credentials = self.token_refresher.ensure(&mut destination).await?;
            input.destination = destination.clone();

            adapter.publish(&input).await
        })
        .catch_unwind()
        .await;

        let result = match dispatched {
            Ok(Ok(post)) => {
                tracing::info!(
                    network = %destination.network,
                    external_id = %post.external_id,
                    permalink = post.permalink.as_deref().unwrap_or(""),
                    "Published to destination"
                );
                Ok(Delivery {
                    destination: destination.clone(),
                    credentials: input.credentials,
                    external_id: post.external_id,
                })
            }
            Ok(Err(e)) => {
                tracing::warn!(network = %destination.network, error = %e, "Publish to destination failed");
                Err(e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(network = %destination.network, panic = %message, "Adapter panicked");
                Err(PublishError::Panicked(message))
            }
        };

        Attempt {
            destination: Some(destination),
            result,
        }
    }

    /// Store the attempt immediately; a storage error is logged and the pass goes on
    async fn persist(&self, outcome: &DestinationOutcome, attempt: &Attempt) {
        let stored = match &attempt.result {
            Ok(delivery) => {
                self.outcomes
                    .mark_published(outcome.id, &delivery.external_id, Utc::now())
                    .await
            }
            Err(e) => self.outcomes.mark_failed(outcome.id, &e.to_string()).await,
        };

        match stored {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                outcome_id = %outcome.id,
                "Outcome was no longer pending, result not stored"
            ),
            Err(e) => tracing::error!(
                outcome_id = %outcome.id,
                error = %e,
                "Failed to store destination outcome"
            ),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::side_effects::FirstCommentPolicy;
    use crate::test_helpers::fixtures::{bearer, content_item, destination};
    use crate::test_helpers::mock_adapter::{MockAdapter, MockBehavior};
    use crate::test_helpers::mock_repositories::{
        MockContentRepository, MockDestinationRepository, MockOutcomeRepository,
        RecordingNotifier,
    };
    use crosspost_core::models::{MediaRef, Network};
    use std::time::Duration;

    struct Harness {
        contents: MockContentRepository,
        outcomes: MockOutcomeRepository,
        destinations: MockDestinationRepository,
        registry: AdapterRegistry,
        notifier: Arc<RecordingNotifier>,
        item: ContentItem,
    }

    impl Harness {
        fn new(body: &str) -> Self {
            let contents = MockContentRepository::new();
            let item = content_item(body);
            contents.add(item.clone());
            Self {
                contents,
                outcomes: MockOutcomeRepository::new(),
                destinations: MockDestinationRepository::new(),
                registry: AdapterRegistry::new(),
                notifier: Arc::new(RecordingNotifier::new()),
                item,
            }
        }

        async fn adapter(&self, adapter: Arc<MockAdapter>) -> Arc<MockAdapter> {
            self.registry.register(adapter.clone()).await;
            adapter
        }

        /// Add a destination with a pending outcome, returning (destination id, outcome id)
        fn destination(&self, destination: Destination) -> (Uuid, Uuid) {
            let outcome = DestinationOutcome::pending(self.item.id, destination.id);
            let ids = (destination.id, outcome.id);
            self.destinations.add(destination);
            self.outcomes.add(outcome);
            ids
        }

        fn coordinator(&self) -> PublishCoordinator {
            let destinations: Arc<dyn PublishDestinationRepository> =
                Arc::new(self.destinations.clone());
            PublishCoordinator::new(
                Arc::new(self.contents.clone()),
                Arc::new(self.outcomes.clone()),
                destinations.clone(),
                self.registry.clone(),
                MediaResolver::default(),
                TokenRefresher::new(reqwest::Client::new(), destinations),
                SideEffects::new(
                    self.registry.clone(),
                    self.notifier.clone(),
                    FirstCommentPolicy {
                        delay: Duration::ZERO,
                        max_attempts: 3,
                        backoff: Duration::ZERO,
                    },
                ),
                false,
            )
        }
    }

    #[tokio::test]
    async fn test_bearer_succeeds_and_missing_token_fails() {
        let harness = Harness::new("Hello world");
        let facebook = harness
            .adapter(Arc::new(MockAdapter::succeeding(Network::Facebook, "123_456")))
            .await;
        let instagram = harness
            .adapter(Arc::new(MockAdapter::succeeding(Network::Instagram, "never")))
            .await;
        let (_, outcome_a) =
            harness.destination(destination(Network::Facebook, Some(bearer("page-token"))));
        let (_, outcome_b) = harness.destination(destination(Network::Instagram, None));

        let report = harness
            .coordinator()
            .run(harness.item.id, Actor::Scheduler)
            .await
            .unwrap();

        assert_eq!(report.status, ContentStatus::Published);
        assert!(!report.all_succeeded);
        assert_eq!(
            harness.contents.status(harness.item.id),
            Some(ContentStatus::Published)
        );

        let a = harness.outcomes.get(outcome_a).unwrap();
        assert_eq!(a.state, OutcomeState::Published);
        assert_eq!(a.external_id.as_deref(), Some("123_456"));
        assert!(a.published_at.is_some());

        let b = harness.outcomes.get(outcome_b).unwrap();
        assert_eq!(b.state, OutcomeState::Failed);
        assert!(b.error_message.unwrap().contains("Connection error"));

        assert_eq!(facebook.publish_calls(), 1);
        assert_eq!(instagram.publish_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_outcome_left_pending_and_status_history() {
        let harness = Harness::new("body");
        harness
            .adapter(Arc::new(MockAdapter::succeeding(Network::Facebook, "1")))
            .await;
        harness
            .adapter(Arc::new(MockAdapter::failing(Network::YouTube, 500, "backend error")))
            .await;
        harness
            .adapter(Arc::new(
                MockAdapter::succeeding(Network::X, "2").with_validation_error("too long"),
            ))
            .await;
        for network in [Network::Facebook, Network::YouTube, Network::X, Network::Facebook] {
            harness.destination(destination(network, Some(bearer("t"))));
        }

        harness
            .coordinator()
            .run(harness.item.id, Actor::Scheduler)
            .await
            .unwrap();

        assert!(harness
            .outcomes
            .all()
            .iter()
            .all(|o| o.state != OutcomeState::Pending));
        assert_eq!(
            harness.contents.status_history(),
            vec![
                (harness.item.id, ContentStatus::Publishing),
                (harness.item.id, ContentStatus::Published),
            ]
        );
    }

    #[tokio::test]
    async fn test_all_failed_sets_failed_status() {
        let harness = Harness::new("body");
        harness
            .adapter(Arc::new(MockAdapter::failing(Network::Facebook, 400, "bad")))
            .await;
        harness.destination(destination(Network::Facebook, Some(bearer("t"))));

        let report = harness
            .coordinator()
            .run(harness.item.id, Actor::Scheduler)
            .await
            .unwrap();

        assert_eq!(report.status, ContentStatus::Failed);
        assert_eq!(
            report.results[0].error.as_deref(),
            Some("facebook API error (400): bad")
        );
        assert!(harness.notifier.events().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_adapter_is_contained() {
        let harness = Harness::new("body");
        harness
            .adapter(Arc::new(MockAdapter::new(Network::TikTok, MockBehavior::Panic)))
            .await;
        let facebook = harness
            .adapter(Arc::new(MockAdapter::succeeding(Network::Facebook, "fb-1")))
            .await;
        let (_, panicked) = harness.destination(destination(Network::TikTok, Some(bearer("t"))));
        let (_, later) = harness.destination(destination(Network::Facebook, Some(bearer("t"))));

        let report = harness
            .coordinator()
            .run(harness.item.id, Actor::Scheduler)
            .await
            .unwrap();

        let panicked = harness.outcomes.get(panicked).unwrap();
        assert_eq!(panicked.state, OutcomeState::Failed);
        assert!(panicked.error_message.unwrap().contains("adapter blew up"));
        assert_eq!(
            harness.outcomes.get(later).unwrap().state,
            OutcomeState::Published
        );
        assert_eq!(facebook.publish_calls(), 1);
        assert_eq!(report.status, ContentStatus::Published);
    }

    #[tokio::test]
    async fn test_unloadable_destination_is_connection_failure() {
        let harness = Harness::new("body");
        harness
            .adapter(Arc::new(MockAdapter::succeeding(Network::X, "1")))
            .await;
        let (destination_id, outcome_id) =
            harness.destination(destination(Network::X, Some(bearer("t"))));
        harness.destinations.break_destination(destination_id);

        let report = harness
            .coordinator()
            .run(harness.item.id, Actor::Scheduler)
            .await
            .unwrap();

        let outcome = harness.outcomes.get(outcome_id).unwrap();
        assert_eq!(outcome.state, OutcomeState::Failed);
        assert!(outcome.error_message.unwrap().contains("could not load destination"));
        assert_eq!(report.results[0].network, None);
    }

    #[tokio::test]
    async fn test_network_without_adapter_fails() {
        let harness = Harness::new("body");
        let (_, outcome_id) =
            harness.destination(destination(Network::Bluesky, Some(bearer("t"))));

        let report = harness
            .coordinator()
            .run(harness.item.id, Actor::Scheduler)
            .await
            .unwrap();

        assert_eq!(report.status, ContentStatus::Failed);
        assert!(harness
            .outcomes
            .get(outcome_id)
            .unwrap()
            .error_message
            .unwrap()
            .contains("no adapter registered for bluesky"));
    }

    #[tokio::test]
    async fn test_unresolvable_media_fails_the_destination() {
        let mut harness = Harness::new("body");
        harness.item.media = vec![MediaRef::image("/uploads/relative.jpg")];
        harness.contents.add(harness.item.clone());
        let facebook = harness
            .adapter(Arc::new(MockAdapter::succeeding(Network::Facebook, "1")))
            .await;
        harness.destination(destination(Network::Facebook, Some(bearer("t"))));

        let report = harness
            .coordinator()
            .run(harness.item.id, Actor::Scheduler)
            .await
            .unwrap();

        assert_eq!(report.status, ContentStatus::Failed);
        assert_eq!(facebook.publish_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_item_aborts_before_any_destination() {
        let harness = Harness::new("body");
        let err = harness
            .coordinator()
            .run(Uuid::new_v4(), Actor::Scheduler)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_item_without_pending_outcomes_is_rejected() {
        let harness = Harness::new("body");
        let err = harness
            .coordinator()
            .run(harness.item.id, Actor::Scheduler)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(harness.contents.status_history().is_empty());
    }

    #[tokio::test]
    async fn test_second_run_finds_nothing_pending() {
        let harness = Harness::new("body");
        harness
            .adapter(Arc::new(MockAdapter::succeeding(Network::Facebook, "1")))
            .await;
        harness.destination(destination(Network::Facebook, Some(bearer("t"))));
        let coordinator = harness.coordinator();

        coordinator
            .run(harness.item.id, Actor::Scheduler)
            .await
            .unwrap();
        let err = coordinator
            .run(harness.item.id, Actor::Scheduler)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_side_effects_get_event_and_first_comment() {
        let harness = Harness::new("body");
        let facebook = harness
            .adapter(Arc::new(
                MockAdapter::succeeding(Network::Facebook, "123_456").with_comments(vec![
                    Err(500),
                    Err(500),
                    Ok("c-1".to_string()),
                ]),
            ))
            .await;
        let mut page = destination(Network::Facebook, Some(bearer("t")));
        page.settings.first_comment = Some("link in bio".to_string());
        harness.destination(page);

        let actor = Actor::User { id: Uuid::new_v4() };
        let report = harness
            .coordinator()
            .run(harness.item.id, actor)
            .await
            .unwrap();

        assert!(report.all_succeeded);
        assert_eq!(facebook.comment_calls(), 3);

        let events = harness.notifier.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, actor);
        assert_eq!(events[0].channel_id, harness.item.channel_id);
        assert_eq!(events[0].results, report.results);
    }

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
