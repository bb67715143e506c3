//! Crosspost Database Layer
//!
//! PostgreSQL repositories for content items, destinations, publish outcomes
//! and webhook targets, plus the narrow repository traits the publish
//! pipeline depends on.

pub mod db;
pub mod publish_traits;

pub use db::{
    run_migrations, ContentRepository, DestinationRepository, OutcomeRepository,
    WebhookTargetRepository,
};

pub use publish_traits::{
    PublishContentRepository, PublishDestinationRepository, PublishOutcomeRepository,
    PublishWebhookRepository,
};
