//! Crosspost Publish Library
//!
//! The publish pipeline: the coordinator that walks an item's pending
//! destinations, the per-network adapters behind `PlatformAdapter`, token
//! refresh, completion polling, upload helpers and post-publish side effects.

pub mod adapter;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod media;
pub mod platforms;
pub mod poller;
pub mod registry;
pub mod side_effects;
pub mod token;
pub mod upload;

#[cfg(test)]
pub mod test_helpers;

pub use adapter::{CommentRequest, PlatformAdapter, PublishInput, PublishedPost};
pub use coordinator::{PublishCoordinator, PublishReport};
pub use error::PublishError;
pub use media::{MediaResolver, ResolvedMedia};
pub use platforms::{register_all, PlatformContext};
pub use poller::{await_completion, PollOutcome, PollPolicy, PollStatus};
pub use registry::AdapterRegistry;
pub use side_effects::{Delivery, FirstCommentPolicy, SideEffects};
pub use token::{RefreshEndpoint, TokenRefresher};
