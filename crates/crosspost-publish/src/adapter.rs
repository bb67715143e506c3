//! Per-network publish capability
//!
//! Every supported network implements `PlatformAdapter`. The coordinator
//! only sees this trait; protocol differences (synchronous posting,
//! container polling, resumable or streamed uploads, signed requests) stay
//! inside the implementations.

use async_trait::async_trait;
use crosspost_core::models::{Credentials, Destination, Network, SignedCredentials};
use std::fmt::Debug;

use crate::error::PublishError;
use crate::media::ResolvedMedia;

/// Everything an adapter needs for one destination
#[derive(Debug, Clone)]
pub struct PublishInput {
    pub destination: Destination,
    /// Credentials after any refresh
    pub credentials: Credentials,
    pub text: String,
    pub media: Vec<ResolvedMedia>,
}

impl PublishInput {
    pub fn bearer_token(&self) -> Result<&str, PublishError> {
        bearer_token(self.destination.network, &self.credentials)
    }

    pub fn signed_credentials(&self) -> Result<&SignedCredentials, PublishError> {
        signed_credentials(self.destination.network, &self.credentials)
    }

    pub fn images(&self) -> impl Iterator<Item = &ResolvedMedia> {
        self.media.iter().filter(|m| m.is_image())
    }

    pub fn videos(&self) -> impl Iterator<Item = &ResolvedMedia> {
        self.media.iter().filter(|m| m.is_video())
    }

    pub fn has_video(&self) -> bool {
        self.media.iter().any(ResolvedMedia::is_video)
    }
}

/// A follow-up comment on an object the pass just created
#[derive(Debug, Clone)]
pub struct CommentRequest {
    pub destination: Destination,
    pub credentials: Credentials,
    /// External id of the published object
    pub parent_id: String,
    pub text: String,
}

impl CommentRequest {
    pub fn bearer_token(&self) -> Result<&str, PublishError> {
        bearer_token(self.destination.network, &self.credentials)
    }

    pub fn signed_credentials(&self) -> Result<&SignedCredentials, PublishError> {
        signed_credentials(self.destination.network, &self.credentials)
    }
}

/// Successful publish on one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    /// Network-native identifier, stored verbatim
    pub external_id: String,
    pub permalink: Option<String>,
}

impl PublishedPost {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            permalink: None,
        }
    }

    pub fn with_permalink(mut self, permalink: impl Into<String>) -> Self {
        self.permalink = Some(permalink.into());
        self
    }
}

fn bearer_token(network: Network, credentials: &Credentials) -> Result<&str, PublishError> {
    credentials.bearer_token().ok_or_else(|| {
        PublishError::Connection(format!("{} requires a bearer access token", network))
    })
}

fn signed_credentials(
    network: Network,
    credentials: &Credentials,
) -> Result<&SignedCredentials, PublishError> {
    match credentials {
        Credentials::Signed(signed) => Ok(signed),
        Credentials::Bearer { .. } => Err(PublishError::Connection(format!(
            "{} requires signed request credentials",
            network
        ))),
    }
}

/// Publish capability of one external network
#[async_trait]
pub trait PlatformAdapter: Send + Sync + Debug {
    fn network(&self) -> Network;

    /// Check the input against the network's constraints without any I/O
    fn validate(&self, input: &PublishInput) -> Result<(), PublishError>;

    async fn publish(&self, input: &PublishInput) -> Result<PublishedPost, PublishError>;

    fn supports_comments(&self) -> bool {
        false
    }

    /// Post a comment under a published object, returning the comment id
    async fn post_comment(&self, _request: &CommentRequest) -> Result<String, PublishError> {
        Err(PublishError::Unsupported(format!(
            "{} does not support follow-up comments",
            self.network()
        )))
    }
}
