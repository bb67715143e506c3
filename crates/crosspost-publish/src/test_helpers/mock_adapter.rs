use async_trait::async_trait;
use crosspost_core::models::Network;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::adapter::{CommentRequest, PlatformAdapter, PublishInput, PublishedPost};
use crate::error::PublishError;

#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed(String),
    Fail { status: u16, message: String },
    Panic,
}

/// Scriptable adapter that counts its calls
#[derive(Debug)]
pub struct MockAdapter {
    network: Network,
    behavior: MockBehavior,
    validation_error: Option<String>,
    supports_comments: bool,
    comment_results: Mutex<VecDeque<Result<String, u16>>>,
    publish_calls: AtomicU32,
    comment_calls: AtomicU32,
}

impl MockAdapter {
    pub fn new(network: Network, behavior: MockBehavior) -> Self {
        Self {
            network,
            behavior,
            validation_error: None,
            supports_comments: false,
            comment_results: Mutex::new(VecDeque::new()),
            publish_calls: AtomicU32::new(0),
            comment_calls: AtomicU32::new(0),
        }
    }

    pub fn succeeding(network: Network, external_id: &str) -> Self {
        Self::new(network, MockBehavior::Succeed(external_id.to_string()))
    }

    pub fn failing(network: Network, status: u16, message: &str) -> Self {
        Self::new(
            network,
            MockBehavior::Fail {
                status,
                message: message.to_string(),
            },
        )
    }

    pub fn with_validation_error(mut self, message: &str) -> Self {
        self.validation_error = Some(message.to_string());
        self
    }

    /// Enable comments; each call pops the next scripted result (an HTTP
    /// status for failures), succeeding once the script is exhausted
    pub fn with_comments(mut self, script: Vec<Result<String, u16>>) -> Self {
        self.supports_comments = true;
        self.comment_results = Mutex::new(script.into());
        self
    }

    pub fn publish_calls(&self) -> u32 {
        self.publish_calls.load(Ordering::SeqCst)
    }

    pub fn comment_calls(&self) -> u32 {
        self.comment_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn network(&self) -> Network {
        self.network
    }

    fn validate(&self, _input: &PublishInput) -> Result<(), PublishError> {
        match &self.validation_error {
            Some(message) => Err(PublishError::Validation(message.clone())),
            None => Ok(()),
        }
    }

    async fn publish(&self, _input: &PublishInput) -> Result<PublishedPost, PublishError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Succeed(id) => Ok(PublishedPost::new(id.clone())),
            MockBehavior::Fail { status, message } => {
                Err(PublishError::protocol(self.network, *status, message.clone()))
            }
            MockBehavior::Panic => panic!("adapter blew up"),
        }
    }

    fn supports_comments(&self) -> bool {
        self.supports_comments
    }

    async fn post_comment(&self, _request: &CommentRequest) -> Result<String, PublishError> {
        self.comment_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.comment_results.lock().unwrap().pop_front();
        match next {
            Some(Ok(id)) => Ok(id),
            Some(Err(status)) => Err(PublishError::protocol(
                self.network,
                status,
                "comment rejected",
            )),
            None => Ok("comment-id".to_string()),
        }
    }
}
