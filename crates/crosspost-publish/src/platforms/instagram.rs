//! Instagram adapter (container-create-then-poll-then-publish)
//!
//! Each media item becomes a container that Instagram processes
//! asynchronously. Containers are polled until FINISHED before the parent
//! is published.

use async_trait::async_trait;
use crosspost_core::models::{Network, PostType};
use serde_json::Value;

use super::graph::GraphClient;
use super::text_length;
use crate::adapter::{CommentRequest, PlatformAdapter, PublishInput, PublishedPost};
use crate::error::PublishError;
use crate::media::ResolvedMedia;
use crate::poller::{await_completion, PollPolicy, PollStatus};

const MAX_CAPTION_CHARS: usize = 2_200;
const MIN_CAROUSEL_ITEMS: usize = 2;
const MAX_CAROUSEL_ITEMS: usize = 10;

/// Shape of the post Instagram will receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Single,
    Reel,
    Story,
    Carousel,
}

#[derive(Debug, Clone)]
pub struct InstagramAdapter {
    graph: GraphClient,
    poll_policy: PollPolicy,
}

impl InstagramAdapter {
    pub fn new(http_client: reqwest::Client, graph_api_base: String, poll_policy: PollPolicy) -> Self {
        Self {
            graph: GraphClient::new(http_client, graph_api_base, Network::Instagram),
            poll_policy,
        }
    }

    fn layout(input: &PublishInput) -> Result<Layout, PublishError> {
        let settings = &input.destination.settings;
        match settings.post_type {
            PostType::Reel => {
                if input.media.len() != 1 || !input.has_video() {
                    return Err(PublishError::Validation(
                        "Instagram reels require exactly one video".to_string(),
                    ));
                }
                Ok(Layout::Reel)
            }
            PostType::Story => {
                if input.media.len() != 1 {
                    return Err(PublishError::Validation(
                        "Instagram stories take exactly one image or video".to_string(),
                    ));
                }
                Ok(Layout::Story)
            }
            PostType::Short => Err(PublishError::Validation(
                "Instagram has no short post type, use reel".to_string(),
            )),
            PostType::Post => {
                let count = input.media.len();
                if count == 0 {
                    return Err(PublishError::Validation(
                        "Instagram posts require at least one image or video".to_string(),
                    ));
                }
                if count > 1 || settings.carousel {
                    if !(MIN_CAROUSEL_ITEMS..=MAX_CAROUSEL_ITEMS).contains(&count) {
                        return Err(PublishError::Validation(format!(
                            "Instagram carousels take {} to {} items, got {}",
                            MIN_CAROUSEL_ITEMS, MAX_CAROUSEL_ITEMS, count
                        )));
                    }
                    return Ok(Layout::Carousel);
                }
                if input.has_video() {
                    Ok(Layout::Reel)
                } else {
                    Ok(Layout::Single)
                }
            }
        }
    }

    async fn create_container(
        &self,
        user_id: &str,
        token: &str,
        params: Vec<(&str, String)>,
    ) -> Result<String, PublishError> {
        let body = self
            .graph
            .post(&format!("{}/media", user_id), token, &params)
            .await?;
        self.graph.id(&body)
    }

    async fn wait_until_ready(&self, container_id: &str, token: &str) -> Result<(), PublishError> {
        let outcome = await_completion(container_id, self.poll_policy, move || async move {
            let body = self
                .graph
                .get(container_id, token, "status_code,status")
                .await?;
            Ok(container_status(&body))
        })
        .await?;

        outcome.into_result(&format!("Instagram container {}", container_id))
    }

    async fn publish_container(
        &self,
        user_id: &str,
        token: &str,
        container_id: &str,
    ) -> Result<String, PublishError> {
        let body = self
            .graph
            .post(
                &format!("{}/media_publish", user_id),
                token,
                &[("creation_id", container_id.to_string())],
            )
            .await?;
        self.graph.id(&body)
    }
}

fn media_params(media: &ResolvedMedia, video_type: Option<&str>) -> Vec<(&'static str, String)> {
    if media.is_video() {
        let mut params = vec![("video_url", media.url.clone())];
        if let Some(media_type) = video_type {
            params.push(("media_type", media_type.to_string()));
        }
        params
    } else {
        vec![("image_url", media.url.clone())]
    }
}

fn container_status(body: &Value) -> PollStatus<()> {
    let code = body
        .get("status_code")
        .and_then(Value::as_str)
        .unwrap_or_default();
    match code {
        "FINISHED" | "PUBLISHED" => PollStatus::Ready(()),
        "ERROR" | "EXPIRED" => {
            let detail = body
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or(code)
                .to_string();
            PollStatus::Failed(format!("container reported {}", detail))
        }
        _ => PollStatus::Pending,
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn network(&self) -> Network {
        Network::Instagram
    }

    fn validate(&self, input: &PublishInput) -> Result<(), PublishError> {
        if text_length(&input.text) > MAX_CAPTION_CHARS {
            return Err(PublishError::Validation(format!(
                "Instagram captions are limited to {} characters",
                MAX_CAPTION_CHARS
            )));
        }
        Self::layout(input).map(|_| ())
    }

    #[tracing::instrument(skip(self, input), fields(network = "instagram", ig_user_id = %input.destination.account_id))]
    async fn publish(&self, input: &PublishInput) -> Result<PublishedPost, PublishError> {
        let token = input.bearer_token()?;
        let user_id = input.destination.account_id.as_str();
        let layout = Self::layout(input)?;
        let caption = input.text.clone();

        let container_id = match layout {
            Layout::Single | Layout::Reel => {
                let mut params = media_params(&input.media[0], Some("REELS"));
                params.push(("caption", caption));
                self.create_container(user_id, token, params).await?
            }
            Layout::Story => {
                let mut params = media_params(&input.media[0], None);
                params.push(("media_type", "STORIES".to_string()));
                self.create_container(user_id, token, params).await?
            }
            Layout::Carousel => {
                let mut children = Vec::with_capacity(input.media.len());
                for media in &input.media {
                    let mut params = media_params(media, Some("VIDEO"));
                    params.push(("is_carousel_item", "true".to_string()));
                    let child = self.create_container(user_id, token, params).await?;
                    self.wait_until_ready(&child, token).await?;
                    children.push(child);
                }
                tracing::debug!(children = children.len(), "Carousel children ready");

                let params = vec![
                    ("media_type", "CAROUSEL".to_string()),
                    ("children", children.join(",")),
                    ("caption", caption),
                ];
                self.create_container(user_id, token, params).await?
            }
        };

        self.wait_until_ready(&container_id, token).await?;
        let media_id = self.publish_container(user_id, token, &container_id).await?;

        tracing::info!(media_id = %media_id, layout = ?layout, "Instagram media published");
        Ok(PublishedPost::new(media_id))
    }

    fn supports_comments(&self) -> bool {
        true
    }

    async fn post_comment(&self, request: &CommentRequest) -> Result<String, PublishError> {
        let token = request.bearer_token()?;
        let body = self
            .graph
            .post(
                &format!("{}/comments", request.parent_id),
                token,
                &[("message", request.text.clone())],
            )
            .await?;
        self.graph.id(&body)
    }
}
