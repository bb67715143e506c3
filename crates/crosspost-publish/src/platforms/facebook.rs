//! Facebook Pages adapter
//!
//! Synchronous posting: every publish is one request (or a few unpublished
//! photo uploads followed by one feed post) and the object id comes back in
//! the response.

use async_trait::async_trait;
use crosspost_core::models::Network;
use serde_json::json;

use super::graph::GraphClient;
use super::text_length;
use crate::adapter::{CommentRequest, PlatformAdapter, PublishInput, PublishedPost};
use crate::error::PublishError;

const MAX_TEXT_CHARS: usize = 63_206;

#[derive(Debug, Clone)]
pub struct FacebookAdapter {
    graph: GraphClient,
}

impl FacebookAdapter {
    pub fn new(http_client: reqwest::Client, graph_api_base: String) -> Self {
        Self {
            graph: GraphClient::new(http_client, graph_api_base, Network::Facebook),
        }
    }

    async fn post_text(&self, page_id: &str, token: &str, text: &str) -> Result<String, PublishError> {
        let body = self
            .graph
            .post(&format!("{}/feed", page_id), token, &[("message", text.to_string())])
            .await?;
        self.graph.id(&body)
    }

    async fn post_photo(
        &self,
        page_id: &str,
        token: &str,
        url: &str,
        caption: &str,
    ) -> Result<String, PublishError> {
        let mut params = vec![("url", url.to_string())];
        if !caption.is_empty() {
            params.push(("caption", caption.to_string()));
        }
        let body = self
            .graph
            .post(&format!("{}/photos", page_id), token, &params)
            .await?;

        // Prefer the feed post id so comments attach to the post, not the photo
        match body.get("post_id").and_then(|v| v.as_str()) {
            Some(post_id) => Ok(post_id.to_string()),
            None => self.graph.id(&body),
        }
    }

    async fn post_album(
        &self,
        page_id: &str,
        token: &str,
        urls: &[&str],
        text: &str,
    ) -> Result<String, PublishError> {
        let mut photo_ids = Vec::with_capacity(urls.len());
        for url in urls {
            let body = self
                .graph
                .post(
                    &format!("{}/photos", page_id),
                    token,
                    &[("url", url.to_string()), ("published", "false".to_string())],
                )
                .await?;
            photo_ids.push(self.graph.id(&body)?);
        }

        let attached: Vec<(String, String)> = photo_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                (
                    format!("attached_media[{}]", i),
                    json!({ "media_fbid": id }).to_string(),
                )
            })
            .collect();
        let mut params = vec![("message", text.to_string())];
        params.extend(attached.iter().map(|(k, v)| (k.as_str(), v.clone())));

        let body = self
            .graph
            .post(&format!("{}/feed", page_id), token, &params)
            .await?;
        self.graph.id(&body)
    }

    async fn post_video(
        &self,
        page_id: &str,
        token: &str,
        url: &str,
        description: &str,
    ) -> Result<String, PublishError> {
        let mut params = vec![("file_url", url.to_string())];
        if !description.is_empty() {
            params.push(("description", description.to_string()));
        }
        let body = self
            .graph
            .post(&format!("{}/videos", page_id), token, &params)
            .await?;
        self.graph.id(&body)
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn network(&self) -> Network {
        Network::Facebook
    }

    fn validate(&self, input: &PublishInput) -> Result<(), PublishError> {
        if input.text.trim().is_empty() && input.media.is_empty() {
            return Err(PublishError::Validation(
                "Facebook posts need text or media".to_string(),
            ));
        }
        if text_length(&input.text) > MAX_TEXT_CHARS {
            return Err(PublishError::Validation(format!(
                "Facebook posts are limited to {} characters",
                MAX_TEXT_CHARS
            )));
        }
        let videos = input.videos().count();
        if videos > 1 || (videos == 1 && input.media.len() > 1) {
            return Err(PublishError::Validation(
                "Facebook posts accept several images or a single video".to_string(),
            ));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, input), fields(network = "facebook", page_id = %input.destination.account_id))]
    async fn publish(&self, input: &PublishInput) -> Result<PublishedPost, PublishError> {
        let token = input.bearer_token()?;
        let page_id = input.destination.account_id.as_str();
        let text = input.text.as_str();

        let id = if let Some(video) = input.videos().next() {
            self.post_video(page_id, token, &video.url, text).await?
        } else {
            let images: Vec<&str> = input.images().map(|m| m.url.as_str()).collect();
            match images.as_slice() {
                [] => self.post_text(page_id, token, text).await?,
                [single] => self.post_photo(page_id, token, single, text).await?,
                many => self.post_album(page_id, token, many, text).await?,
            }
        };

        let permalink = format!("https://www.facebook.com/{}", id);
        Ok(PublishedPost::new(id).with_permalink(permalink))
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
