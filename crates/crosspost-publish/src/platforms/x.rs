//! X adapter (OAuth 1.0a signed requests)
//!
//! Images go through the v1.1 simple media upload as base64 form data, then
//! the post is created through the v2 API with the returned media ids.

use async_trait::async_trait;
use base64::Engine;
use crosspost_core::models::{Network, SignedCredentials};
use serde_json::{json, Value};

use super::text_length;
use crate::adapter::{CommentRequest, PlatformAdapter, PublishInput, PublishedPost};
use crate::error::PublishError;
use crate::http;
use crate::media::ResolvedMedia;
use crate::upload::{fetch_bytes, signing};

const MAX_TEXT_CHARS: usize = 280;
const MAX_IMAGES: usize = 4;
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct XAdapter {
    http_client: reqwest::Client,
    api_base: String,
    upload_base: String,
}

impl XAdapter {
    pub fn new(http_client: reqwest::Client, api_base: String, upload_base: String) -> Self {
        Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
        }
    }

    async fn upload_image(
        &self,
        credentials: &SignedCredentials,
        image: &ResolvedMedia,
    ) -> Result<String, PublishError> {
        let bytes = fetch_bytes(&self.http_client, Network::X, &image.url, MAX_IMAGE_BYTES).await?;
        let media_data = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let url = format!("{}/1.1/media/upload.json", self.upload_base);
        let form = [("media_data", media_data.as_str())];
        let authorization = signing::authorization_header(credentials, "POST", &url, &form);

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .form(&form)
            .send()
            .await?;

        let body = http::read_json(Network::X, response).await?;
        http::required_str(Network::X, &body, "media_id_string")
    }

    /// POST /2/tweets; JSON bodies are not part of the signature
    async fn create_tweet(
        &self,
        credentials: &SignedCredentials,
        payload: Value,
    ) -> Result<String, PublishError> {
        let url = format!("{}/2/tweets", self.api_base);
        let authorization = signing::authorization_header(credentials, "POST", &url, &[]);

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&payload)
            .send()
            .await?;

        let body = http::read_json(Network::X, response).await?;
        let data = body.get("data").cloned().unwrap_or(Value::Null);
        http::required_str(Network::X, &data, "id")
    }
}

fn permalink(tweet_id: &str) -> String {
    format!("https://x.com/i/web/status/{}", tweet_id)
}

#[async_trait]
impl PlatformAdapter for XAdapter {
    fn network(&self) -> Network {
        Network::X
    }

    fn validate(&self, input: &PublishInput) -> Result<(), PublishError> {
        if input.has_video() {
            return Err(PublishError::Validation(
                "video posts are not supported for X".to_string(),
            ));
        }
        if input.images().count() > MAX_IMAGES {
            return Err(PublishError::Validation(format!(
                "X posts accept at most {} images",
                MAX_IMAGES
            )));
        }
        if input.text.trim().is_empty() && input.media.is_empty() {
            return Err(PublishError::Validation(
                "X posts need text or at least one image".to_string(),
            ));
        }
        if text_length(&input.text) > MAX_TEXT_CHARS {
            return Err(PublishError::Validation(format!(
                "X posts are limited to {} characters",
                MAX_TEXT_CHARS
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, input), fields(network = "x", images = input.media.len()))]
    async fn publish(&self, input: &PublishInput) -> Result<PublishedPost, PublishError> {
        let credentials = input.signed_credentials()?;

        let mut media_ids = Vec::new();
        for image in input.images() {
            media_ids.push(self.upload_image(credentials, image).await?);
        }

        let mut payload = json!({ "text": input.text });
        if !media_ids.is_empty() {
            payload["media"] = json!({ "media_ids": media_ids });
        }

        let id = self.create_tweet(credentials, payload).await?;
        let permalink = permalink(&id);
        Ok(PublishedPost::new(id).with_permalink(permalink))
    }

    fn supports_comments(&self) -> bool {
        true
    }

    async fn post_comment(&self, request: &CommentRequest) -> Result<String, PublishError> {
        let credentials = request.signed_credentials()?;
        let payload = json!({
            "text": request.text,
            "reply": { "in_reply_to_tweet_id": request.parent_id },
        });
        self.create_tweet(credentials, payload).await
    }
}
