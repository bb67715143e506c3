//! YouTube adapter (resumable upload)

use async_trait::async_trait;
use crosspost_core::models::{Network, PostType};
use serde_json::{json, Value};
use std::path::PathBuf;

use super::text_length;
use crate::adapter::{CommentRequest, PlatformAdapter, PublishInput, PublishedPost};
use crate::error::PublishError;
use crate::http;
use crate::upload::{resumable, with_buffered_source};

const MAX_TITLE_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 5_000;
const SHORTS_TAG: &str = "#Shorts";

#[derive(Debug, Clone)]
pub struct YouTubeAdapter {
    http_client: reqwest::Client,
    api_base: String,
    upload_base: String,
    temp_dir: PathBuf,
}

impl YouTubeAdapter {
    pub fn new(
        http_client: reqwest::Client,
        api_base: String,
        upload_base: String,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
            temp_dir,
        }
    }

    fn title(input: &PublishInput) -> String {
        let settings = &input.destination.settings;
        let base = settings
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or_else(|| input.text.lines().map(str::trim).find(|l| !l.is_empty()))
            .unwrap_or("Untitled");

        let mut title: String = base.chars().take(MAX_TITLE_CHARS).collect();
        if settings.post_type == PostType::Short && !title.contains(SHORTS_TAG) {
            let room = MAX_TITLE_CHARS - SHORTS_TAG.len() - 1;
            title = format!("{} {}", title.chars().take(room).collect::<String>(), SHORTS_TAG);
        }
        title
    }

    fn metadata(input: &PublishInput) -> Value {
        let settings = &input.destination.settings;
        let privacy = settings.privacy.as_deref().unwrap_or("public");

        let mut snippet = json!({
            "title": Self::title(input),
            "description": input.text,
        });
        if !settings.tags.is_empty() {
            snippet["tags"] = json!(settings.tags);
        }
        if let Some(category) = &settings.category_id {
            snippet["categoryId"] = json!(category);
        }

        json!({
            "snippet": snippet,
            "status": {
                "privacyStatus": privacy,
                "selfDeclaredMadeForKids": false,
            },
        })
    }
}

#[async_trait]
impl PlatformAdapter for YouTubeAdapter {
    fn network(&self) -> Network {
        Network::YouTube
    }

    fn validate(&self, input: &PublishInput) -> Result<(), PublishError> {
        if input.videos().count() != 1 {
            return Err(PublishError::Validation(
                "YouTube uploads require exactly one video".to_string(),
            ));
        }
        if text_length(&input.text) > MAX_DESCRIPTION_CHARS {
            return Err(PublishError::Validation(format!(
                "YouTube descriptions are limited to {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }
        if matches!(
            input.destination.settings.post_type,
            PostType::Story | PostType::Reel
        ) {
            return Err(PublishError::Validation(
                "YouTube supports regular videos and shorts only".to_string(),
            ));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, input), fields(network = "youtube", channel_id = %input.destination.account_id))]
    async fn publish(&self, input: &PublishInput) -> Result<PublishedPost, PublishError> {
        let token = input.bearer_token()?;
        let video = input
            .videos()
            .next()
            .ok_or_else(|| PublishError::Validation("no video attached".to_string()))?;
        let metadata = Self::metadata(input);
        let init_url = format!(
            "{}/videos?uploadType=resumable&part=snippet,status",
            self.upload_base
        );

        let body = with_buffered_source(
            &self.http_client,
            Network::YouTube,
            &video.url,
            &self.temp_dir,
            |file| async move {
                let session_url = resumable::start_session(
                    &self.http_client,
                    Network::YouTube,
                    &init_url,
                    token,
                    &video.mime_type,
                    file.size,
                    &metadata,
                )
                .await?;
                tracing::debug!(size_bytes = file.size, "YouTube upload session opened");

                resumable::upload_file(
                    &self.http_client,
                    Network::YouTube,
                    &session_url,
                    token,
                    &video.mime_type,
                    &file,
                )
                .await
            },
        )
        .await?;

        let video_id = http::required_str(Network::YouTube, &body, "id")?;
        let permalink = match input.destination.settings.post_type {
            PostType::Short => format!("https://www.youtube.com/shorts/{}", video_id),
            _ => format!("https://www.youtube.com/watch?v={}", video_id),
        };
        Ok(PublishedPost::new(video_id).with_permalink(permalink))
    }

    fn supports_comments(&self) -> bool {
        true
    }

    async fn post_comment(&self, request: &CommentRequest) -> Result<String, PublishError> {
        let token = request.bearer_token()?;
        let response = self
            .http_client
            .post(format!("{}/commentThreads?part=snippet", self.api_base))
            .bearer_auth(token)
            .json(&json!({
                "snippet": {
                    "videoId": request.parent_id,
                    "topLevelComment": {
                        "snippet": { "textOriginal": request.text }
                    }
                }
            }))
            .send()
            .await?;

        let body = http::read_json(Network::YouTube, response).await?;
        http::required_str(Network::YouTube, &body, "id")
    }
}
