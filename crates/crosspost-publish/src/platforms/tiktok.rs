//! TikTok adapter (disk-buffered FILE_UPLOAD)
//!
//! The video is buffered to disk so the init call can declare its exact
//! size, uploaded as a single chunk, and then the publish status is polled.
//! Every TikTok response carries an `error` object whose code is "ok" on
//! success.

use async_trait::async_trait;
use crosspost_core::models::Network;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::text_length;
use crate::adapter::{PlatformAdapter, PublishInput, PublishedPost};
use crate::error::PublishError;
use crate::http;
use crate::poller::{await_completion, PollPolicy, PollStatus};
use crate::upload::{with_buffered_source, BufferedFile};

const MAX_CAPTION_CHARS: usize = 2_200;
const DEFAULT_PRIVACY: &str = "PUBLIC_TO_EVERYONE";
const PRIVATE_PRIVACY: &str = "SELF_ONLY";

#[derive(Debug, Deserialize)]
struct InitData {
    publish_id: String,
    upload_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    status: String,
    #[serde(default)]
    fail_reason: Option<String>,
    #[serde(default, alias = "publicly_available_post_id")]
    publicaly_available_post_id: Option<Vec<Value>>,
}

#[derive(Debug, Clone)]
pub struct TikTokAdapter {
    http_client: reqwest::Client,
    api_base: String,
    temp_dir: PathBuf,
    poll_policy: PollPolicy,
}

impl TikTokAdapter {
    pub fn new(
        http_client: reqwest::Client,
        api_base: String,
        temp_dir: PathBuf,
        poll_policy: PollPolicy,
    ) -> Self {
        Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            temp_dir,
            poll_policy,
        }
    }

    async fn init_upload(
        &self,
        token: &str,
        input: &PublishInput,
        privacy: &str,
        size: u64,
    ) -> Result<InitData, PublishError> {
        let settings = &input.destination.settings;
        let response = self
            .http_client
            .post(format!("{}/v2/post/publish/video/init/", self.api_base))
            .bearer_auth(token)
            .json(&json!({
                "post_info": {
                    "title": input.text,
                    "privacy_level": privacy,
                    "disable_duet": settings.disable_duet,
                    "disable_comment": settings.disable_comments,
                    "disable_stitch": settings.disable_stitch,
                },
                "source_info": {
                    "source": "FILE_UPLOAD",
                    "video_size": size,
                    "chunk_size": size,
                    "total_chunk_count": 1,
                },
            }))
            .send()
            .await?;

        let body = http::read_json(Network::TikTok, response).await?;
        data_of(body)
    }

    /// Init with the requested privacy, falling back once to SELF_ONLY for unaudited apps
    async fn init_with_fallback(
        &self,
        token: &str,
        input: &PublishInput,
        size: u64,
    ) -> Result<InitData, PublishError> {
        let privacy = input
            .destination
            .settings
            .privacy
            .as_deref()
            .unwrap_or(DEFAULT_PRIVACY);

        match self.init_upload(token, input, privacy, size).await {
            Err(e) if privacy != PRIVATE_PRIVACY && is_unaudited_client_error(&e) => {
                tracing::warn!(
                    error = %e,
                    "TikTok app is unaudited, retrying as a private post"
                );
                self.init_upload(token, input, PRIVATE_PRIVACY, size).await
            }
            other => other,
        }
    }

    async fn put_file(
        &self,
        upload_url: &str,
        mime_type: &str,
        file: &BufferedFile,
    ) -> Result<(), PublishError> {
        let response = self
            .http_client
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .header(reqwest::header::CONTENT_LENGTH, file.size.to_string())
            .header(
                reqwest::header::CONTENT_RANGE,
                format!("bytes 0-{}/{}", file.size - 1, file.size),
            )
            .body(file.body().await?)
            .send()
            .await?;

        http::ensure_success(Network::TikTok, response).await?;
        Ok(())
    }

    async fn fetch_status(&self, token: &str, publish_id: &str) -> Result<StatusData, PublishError> {
        let response = self
            .http_client
            .post(format!("{}/v2/post/publish/status/fetch/", self.api_base))
            .bearer_auth(token)
            .json(&json!({ "publish_id": publish_id }))
            .send()
            .await?;

        let body = http::read_json(Network::TikTok, response).await?;
        data_of(body)
    }

    async fn wait_for_publish(&self, token: &str, publish_id: &str) -> Result<String, PublishError> {
        let outcome = await_completion(publish_id, self.poll_policy, move || async move {
            let status = self.fetch_status(token, publish_id).await?;
            Ok(match status.status.as_str() {
                "PUBLISH_COMPLETE" => PollStatus::Ready(
                    status
                        .publicaly_available_post_id
                        .as_ref()
                        .and_then(|ids| ids.first())
                        .map(|id| match id {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .unwrap_or_else(|| publish_id.to_string()),
                ),
                "FAILED" => PollStatus::Failed(
                    status
                        .fail_reason
                        .unwrap_or_else(|| "publish failed".to_string()),
                ),
                _ => PollStatus::Pending,
            })
        })
        .await?;

        outcome.into_result(&format!("TikTok publish {}", publish_id))
    }
}

fn data_of<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, PublishError> {
    let data = body.get("data").cloned().unwrap_or(Value::Null);
    serde_json::from_value(data).map_err(|e| {
        PublishError::protocol(Network::TikTok, 200, format!("unexpected response: {}", e))
    })
}

fn is_unaudited_client_error(err: &PublishError) -> bool {
    match err {
        PublishError::Protocol { code, message, .. } => {
            let message = message.to_lowercase();
            code.as_deref()
                .is_some_and(|c| c.starts_with("unaudited_client"))
                || message.contains("unaudited")
                || message.contains("only post to private")
        }
        _ => false,
    }
}

#[async_trait]
impl PlatformAdapter for TikTokAdapter {
    fn network(&self) -> Network {
        Network::TikTok
    }

    fn validate(&self, input: &PublishInput) -> Result<(), PublishError> {
        if input.videos().count() != 1 || input.media.len() != 1 {
            return Err(PublishError::Validation(
                "TikTok posts require exactly one video".to_string(),
            ));
        }
        if text_length(&input.text) > MAX_CAPTION_CHARS {
            return Err(PublishError::Validation(format!(
                "TikTok captions are limited to {} characters",
                MAX_CAPTION_CHARS
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, input), fields(network = "tiktok", open_id = %input.destination.account_id))]
    async fn publish(&self, input: &PublishInput) -> Result<PublishedPost, PublishError> {
        let token = input.bearer_token()?;
        let video = input
            .videos()
            .next()
            .ok_or_else(|| PublishError::Validation("no video attached".to_string()))?;

        let publish_id = with_buffered_source(
            &self.http_client,
            Network::TikTok,
            &video.url,
            &self.temp_dir,
            |file| async move {
                let init = self.init_with_fallback(token, input, file.size).await?;
                let upload_url = init.upload_url.ok_or_else(|| {
                    PublishError::protocol(Network::TikTok, 200, "init response has no upload_url")
                })?;
                self.put_file(&upload_url, &video.mime_type, &file).await?;
                tracing::debug!(publish_id = %init.publish_id, size_bytes = file.size, "TikTok upload finished");
                Ok(init.publish_id)
            },
        )
        .await?;

        let post_id = self.wait_for_publish(token, &publish_id).await?;
        Ok(PublishedPost::new(post_id))
    }
}
