//! Bluesky adapter (AT Protocol XRPC)

use async_trait::async_trait;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use crosspost_core::models::Network;
use serde_json::{json, Value};

use super::text_length;
use crate::adapter::{PlatformAdapter, PublishInput, PublishedPost};
use crate::error::PublishError;
use crate::http;
use crate::upload::fetch_bytes;

const MAX_TEXT_CHARS: usize = 300;
const MAX_IMAGES: usize = 4;
const MAX_BLOB_BYTES: usize = 1_000_000;
const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Debug, Clone)]
pub struct BlueskyAdapter {
    http_client: reqwest::Client,
    pds_base: String,
}

impl BlueskyAdapter {
    pub fn new(http_client: reqwest::Client, pds_base: String) -> Self {
        Self {
            http_client,
            pds_base: pds_base.trim_end_matches('/').to_string(),
        }
    }

    fn pds_for(&self, input: &PublishInput) -> String {
        match input
            .destination
            .settings
            .pds_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
        {
            Some(host) if host.contains("://") => host.trim_end_matches('/').to_string(),
            Some(host) => format!("https://{}", host.trim_end_matches('/')),
            None => self.pds_base.clone(),
        }
    }

    async fn upload_blob(
        &self,
        pds: &str,
        token: &str,
        url: &str,
        mime_type: &str,
    ) -> Result<Value, PublishError> {
        let bytes = fetch_bytes(&self.http_client, Network::Bluesky, url, MAX_BLOB_BYTES).await?;

        let response = self
            .http_client
            .post(format!("{}/xrpc/com.atproto.repo.uploadBlob", pds))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await?;

        let body = http::read_json(Network::Bluesky, response).await?;
        body.get("blob").cloned().ok_or_else(|| {
            PublishError::protocol(Network::Bluesky, 200, "uploadBlob response has no blob")
        })
    }
}

/// Account DID from the `sub` claim of the session token.
///
/// The token is not verified here; the PDS does that on every call.
fn did_from_token(token: &str) -> Result<String, PublishError> {
    let invalid = || PublishError::Connection("Bluesky session token is malformed".to_string());

    let payload = token.split('.').nth(1).ok_or_else(invalid)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| invalid())?;
    let claims: Value = serde_json::from_slice(&decoded).map_err(|_| invalid())?;

    claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|sub| sub.starts_with("did:"))
        .map(String::from)
        .ok_or_else(invalid)
}

fn permalink(did: &str, uri: &str) -> Option<String> {
    let rkey = uri.rsplit('/').next().filter(|k| !k.is_empty())?;
    Some(format!("https://bsky.app/profile/{}/post/{}", did, rkey))
}

#[async_trait]
impl PlatformAdapter for BlueskyAdapter {
    fn network(&self) -> Network {
        Network::Bluesky
    }

    fn validate(&self, input: &PublishInput) -> Result<(), PublishError> {
        if input.has_video() {
            return Err(PublishError::Validation(
                "video posts are not supported for Bluesky".to_string(),
            ));
        }
        if input.images().count() > MAX_IMAGES {
            return Err(PublishError::Validation(format!(
                "Bluesky posts accept at most {} images",
                MAX_IMAGES
            )));
        }
        if input.text.trim().is_empty() && input.media.is_empty() {
            return Err(PublishError::Validation(
                "Bluesky posts need text or at least one image".to_string(),
            ));
        }
        if text_length(&input.text) > MAX_TEXT_CHARS {
            return Err(PublishError::Validation(format!(
                "Bluesky posts are limited to {} characters",
                MAX_TEXT_CHARS
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, input), fields(network = "bluesky"))]
    async fn publish(&self, input: &PublishInput) -> Result<PublishedPost, PublishError> {
        let token = input.bearer_token()?;
        let did = did_from_token(token)?;
        let pds = self.pds_for(input);

        let mut images = Vec::new();
        for image in input.images() {
            let blob = self
                .upload_blob(&pds, token, &image.url, &image.mime_type)
                .await?;
            images.push(json!({ "alt": "", "image": blob }));
        }

        let mut record = json!({
            "$type": POST_COLLECTION,
            "text": input.text,
            "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        if !images.is_empty() {
            record["embed"] = json!({
                "$type": "app.bsky.embed.images",
                "images": images,
            });
        }

        let response = self
            .http_client
            .post(format!("{}/xrpc/com.atproto.repo.createRecord", pds))
            .bearer_auth(token)
            .json(&json!({
                "repo": did,
                "collection": POST_COLLECTION,
                "record": record,
            }))
            .send()
            .await?;

        let body = http::read_json(Network::Bluesky, response).await?;
        let uri = http::required_str(Network::Bluesky, &body, "uri")?;

        let post = PublishedPost::new(uri.clone());
        Ok(match permalink(&did, &uri) {
            Some(link) => post.with_permalink(link),
            None => post,
        })
    }
}
