//! Upload strategies shared by the platform adapters

pub mod resumable;
pub mod signing;
pub mod streaming;

pub use streaming::{with_buffered_source, BufferedFile};

use bytes::Bytes;
use crosspost_core::models::Network;

use crate::error::PublishError;
use crate::http;

/// Download a small source file (images) fully into memory
pub async fn fetch_bytes(
    client: &reqwest::Client,
    network: Network,
    url: &str,
    max_bytes: usize,
) -> Result<Bytes, PublishError> {
    let response = client.get(url).send().await?;
    let response = http::ensure_success(network, response).await.map_err(|e| {
        PublishError::Validation(format!("could not fetch media {}: {}", url, e))
    })?;
    let bytes = response.bytes().await?;

    if bytes.is_empty() {
        return Err(PublishError::Validation(format!("media {} is empty", url)));
    }
    if bytes.len() > max_bytes {
        return Err(PublishError::Validation(format!(
            "media {} is {} bytes, {} accepts at most {}",
            url,
            bytes.len(),
            network,
            max_bytes
        )));
    }
    Ok(bytes)
}
