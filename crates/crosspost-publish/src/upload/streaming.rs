//! Disk-buffered uploads
//!
//! The source media is streamed into a private temp file so its exact size
//! is known before the upload session is opened, without holding the whole
//! file in memory. The temp file is removed when the guard drops, on every
//! exit path.

use crosspost_core::models::Network;
use futures::StreamExt;
use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::error::PublishError;
use crate::http;

/// A fully downloaded source file
#[derive(Debug, Clone)]
pub struct BufferedFile {
    pub path: PathBuf,
    /// Size measured from the filesystem after the download finished
    pub size: u64,
}

impl BufferedFile {
    /// Request body streaming the file from `offset` to the end
    pub async fn body_from(&self, offset: u64) -> Result<reqwest::Body, PublishError> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        let remaining = self.size.saturating_sub(offset);
        let stream = ReaderStream::new(file.take(remaining));
        Ok(reqwest::Body::wrap_stream(stream))
    }

    pub async fn body(&self) -> Result<reqwest::Body, PublishError> {
        self.body_from(0).await
    }
}

/// Download `source_url` into a temp file under `temp_dir` and run `upload` with it.
///
/// The temp file exists only for the duration of this call.
pub async fn with_buffered_source<T, F, Fut>(
    client: &reqwest::Client,
    network: Network,
    source_url: &str,
    temp_dir: &Path,
    upload: F,
) -> Result<T, PublishError>
where
    F: FnOnce(BufferedFile) -> Fut,
    Fut: Future<Output = Result<T, PublishError>>,
{
    let guard = tempfile::Builder::new()
        .prefix("crosspost-upload-")
        .tempfile_in(temp_dir)?;

    let size = download_to(client, network, source_url, guard.path()).await?;
    if size == 0 {
        return Err(PublishError::Validation(format!(
            "source media {} is empty",
            source_url
        )));
    }

    tracing::debug!(
        network = %network,
        size_bytes = size,
        "Buffered source media to disk"
    );

    let result = upload(BufferedFile {
        path: guard.path().to_path_buf(),
        size,
    })
    .await;

    drop(guard);
    result
}

async fn download_to(
    client: &reqwest::Client,
    network: Network,
    source_url: &str,
    path: &Path,
) -> Result<u64, PublishError> {
    let response = client.get(source_url).send().await?;
    let response = http::ensure_success(network, response).await.map_err(|e| {
        PublishError::Validation(format!("could not fetch media {}: {}", source_url, e))
    })?;

    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    drop(file);

    Ok(tokio::fs::metadata(path).await?.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_upload_sees_exact_size_and_file_is_removed() {
        let mut server = mockito::Server::new_async().await;
        let _source = server
            .mock("GET", "/clip.mp4")
            .with_status(200)
            .with_body(vec![7u8; 4096])
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();

        let seen = with_buffered_source(
            &reqwest::Client::new(),
            Network::TikTok,
            &format!("{}/clip.mp4", server.url()),
            dir.path(),
            |file| async move {
                assert_eq!(std::fs::metadata(&file.path).unwrap().len(), 4096);
                Ok(file.size)
            },
        )
        .await
        .unwrap();

        assert_eq!(seen, 4096);
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_download_failure_leaves_no_temp_file() {
        let mut server = mockito::Server::new_async().await;
        let _source = server
            .mock("GET", "/missing.mp4")
            .with_status(404)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();

        let result: Result<(), _> = with_buffered_source(
            &reqwest::Client::new(),
            Network::TikTok,
            &format!("{}/missing.mp4", server.url()),
            dir.path(),
            |_file| async move { Ok(()) },
        )
        .await;

        assert!(matches!(result, Err(PublishError::Validation(_))));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_leaves_no_temp_file() {
        let mut server = mockito::Server::new_async().await;
        let _source = server
            .mock("GET", "/clip.mp4")
            .with_status(200)
            .with_body(vec![1u8; 128])
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();

        let result: Result<(), _> = with_buffered_source(
            &reqwest::Client::new(),
            Network::TikTok,
            &format!("{}/clip.mp4", server.url()),
            dir.path(),
            |_file| async move {
                Err(PublishError::protocol(Network::TikTok, 500, "upload rejected"))
            },
        )
        .await;

        assert!(matches!(result, Err(PublishError::Protocol { status: 500, .. })));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_empty_source_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _source = server
            .mock("GET", "/empty.mp4")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();

        let result: Result<(), _> = with_buffered_source(
            &reqwest::Client::new(),
            Network::TikTok,
            &format!("{}/empty.mp4", server.url()),
            dir.path(),
            |_file| async move { Ok(()) },
        )
        .await;

        assert!(matches!(result, Err(PublishError::Validation(_))));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_body_from_offset_streams_the_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"0123456789").unwrap();
        let file = BufferedFile { path, size: 10 };

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/upload")
            .match_body(mockito::Matcher::Exact("456789".to_string()))
            .with_status(200)
            .create_async()
            .await;

        let response = reqwest::Client::new()
            .put(format!("{}/upload", server.url()))
            .body(file.body_from(4).await.unwrap())
            .send()
            .await
            .unwrap();

        assert!(response.status().is_success());
        mock.assert_async().await;
    }
}
