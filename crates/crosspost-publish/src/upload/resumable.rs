//! Resumable upload sessions (Google upload protocol)
//!
//! The session is opened with the total size and content type, then the
//! binary is sent in one PUT. If that PUT is interrupted the server is asked
//! how many bytes it holds and the remainder is sent with an explicit
//! `Content-Range`.

use crosspost_core::models::Network;
use reqwest::StatusCode;
use serde_json::Value;

use super::streaming::BufferedFile;
use crate::error::PublishError;
use crate::http;

const MAX_RESUME_ATTEMPTS: u32 = 3;
/// Google's "Resume Incomplete"
const RESUME_INCOMPLETE: u16 = 308;

enum SessionState {
    Complete(Value),
    ResumeAt(u64),
}

/// Open an upload session and return its URL
pub async fn start_session(
    client: &reqwest::Client,
    network: Network,
    init_url: &str,
    access_token: &str,
    content_type: &str,
    content_length: u64,
    metadata: &Value,
) -> Result<String, PublishError> {
    let response = client
        .post(init_url)
        .bearer_auth(access_token)
        .header("X-Upload-Content-Length", content_length.to_string())
        .header("X-Upload-Content-Type", content_type)
        .json(metadata)
        .send()
        .await?;

    let response = http::ensure_success(network, response).await?;
    let status = response.status().as_u16();

    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .ok_or_else(|| {
            PublishError::protocol(network, status, "upload session response has no Location")
        })
}

/// Send the whole file to an open session, resuming after interruptions
pub async fn upload_file(
    client: &reqwest::Client,
    network: Network,
    session_url: &str,
    access_token: &str,
    content_type: &str,
    file: &BufferedFile,
) -> Result<Value, PublishError> {
    let mut offset = 0u64;
    let mut resumes = 0u32;

    loop {
        // Once every byte is acknowledged only the session query can finalize it
        let interruption = if offset < file.size {
            let sent =
                put_from(client, session_url, access_token, content_type, file, offset).await;
            match sent {
                Ok(response) if response.status().is_success() => {
                    return http::read_json(network, response).await;
                }
                Ok(response) if is_interruption(response.status()) => {
                    http::error_from_response(network, response).await
                }
                Ok(response) => return Err(http::error_from_response(network, response).await),
                Err(e) => e,
            }
        } else {
            PublishError::protocol(
                network,
                RESUME_INCOMPLETE,
                "upload session holds every byte but is not finalized",
            )
        };

        if resumes >= MAX_RESUME_ATTEMPTS {
            return Err(interruption);
        }
        resumes += 1;

        tracing::warn!(
            network = %network,
            offset,
            attempt = resumes,
            error = %interruption,
            "Upload interrupted, querying session"
        );

        match query_session(client, network, session_url, access_token, file.size).await? {
            SessionState::Complete(body) => return Ok(body),
            SessionState::ResumeAt(next) => offset = next,
        }
    }
}

async fn put_from(
    client: &reqwest::Client,
    session_url: &str,
    access_token: &str,
    content_type: &str,
    file: &BufferedFile,
    offset: u64,
) -> Result<reqwest::Response, PublishError> {
    let mut request = client
        .put(session_url)
        .bearer_auth(access_token)
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .header(reqwest::header::CONTENT_LENGTH, (file.size - offset).to_string());

    if offset > 0 {
        request = request.header(
            reqwest::header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", offset, file.size - 1, file.size),
        );
    }

    Ok(request.body(file.body_from(offset).await?).send().await?)
}

async fn query_session(
    client: &reqwest::Client,
    network: Network,
    session_url: &str,
    access_token: &str,
    total: u64,
) -> Result<SessionState, PublishError> {
    let response = client
        .put(session_url)
        .bearer_auth(access_token)
        .header(reqwest::header::CONTENT_LENGTH, "0")
        .header(reqwest::header::CONTENT_RANGE, format!("bytes */{}", total))
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        return Ok(SessionState::Complete(http::read_json(network, response).await?));
    }
    if status.as_u16() != RESUME_INCOMPLETE {
        return Err(http::error_from_response(network, response).await);
    }

    // "Range: bytes=0-N" acknowledges N+1 bytes; no header means nothing was stored
    let next = response
        .headers()
        .get(reqwest::header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|range| range.rsplit_once('-'))
        .and_then(|(_, end)| end.trim().parse::<u64>().ok())
        .map(|end| end + 1)
        .unwrap_or(0);

    Ok(SessionState::ResumeAt(next.min(total)))
}

fn is_interruption(status: StatusCode) -> bool {
    status.is_server_error()
        || status.as_u16() == RESUME_INCOMPLETE
        || status == StatusCode::REQUEST_TIMEOUT
}
