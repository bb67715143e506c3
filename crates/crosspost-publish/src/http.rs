//! Response checks shared by the platform adapters
//!
//! Networks report failures in different envelope shapes and some of them do
//! it inside a 2xx response. Everything here turns those shapes into a
//! `PublishError::Protocol` with a readable message.

use crosspost_core::models::Network;
use reqwest::Response;
use serde_json::Value;

use crate::error::PublishError;

const MAX_RAW_ERROR_CHARS: usize = 300;

/// Best human-readable message for an error response body
pub fn extract_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return truncate(body.trim());
    };

    message_from_value(&value).unwrap_or_else(|| truncate(body.trim()))
}

fn message_from_value(value: &Value) -> Option<String> {
    let text = |v: &Value| v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(String::from);

    match value.get("error") {
        // Graph, Google and TikTok: {"error": {"message": ...}}
        Some(Value::Object(inner)) => {
            if let Some(message) = inner.get("message").and_then(text) {
                return Some(message);
            }
        }
        // Bluesky: {"error": "InvalidToken", "message": ...}; OAuth: {"error": "invalid_grant", "error_description": ...}
        Some(Value::String(code)) => {
            if let Some(message) = value
                .get("message")
                .and_then(text)
                .or_else(|| value.get("error_description").and_then(text))
            {
                return Some(format!("{}: {}", code, message));
            }
            return Some(code.clone());
        }
        _ => {}
    }

    if let Some(message) = value.get("error_description").and_then(text) {
        return Some(message);
    }

    // X: {"errors": [{"message": ...}]} or [{"detail": ...}]
    if let Some(errors) = value.get("errors").and_then(Value::as_array) {
        let messages: Vec<String> = errors
            .iter()
            .filter_map(|e| {
                e.get("message")
                    .and_then(text)
                    .or_else(|| e.get("detail").and_then(text))
            })
            .collect();
        if !messages.is_empty() {
            return Some(messages.join("; "));
        }
    }

    value
        .get("detail")
        .and_then(text)
        .or_else(|| value.get("title").and_then(text))
        .or_else(|| value.get("message").and_then(text))
}

fn error_code(value: &Value) -> Option<String> {
    match value.get("error") {
        Some(Value::Object(inner)) => match inner.get("code") {
            Some(Value::String(code)) => Some(code.clone()),
            Some(Value::Number(code)) => Some(code.to_string()),
            _ => None,
        },
        Some(Value::String(code)) => Some(code.clone()),
        _ => None,
    }
}

fn truncate(text: &str) -> String {
    if text.is_empty() {
        return "empty response body".to_string();
    }
    if text.chars().count() <= MAX_RAW_ERROR_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_RAW_ERROR_CHARS).collect();
    format!("{}...", cut)
}

/// Error reported inside a successful response, if any
pub fn envelope_error(network: Network, status: u16, value: &Value) -> Option<PublishError> {
    let failed = match value.get("error") {
        Some(Value::Object(inner)) => match network {
            // TikTok wraps every response and reports success as code "ok"
            Network::TikTok => inner
                .get("code")
                .and_then(Value::as_str)
                .is_some_and(|code| code != "ok"),
            _ => true,
        },
        Some(Value::String(_)) => true,
        _ => {
            network == Network::X
                && value.get("data").is_none()
                && value.get("errors").is_some_and(|e| e.is_array())
        }
    };

    if !failed {
        return None;
    }

    Some(PublishError::Protocol {
        network,
        status,
        code: error_code(value),
        message: message_from_value(value).unwrap_or_else(|| "unknown error".to_string()),
    })
}

/// Protocol error built from a failed response's status and body
pub async fn error_from_response(network: Network, response: Response) -> PublishError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let code = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| error_code(&v));

    PublishError::Protocol {
        network,
        status: status.as_u16(),
        code,
        message: extract_error_message(&body),
    }
}

/// Fail on a non-2xx status, reading the body for the error message
pub async fn ensure_success(network: Network, response: Response) -> Result<Response, PublishError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(error_from_response(network, response).await)
}

/// Check the status, parse the JSON body and reject error envelopes
pub async fn read_json(network: Network, response: Response) -> Result<Value, PublishError> {
    let response = ensure_success(network, response).await?;
    let status = response.status().as_u16();
    let body = response.text().await?;

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    let value: Value = serde_json::from_str(&body).map_err(|e| {
        PublishError::protocol(
            network,
            status,
            format!("unreadable response ({}): {}", e, truncate(&body)),
        )
    })?;

    match envelope_error(network, status, &value) {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

/// Required string field of a response, tolerating numeric ids
pub fn required_str(network: Network, value: &Value, field: &str) -> Result<String, PublishError> {
    match value.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(PublishError::protocol(
            network,
            200,
            format!("response is missing '{}'", field),
        )),
    }
}
