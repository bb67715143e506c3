//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Every request gets a fresh nonce and timestamp. Form and query parameters
//! are part of the signature base string; multipart and JSON bodies are not.

use base64::Engine;
use crosspost_core::models::SignedCredentials;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distr::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters stay literal, everything else is escaped
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const NONCE_LEN: usize = 32;

pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

pub fn generate_nonce() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

/// `Authorization` header value for one request
pub fn authorization_header(
    credentials: &SignedCredentials,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
) -> String {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    authorization_header_with(
        credentials,
        method,
        url,
        params,
        &generate_nonce(),
        &timestamp,
    )
}

/// Deterministic variant of [`authorization_header`]
pub fn authorization_header_with(
    credentials: &SignedCredentials,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> String {
    let mut oauth_params = vec![
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", credentials.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];

    let mut all_params: Vec<(&str, &str)> = oauth_params.clone();
    all_params.extend_from_slice(params);
    let signature = sign(credentials, method, url, &all_params);

    oauth_params.push(("oauth_signature", signature.as_str()));
    oauth_params.sort();

    let fields: Vec<String> = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect();
    format!("OAuth {}", fields.join(", "))
}

/// Base64 HMAC-SHA1 signature over the canonical base string.
///
/// `params` must contain the oauth_* protocol parameters (without the
/// signature) plus every form parameter. Query parameters of `url` are
/// folded in automatically.
pub fn sign(
    credentials: &SignedCredentials,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
) -> String {
    let (base_url, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };

    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    if let Some(query) = query {
        encoded.extend(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (percent_encode(&k), percent_encode(&v))),
        );
    }
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(base_url),
        percent_encode(&param_string)
    );
    let signing_key = format!(
        "{}&{}",
        percent_encode(&credentials.consumer_secret),
        percent_encode(&credentials.access_token_secret)
    );

    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(base_string.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}
