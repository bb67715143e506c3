use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// External networks a destination can point at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Facebook,
    Instagram,
    #[serde(rename = "youtube")]
    YouTube,
    #[serde(rename = "tiktok")]
    TikTok,
    X,
    Bluesky,
}

impl Network {
    pub const ALL: [Network; 6] = [
        Network::Facebook,
        Network::Instagram,
        Network::YouTube,
        Network::TikTok,
        Network::X,
        Network::Bluesky,
    ];

    /// Networks authorizing requests with signed parameters instead of a bearer token
    pub fn uses_signed_requests(&self) -> bool {
        matches!(self, Network::X)
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Network::Facebook => write!(f, "facebook"),
            Network::Instagram => write!(f, "instagram"),
            Network::YouTube => write!(f, "youtube"),
            Network::TikTok => write!(f, "tiktok"),
            Network::X => write!(f, "x"),
            Network::Bluesky => write!(f, "bluesky"),
        }
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(Network::Facebook),
            "instagram" => Ok(Network::Instagram),
            "youtube" => Ok(Network::YouTube),
            "tiktok" => Ok(Network::TikTok),
            "x" | "twitter" => Ok(Network::X),
            "bluesky" => Ok(Network::Bluesky),
            _ => Err(anyhow::anyhow!("Invalid network: {}", s)),
        }
    }
}

/// Secret bundle for networks using OAuth 1.0a request signing
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl Debug for SignedCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SignedCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[redacted]")
            .field("access_token", &"[redacted]")
            .field("access_token_secret", &"[redacted]")
            .finish()
    }
}

/// Stored authorization material for a destination
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    Bearer { access_token: String },
    Signed(SignedCredentials),
}

impl Credentials {
    /// Build credentials from the raw columns the credential store keeps.
    ///
    /// Returns `Ok(None)` when nothing usable is stored. A secret bundle that
    /// is present but incomplete is an error so it surfaces when the
    /// destination is loaded rather than halfway through a request.
    pub fn from_stored(
        network: Network,
        access_token: Option<&str>,
        secret_bundle: Option<&serde_json::Value>,
    ) -> Result<Option<Self>, AppError> {
        if network.uses_signed_requests() {
            let Some(bundle) = secret_bundle.filter(|b| !b.is_null()) else {
                return Ok(None);
            };
            let signed: SignedCredentials =
                serde_json::from_value(bundle.clone()).map_err(|e| {
                    AppError::InvalidCredentials(format!(
                        "{} secret bundle is incomplete: {}",
                        network, e
                    ))
                })?;
            let fields = [
                ("consumer_key", &signed.consumer_key),
                ("consumer_secret", &signed.consumer_secret),
                ("access_token", &signed.access_token),
                ("access_token_secret", &signed.access_token_secret),
            ];
            if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
                return Err(AppError::InvalidCredentials(format!(
                    "{} secret bundle has an empty {}",
                    network, name
                )));
            }
            return Ok(Some(Credentials::Signed(signed)));
        }

        Ok(access_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Credentials::Bearer {
                access_token: t.to_string(),
            }))
    }

    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            Credentials::Bearer { access_token } => Some(access_token),
            Credentials::Signed(_) => None,
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Credentials::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("access_token", &"[redacted]")
                .finish(),
            Credentials::Signed(signed) => signed.fmt(f),
        }
    }
}

/// Network-specific post subtype
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Post,
    Story,
    Reel,
    Short,
}

/// Per-destination publish configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PublishSettings {
    pub post_type: PostType,
    /// Network privacy level (e.g. "public", "PUBLIC_TO_EVERYONE")
    pub privacy: Option<String>,
    pub disable_comments: bool,
    pub disable_duet: bool,
    pub disable_stitch: bool,
    /// Publish several media as one carousel even when the network would default otherwise
    pub carousel: bool,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub category_id: Option<String>,
    /// Comment posted on the new object once it is live
    pub first_comment: Option<String>,
    /// Personal data server for federated networks
    pub pds_host: Option<String>,
}

impl PublishSettings {
    pub fn first_comment_text(&self) -> Option<&str> {
        self.first_comment
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// A previously-authorized account on one external network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub network: Network,
    /// The network's own identifier for the account (page id, user id, ...)
    pub account_id: String,
    pub display_name: Option<String>,
    #[serde(skip_serializing)]
    pub credentials: Option<Credentials>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub settings: PublishSettings,
}

impl Destination {
    /// Replace the bearer token after a successful refresh
    pub fn apply_refreshed_token(
        &mut self,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) {
        self.credentials = Some(Credentials::Bearer { access_token });
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.token_expires_at = expires_at;
    }
}
