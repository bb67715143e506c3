//! Just-in-time refresh of bearer tokens before a publish call

use chrono::{Duration as ChronoDuration, Utc};
use crosspost_core::models::{Credentials, Destination, Network};
use crosspost_core::OAuthClientConfig;
use crosspost_db::PublishDestinationRepository;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PublishError;
use crate::http;

/// OAuth token endpoint of one network
#[derive(Clone)]
pub struct RefreshEndpoint {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Form field carrying the client id ("client_id", or "client_key" on TikTok)
    pub client_id_field: &'static str,
}

impl std::fmt::Debug for RefreshEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshEndpoint")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

pub struct TokenRefresher {
    http_client: reqwest::Client,
    destinations: Arc<dyn PublishDestinationRepository>,
    endpoints: HashMap<Network, RefreshEndpoint>,
}

impl TokenRefresher {
    pub fn new(
        http_client: reqwest::Client,
        destinations: Arc<dyn PublishDestinationRepository>,
    ) -> Self {
        Self {
            http_client,
            destinations,
            endpoints: HashMap::new(),
        }
    }

    pub fn with_endpoint(mut self, network: Network, endpoint: RefreshEndpoint) -> Self {
        self.endpoints.insert(network, endpoint);
        self
    }

    /// Register the endpoints whose client credentials are configured
    pub fn from_config(
        http_client: reqwest::Client,
        destinations: Arc<dyn PublishDestinationRepository>,
        oauth: &OAuthClientConfig,
    ) -> Self {
        let mut refresher = Self::new(http_client, destinations);

        if let (Some(id), Some(secret)) = (&oauth.google_client_id, &oauth.google_client_secret) {
            refresher = refresher.with_endpoint(
                Network::YouTube,
                RefreshEndpoint {
                    token_url: oauth.google_token_url.clone(),
                    client_id: id.clone(),
                    client_secret: secret.clone(),
                    client_id_field: "client_id",
                },
            );
        }

        if let (Some(key), Some(secret)) = (&oauth.tiktok_client_key, &oauth.tiktok_client_secret) {
            refresher = refresher.with_endpoint(
                Network::TikTok,
                RefreshEndpoint {
                    token_url: oauth.tiktok_token_url.clone(),
                    client_id: key.clone(),
                    client_secret: secret.clone(),
                    client_id_field: "client_key",
                },
            );
        }

        refresher
    }

    /// Credentials to use for the next request to `destination`'s network.
    ///
    /// Makes one refresh call whenever the destination holds a refresh token
    /// and its network has a refresh endpoint. A failed refresh is logged and
    /// the stored token is used as is.
    #[tracing::instrument(skip(self, destination), fields(destination_id = %destination.id, network = %destination.network))]
    pub async fn ensure(&self, destination: &mut Destination) -> Result<Credentials, PublishError> {
        let credentials = destination.credentials.clone().ok_or_else(|| {
            PublishError::Connection(format!(
                "{} account {} has no stored credentials",
                destination.network, destination.account_id
            ))
        })?;

        if !matches!(credentials, Credentials::Bearer { .. }) {
            return Ok(credentials);
        }

        let Some(refresh_token) = destination.refresh_token.clone() else {
            return Ok(credentials);
        };
        let Some(endpoint) = self.endpoints.get(&destination.network) else {
            return Ok(credentials);
        };

        match self
            .request_refresh(destination.network, endpoint, &refresh_token)
            .await
        {
            Ok(token) => {
                let expires_at = token
                    .expires_in
                    .map(|secs| Utc::now() + ChronoDuration::seconds(secs));
                let rotated = token.refresh_token.filter(|t| !t.is_empty());

                if let Err(e) = self
                    .destinations
                    .save_refreshed_token(
                        destination.id,
                        &token.access_token,
                        rotated.as_deref(),
                        expires_at,
                    )
                    .await
                {
                    tracing::error!(error = %e, "Failed to persist refreshed token");
                }

                destination.apply_refreshed_token(token.access_token.clone(), rotated, expires_at);
                tracing::info!("Refreshed access token");

                Ok(Credentials::Bearer {
                    access_token: token.access_token,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, using stored token");
                Ok(credentials)
            }
        }
    }

    async fn request_refresh(
        &self,
        network: Network,
        endpoint: &RefreshEndpoint,
        refresh_token: &str,
    ) -> Result<TokenResponse, PublishError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            (endpoint.client_id_field, endpoint.client_id.as_str()),
            ("client_secret", endpoint.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&endpoint.token_url)
            .form(&form)
            .send()
            .await?;

        let body = http::read_json(network, response).await?;
        serde_json::from_value(body).map_err(|e| {
            PublishError::protocol(network, 200, format!("unexpected token response: {}", e))
        })
    }
}
