//! Minimal Graph API client shared by the Facebook and Instagram adapters

use crosspost_core::models::Network;
use serde_json::Value;

use crate::error::PublishError;
use crate::http;

#[derive(Debug, Clone)]
pub(crate) struct GraphClient {
    http_client: reqwest::Client,
    base_url: String,
    network: Network,
}

impl GraphClient {
    pub(crate) fn new(http_client: reqwest::Client, base_url: String, network: Network) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            network,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Form-encoded POST; the access token travels as a form field
    pub(crate) async fn post(
        &self,
        path: &str,
        access_token: &str,
        params: &[(&str, String)],
    ) -> Result<Value, PublishError> {
        let mut form: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        form.push(("access_token", access_token));

        let response = self
            .http_client
            .post(self.url(path))
            .form(&form)
            .send()
            .await?;

        http::read_json(self.network, response).await
    }

    pub(crate) async fn get(
        &self,
        path: &str,
        access_token: &str,
        fields: &str,
    ) -> Result<Value, PublishError> {
        let response = self
            .http_client
            .get(self.url(path))
            .query(&[("fields", fields), ("access_token", access_token)])
            .send()
            .await?;

        http::read_json(self.network, response).await
    }

    /// Object id from a creation response
    pub(crate) fn id(&self, value: &Value) -> Result<String, PublishError> {
        http::required_str(self.network, value, "id")
    }
}
