//! Platform adapter implementations

pub mod bluesky;
pub mod facebook;
mod graph;
pub mod instagram;
pub mod tiktok;
pub mod x;
pub mod youtube;

pub use bluesky::BlueskyAdapter;
pub use facebook::FacebookAdapter;
pub use instagram::InstagramAdapter;
pub use tiktok::TikTokAdapter;
pub use x::XAdapter;
pub use youtube::YouTubeAdapter;

use crosspost_core::{Config, PlatformEndpoints};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::poller::PollPolicy;
use crate::registry::AdapterRegistry;

/// Shared construction parameters for the adapters
#[derive(Debug, Clone)]
pub struct PlatformContext {
    pub http_client: reqwest::Client,
    pub endpoints: PlatformEndpoints,
    pub poll_policy: PollPolicy,
    pub temp_dir: PathBuf,
}

impl PlatformContext {
    pub fn from_config(http_client: reqwest::Client, config: &Config) -> Self {
        Self {
            http_client,
            endpoints: config.endpoints.clone(),
            poll_policy: PollPolicy::new(
                config.publish.container_poll_max_attempts,
                Duration::from_millis(config.publish.container_poll_interval_ms),
            ),
            temp_dir: config.publish.upload_temp_dir.clone(),
        }
    }
}

/// Register an adapter for every supported network
pub async fn register_all(registry: &AdapterRegistry, ctx: &PlatformContext) {
    registry
        .register(Arc::new(FacebookAdapter::new(
            ctx.http_client.clone(),
            ctx.endpoints.graph_api_base.clone(),
        )))
        .await;
    registry
        .register(Arc::new(InstagramAdapter::new(
            ctx.http_client.clone(),
            ctx.endpoints.graph_api_base.clone(),
            ctx.poll_policy,
        )))
        .await;
    registry
        .register(Arc::new(YouTubeAdapter::new(
            ctx.http_client.clone(),
            ctx.endpoints.youtube_api_base.clone(),
            ctx.endpoints.youtube_upload_base.clone(),
            ctx.temp_dir.clone(),
        )))
        .await;
    registry
        .register(Arc::new(TikTokAdapter::new(
            ctx.http_client.clone(),
            ctx.endpoints.tiktok_api_base.clone(),
            ctx.temp_dir.clone(),
            ctx.poll_policy,
        )))
        .await;
    registry
        .register(Arc::new(XAdapter::new(
            ctx.http_client.clone(),
            ctx.endpoints.x_api_base.clone(),
            ctx.endpoints.x_upload_base.clone(),
        )))
        .await;
    registry
        .register(Arc::new(BlueskyAdapter::new(
            ctx.http_client.clone(),
            ctx.endpoints.bluesky_pds_base.clone(),
        )))
        .await;

    tracing::info!(networks = ?registry.networks().await, "Registered platform adapters");
}

/// Length of `text` as the networks count it for limits
pub(crate) fn text_length(text: &str) -> usize {
    text.chars().count()
}
