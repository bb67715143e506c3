//! Wiring of repositories, adapters and the publish coordinator

use anyhow::{Context, Result};
use crosspost_core::{Config, PublishNotifier};
use crosspost_db::{
    ContentRepository, DestinationRepository, OutcomeRepository, PublishDestinationRepository,
    WebhookTargetRepository,
};
use crosspost_infra::{WebhookService, WebhookServiceConfig};
use crosspost_publish::{
    register_all, AdapterRegistry, FirstCommentPolicy, MediaResolver, PlatformContext,
    PublishCoordinator, SideEffects, TokenRefresher,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

pub async fn initialize_services(config: &Config, pool: PgPool) -> Result<Arc<AppState>> {
    let publish = &config.publish;

    tokio::fs::create_dir_all(&publish.upload_temp_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create upload temp dir {}",
                publish.upload_temp_dir.display()
            )
        })?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(publish.http_timeout_secs))
        .user_agent(concat!("crosspost/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client for platform adapters")?;

    let destinations: Arc<dyn PublishDestinationRepository> =
        Arc::new(DestinationRepository::new(pool.clone()));

    let registry = AdapterRegistry::new();
    register_all(
        &registry,
        &PlatformContext::from_config(http_client.clone(), config),
    )
    .await;

    let notifier: Arc<dyn PublishNotifier> = Arc::new(WebhookService::new(
        Arc::new(WebhookTargetRepository::new(pool.clone())),
        WebhookServiceConfig::from_config(publish),
    )?);

    let side_effects = SideEffects::new(
        registry.clone(),
        notifier,
        FirstCommentPolicy::from_config(publish),
    );

    let token_refresher =
        TokenRefresher::from_config(http_client, destinations.clone(), &config.oauth);

    let coordinator = PublishCoordinator::new(
        Arc::new(ContentRepository::new(pool.clone())),
        Arc::new(OutcomeRepository::new(pool)),
        destinations,
        registry,
        MediaResolver::from_config(publish),
        token_refresher,
        side_effects,
        publish.defer_side_effects,
    );

    tracing::info!(
        defer_side_effects = publish.defer_side_effects,
        "Publish services initialized"
    );

    Ok(Arc::new(AppState::new(Arc::new(coordinator))))
}
