pub mod content;
pub mod destination;
pub mod outcome;
pub mod webhook;

pub use content::ContentRepository;
pub use destination::DestinationRepository;
pub use outcome::OutcomeRepository;
pub use webhook::WebhookTargetRepository;

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::path::Path;

/// Apply the schema migrations shipped with this crate
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(())
}
