use chrono::{DateTime, Utc};
use crosspost_core::models::{Credentials, Destination, Network, PublishSettings};
use crosspost_core::AppError;
use sqlx::types::{Json, JsonValue};
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

#[derive(FromRow)]
struct DestinationRow {
    id: Uuid,
    channel_id: Uuid,
    network: String,
    account_id: String,
    display_name: Option<String>,
    access_token: Option<String>,
    secret_bundle: Option<JsonValue>,
    refresh_token: Option<String>,
    token_expires_at: Option<DateTime<Utc>>,
    settings: Json<PublishSettings>,
}

impl TryFrom<DestinationRow> for Destination {
    type Error = AppError;

    fn try_from(row: DestinationRow) -> Result<Self, Self::Error> {
        let network = row
            .network
            .parse::<Network>()
            .map_err(|e| AppError::Internal(format!("destination {}: {}", row.id, e)))?;
        let credentials = Credentials::from_stored(
            network,
            row.access_token.as_deref(),
            row.secret_bundle.as_ref(),
        )?;

        Ok(Destination {
            id: row.id,
            channel_id: row.channel_id,
            network,
            account_id: row.account_id,
            display_name: row.display_name,
            credentials,
            refresh_token: row.refresh_token.filter(|t| !t.trim().is_empty()),
            token_expires_at: row.token_expires_at,
            settings: row.settings.0,
        })
    }
}

/// Repository for authorized destination accounts
#[derive(Clone)]
pub struct DestinationRepository {
    pool: PgPool,
}

impl DestinationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load a destination and validate its stored credential material
    #[tracing::instrument(skip(self), fields(db.table = "destinations", db.operation = "select", db.record_id = %id))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Destination>, AppError> {
        let row = sqlx::query_as::<Postgres, DestinationRow>(
            r#"
            SELECT id, channel_id, network, account_id, display_name, access_token,
                   secret_bundle, refresh_token, token_expires_at, settings
            FROM destinations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Destination::try_from).transpose()
    }

    #[tracing::instrument(skip(self, access_token, refresh_token), fields(db.table = "destinations", db.operation = "update", db.record_id = %id))]
    pub async fn update_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE destinations
            SET access_token = $2,
                refresh_token = COALESCE($3, refresh_token),
                token_expires_at = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
