use chrono::{DateTime, Utc};
use crosspost_core::models::{NotificationEventType, WebhookTarget};
use crosspost_core::AppError;
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

#[derive(FromRow)]
struct WebhookTargetRow {
    id: Uuid,
    channel_id: Uuid,
    url: String,
    events: Vec<String>,
    signing_secret: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<WebhookTargetRow> for WebhookTarget {
    fn from(row: WebhookTargetRow) -> Self {
        let events = row
            .events
            .iter()
            .filter_map(|event| match event.parse::<NotificationEventType>() {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!(webhook_id = %row.id, error = %e, "Ignoring unknown webhook event");
                    None
                }
            })
            .collect();

        WebhookTarget {
            id: row.id,
            channel_id: row.channel_id,
            url: row.url,
            events,
            signing_secret: row.signing_secret,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// Repository for outbound webhook targets
#[derive(Clone)]
pub struct WebhookTargetRepository {
    pool: PgPool,
}

impl WebhookTargetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find active targets of a channel subscribed to an event
    #[tracing::instrument(skip(self), fields(db.table = "webhook_targets", db.operation = "select"))]
    pub async fn find_active_by_event(
        &self,
        channel_id: Uuid,
        event: NotificationEventType,
    ) -> Result<Vec<WebhookTarget>, AppError> {
        let rows = sqlx::query_as::<Postgres, WebhookTargetRow>(
            r#"
            SELECT id, channel_id, url, events, signing_secret, is_active, created_at
            FROM webhook_targets
            WHERE channel_id = $1 AND is_active = true AND $2 = ANY(events)
            ORDER BY created_at ASC
            "#,
        )
        .bind(channel_id)
        .bind(event.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WebhookTarget::from).collect())
    }
}
