use chrono::{DateTime, Utc};
use crosspost_core::models::{ContentItem, ContentStatus, MediaRef, Network};
use crosspost_core::AppError;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct ContentRow {
    id: Uuid,
    channel_id: Uuid,
    author_id: Option<Uuid>,
    body: String,
    overrides: Json<HashMap<Network, String>>,
    media: Json<Vec<MediaRef>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContentRow> for ContentItem {
    type Error = AppError;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ContentStatus>()
            .map_err(|e| AppError::Internal(format!("content {}: {}", row.id, e)))?;

        Ok(ContentItem {
            id: row.id,
            channel_id: row.channel_id,
            author_id: row.author_id,
            body: row.body,
            overrides: row.overrides.0,
            media: row.media.0,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for content items
#[derive(Clone)]
pub struct ContentRepository {
    pool: PgPool,
}

impl ContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "content_items", db.operation = "select", db.record_id = %id))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<ContentItem>, AppError> {
        let row = sqlx::query_as::<Postgres, ContentRow>(
            r#"
            SELECT id, channel_id, author_id, body, overrides, media, status,
                   created_at, updated_at
            FROM content_items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContentItem::try_from).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "content_items", db.operation = "update", db.record_id = %id))]
    pub async fn update_status(&self, id: Uuid, status: ContentStatus) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE content_items SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
