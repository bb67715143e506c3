use chrono::{DateTime, Utc};
use crosspost_core::models::{DestinationOutcome, OutcomeState};
use crosspost_core::AppError;
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct OutcomeRow {
    id: Uuid,
    content_id: Uuid,
    destination_id: Uuid,
    state: String,
    external_id: Option<String>,
    error_message: Option<String>,
    published_at: Option<DateTime<Utc>>,
    enqueued_at: DateTime<Utc>,
}

impl TryFrom<OutcomeRow> for DestinationOutcome {
    type Error = AppError;

    fn try_from(row: OutcomeRow) -> Result<Self, Self::Error> {
        let state = row
            .state
            .parse::<OutcomeState>()
            .map_err(|e| AppError::Internal(format!("outcome {}: {}", row.id, e)))?;

        Ok(DestinationOutcome {
            id: row.id,
            content_id: row.content_id,
            destination_id: row.destination_id,
            state,
            external_id: row.external_id,
            error_message: row.error_message,
            published_at: row.published_at,
            enqueued_at: row.enqueued_at,
        })
    }
}

/// Repository for per-destination publish outcomes
///
/// State transitions only apply to rows that are still `pending`, so an
/// outcome becomes terminal at most once.
#[derive(Clone)]
pub struct OutcomeRepository {
    pool: PgPool,
}

impl OutcomeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All outcomes of a content item in enqueue order
    #[tracing::instrument(skip(self), fields(db.table = "destination_outcomes", db.operation = "select"))]
    pub async fn list_for_content(
        &self,
        content_id: Uuid,
    ) -> Result<Vec<DestinationOutcome>, AppError> {
        let rows = sqlx::query_as::<Postgres, OutcomeRow>(
            r#"
            SELECT id, content_id, destination_id, state, external_id, error_message,
                   published_at, enqueued_at
            FROM destination_outcomes
            WHERE content_id = $1
            ORDER BY enqueued_at ASC, id ASC
            "#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DestinationOutcome::try_from).collect()
    }

    #[tracing::instrument(skip(self), fields(db.table = "destination_outcomes", db.operation = "update", db.record_id = %id))]
    pub async fn mark_published(
        &self,
        id: Uuid,
        external_id: &str,
        published_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE destination_outcomes
            SET state = 'published', external_id = $2, published_at = $3, error_message = NULL
            WHERE id = $1 AND state = 'pending'
            "#,
        )
        .bind(id)
        .bind(external_id)
        .bind(published_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self, error_message), fields(db.table = "destination_outcomes", db.operation = "update", db.record_id = %id))]
    pub async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE destination_outcomes
            SET state = 'failed', error_message = $2
            WHERE id = $1 AND state = 'pending'
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
