use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use crosspost_core::models::{Actor, ContentStatus, DestinationResult};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub content_id: Uuid,
    pub status: ContentStatus,
    pub all_succeeded: bool,
    pub results: Vec<DestinationResult>,
}

/// Run one publish pass for a content item.
///
/// `success` means the pass ran; per-destination failures are reported in
/// `results` and do not change the HTTP status.
#[tracing::instrument(skip(state), fields(content_id = %content_id, actor = %actor))]
pub async fn publish_content(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(content_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let report = state.coordinator.run(content_id, actor).await?;

    Ok(Json(PublishResponse {
        success: true,
        content_id: report.content_id,
        status: report.status,
        all_succeeded: report.all_succeeded,
        results: report.results,
    }))
}
