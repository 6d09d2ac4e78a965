use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
    routing::post,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::AppError, services::retention, state::SharedState};

/// Outcome of a retention sweep.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    /// Number of deleted rooms.
    pub deleted_rooms: usize,
    /// Codes of the deleted rooms.
    pub codes: Vec<String>,
}

/// Routes of this module.
pub fn router() -> Router<SharedState> {
    Router::new().route("/maintenance/cleanup", post(cleanup))
}

/// Delete rooms older than the retention window. Guarded by `CRON_SECRET` when configured.
#[utoipa::path(
    post,
    path = "/maintenance/cleanup",
    tag = "maintenance",
    responses(
        (status = 200, description = "Sweep completed", body = CleanupResponse),
        (status = 401, description = "Missing or wrong bearer token")
    )
)]
pub async fn cleanup(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<CleanupResponse>, AppError> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    retention::authorize(&state, authorization)?;

    let deleted = retention::sweep_expired(&state, state.config().retention.max_age).await?;
    Ok(Json(CleanupResponse {
        deleted_rooms: deleted.len(),
        codes: deleted.into_iter().map(|room| room.code).collect(),
    }))
}
