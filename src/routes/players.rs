use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{dto::player::PlayerView, error::AppError, services::room_service, state::SharedState};

/// Routes of this module.
pub fn router() -> Router<SharedState> {
    Router::new().route("/players/{id}", get(get_player))
}

/// Read a single player, e.g. to restore a session from a stored player id.
#[utoipa::path(
    get,
    path = "/players/{id}",
    tag = "players",
    params(("id" = String, Path, description = "Player identifier")),
    responses(
        (status = 200, description = "Player found", body = PlayerView),
        (status = 404, description = "Player not found")
    )
)]
pub async fn get_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlayerView>, AppError> {
    let player = room_service::get_player(&state, id).await?;
    Ok(Json(PlayerView::from(&player)))
}
