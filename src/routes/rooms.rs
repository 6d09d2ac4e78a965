use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        player::{AnswerResponse, JoinRoomRequest, SubmitAnswerRequest},
        room::{CreateRoomRequest, RoomDetails, RoomSessionResponse, RoomView, UpdateRoomRequest},
    },
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Routes covering the room lifecycle: creation, reads, host updates, joins and answers.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route(
            "/rooms/{code}",
            get(get_room).patch(update_room).delete(delete_room),
        )
        .route("/rooms/{code}/join", post(join_room))
        .route("/rooms/{code}/answer", post(submit_answer))
}

/// Generate a quiz from the source URL and open a room hosted by the caller.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomSessionResponse),
        (status = 400, description = "Invalid payload"),
        (status = 422, description = "Source has no captions"),
        (status = 502, description = "Quiz generator failed")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<Json<RoomSessionResponse>, AppError> {
    payload.validate()?;
    let session =
        room_service::create_room(&state, &payload.source_url, &payload.host_name).await?;
    Ok(Json(session.into()))
}

/// Read a room and its roster.
#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code (case-insensitive)")),
    responses(
        (status = 200, description = "Room found", body = RoomDetails),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomDetails>, AppError> {
    let room = room_service::get_room(&state, &code).await?;
    Ok(Json(RoomDetails::from(&room)))
}

/// Overwrite the room status and/or current question index.
#[utoipa::path(
    patch,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code (case-insensitive)")),
    request_body = UpdateRoomRequest,
    responses(
        (status = 200, description = "Room updated", body = RoomView),
        (status = 400, description = "Empty update or index out of range"),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Room already finished")
    )
)]
pub async fn update_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<UpdateRoomRequest>,
) -> Result<Json<RoomView>, AppError> {
    let room = room_service::update_room(&state, &code, payload.into()).await?;
    Ok(Json(RoomView::from(&room)))
}

/// Delete a room and all of its players.
#[utoipa::path(
    delete,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code (case-insensitive)")),
    responses(
        (status = 200, description = "Room deleted", body = RoomView),
        (status = 404, description = "Room not found")
    )
)]
pub async fn delete_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomView>, AppError> {
    let room = room_service::delete_room(&state, &code).await?;
    Ok(Json(RoomView::from(&room)))
}

/// Join a room, or resume the player already registered under that name.
#[utoipa::path(
    post,
    path = "/rooms/{code}/join",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code (case-insensitive)")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined or resumed", body = RoomSessionResponse),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Game already started")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<JoinRoomRequest>,
) -> Result<Json<RoomSessionResponse>, AppError> {
    payload.validate()?;
    let session = room_service::join_room(&state, &code, &payload.name).await?;
    Ok(Json(session.into()))
}

/// Record an answer for the current (or an earlier) question.
#[utoipa::path(
    post,
    path = "/rooms/{code}/answer",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code (case-insensitive)")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded or ignored as duplicate", body = AnswerResponse),
        (status = 404, description = "Room or player not found"),
        (status = 409, description = "Room not accepting this answer")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    payload.validate()?;
    let receipt = room_service::submit_answer(&state, &code, payload.into()).await?;
    Ok(Json(receipt.into()))
}
