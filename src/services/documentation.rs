use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz room backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::update_room,
        crate::routes::rooms::delete_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::submit_answer,
        crate::routes::players::get_player,
        crate::routes::sse::room_events,
        crate::routes::maintenance::cleanup,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::UpdateRoomRequest,
            crate::dto::room::RoomView,
            crate::dto::room::QuestionView,
            crate::dto::room::RoomDetails,
            crate::dto::room::RoomSessionResponse,
            crate::dto::player::JoinRoomRequest,
            crate::dto::player::SubmitAnswerRequest,
            crate::dto::player::PlayerView,
            crate::dto::player::AnswerView,
            crate::dto::player::AnswerResponse,
            crate::dto::sse::FeedHandshake,
            crate::routes::maintenance::CleanupResponse,
            crate::state::ChangeEvent,
            crate::state::TableKind,
            crate::state::ChangeKind,
            crate::dao::models::RoomStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room lifecycle, joins and answers"),
        (name = "players", description = "Player lookups"),
        (name = "sse", description = "Per-room change feeds"),
        (name = "maintenance", description = "Retention sweep"),
    )
)]
/// OpenAPI document of the HTTP surface.
pub struct ApiDoc;
