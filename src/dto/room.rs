use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{QuestionEntity, RoomEntity, RoomStatus, RoomUpdate, RoomWithPlayers},
    dto::{format_system_time, player::PlayerView, validation::validate_player_name},
    services::room_service::RoomSession,
};

/// Payload creating a room from a source URL.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    #[validate(url)]
    pub source_url: String,
    #[validate(custom(function = "validate_player_name"))]
    pub host_name: String,
}

/// Partial room update written by the host.
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateRoomRequest {
    pub status: Option<RoomStatus>,
    pub current_question_index: Option<usize>,
}

impl From<UpdateRoomRequest> for RoomUpdate {
    fn from(value: UpdateRoomRequest) -> Self {
        Self {
            status: value.status,
            current_question_index: value.current_question_index,
        }
    }
}

impl From<RoomUpdate> for UpdateRoomRequest {
    fn from(value: RoomUpdate) -> Self {
        Self {
            status: value.status,
            current_question_index: value.current_question_index,
        }
    }
}

/// One quiz question as shown to players.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionView {
    pub question: String,
    pub choices: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
}

impl From<&QuestionEntity> for QuestionView {
    fn from(value: &QuestionEntity) -> Self {
        Self {
            question: value.question.clone(),
            choices: value.choices.clone(),
            correct_index: value.correct_index,
            explanation: value.explanation.clone(),
        }
    }
}

impl From<QuestionView> for QuestionEntity {
    fn from(value: QuestionView) -> Self {
        Self {
            question: value.question,
            choices: value.choices,
            correct_index: value.correct_index,
            explanation: value.explanation,
        }
    }
}

/// Public projection of a room record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomView {
    pub id: Uuid,
    pub code: String,
    pub source_url: String,
    pub source_title: String,
    pub status: RoomStatus,
    pub current_question_index: usize,
    pub questions: Vec<QuestionView>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<&RoomEntity> for RoomView {
    fn from(value: &RoomEntity) -> Self {
        Self {
            id: value.id,
            code: value.code.clone(),
            source_url: value.source_url.clone(),
            source_title: value.source_title.clone(),
            status: value.status,
            current_question_index: value.current_question_index,
            questions: value.quiz.questions.iter().map(Into::into).collect(),
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Room with its full roster.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomDetails {
    pub room: RoomView,
    pub players: Vec<PlayerView>,
}

impl From<&RoomWithPlayers> for RoomDetails {
    fn from(value: &RoomWithPlayers) -> Self {
        Self {
            room: (&value.room).into(),
            players: value.players.iter().map(Into::into).collect(),
        }
    }
}

/// Returned by room creation and join: the room plus the caller's player record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomSessionResponse {
    pub room: RoomView,
    pub players: Vec<PlayerView>,
    pub player: PlayerView,
    pub room_code: String,
    /// True when a join matched an existing player name.
    pub resumed: bool,
}

impl From<RoomSession> for RoomSessionResponse {
    fn from(value: RoomSession) -> Self {
        let details = RoomDetails::from(&value.room);
        Self {
            room_code: details.room.code.clone(),
            room: details.room,
            players: details.players,
            player: (&value.player).into(),
            resumed: value.resumed,
        }
    }
}
