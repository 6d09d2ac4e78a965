use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{AnswerEntity, PlayerEntity},
    dto::{format_system_time, validation::validate_player_name},
    services::room_service::{AnswerReceipt, AnswerSubmission},
};

/// Payload joining (or resuming) a room by name.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
}

/// Answer submission. Correctness is computed by the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    pub player_id: Uuid,
    pub question_index: usize,
    /// Selected choice, `-1` when the player ran out of time.
    #[validate(range(min = -1, max = 3))]
    pub selected_index: i32,
    /// Milliseconds between question display and the answer.
    pub time_ms: u64,
}

impl From<SubmitAnswerRequest> for AnswerSubmission {
    fn from(value: SubmitAnswerRequest) -> Self {
        Self {
            player_id: value.player_id,
            question_index: value.question_index,
            selected_index: value.selected_index,
            time_ms: value.time_ms,
        }
    }
}

impl From<AnswerSubmission> for SubmitAnswerRequest {
    fn from(value: AnswerSubmission) -> Self {
        Self {
            player_id: value.player_id,
            question_index: value.question_index,
            selected_index: value.selected_index,
            time_ms: value.time_ms,
        }
    }
}

/// One recorded answer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerView {
    pub question_index: usize,
    pub selected_index: i32,
    pub is_correct: bool,
    pub time_ms: u64,
}

impl From<&AnswerEntity> for AnswerView {
    fn from(value: &AnswerEntity) -> Self {
        Self {
            question_index: value.question_index,
            selected_index: value.selected_index,
            is_correct: value.is_correct,
            time_ms: value.time_ms,
        }
    }
}

impl From<AnswerView> for AnswerEntity {
    fn from(value: AnswerView) -> Self {
        Self {
            question_index: value.question_index,
            selected_index: value.selected_index,
            is_correct: value.is_correct,
            time_ms: value.time_ms,
        }
    }
}

/// Public projection of a player.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlayerView {
    pub id: Uuid,
    pub room_id: Uuid,
    pub name: String,
    pub is_host: bool,
    pub score: u32,
    pub answers: Vec<AnswerView>,
    pub created_at: String,
}

impl From<&PlayerEntity> for PlayerView {
    fn from(value: &PlayerEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            name: value.name.clone(),
            is_host: value.is_host,
            score: value.score,
            answers: value.answers.iter().map(Into::into).collect(),
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Result of an answer submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerResponse {
    pub player: PlayerView,
    /// Points awarded for the question.
    pub question_score: u32,
    /// True when an answer already existed and this one was ignored.
    pub duplicate: bool,
}

impl From<AnswerReceipt> for AnswerResponse {
    fn from(value: AnswerReceipt) -> Self {
        Self {
            player: (&value.player).into(),
            question_score: value.question_score,
            duplicate: value.duplicate,
        }
    }
}
