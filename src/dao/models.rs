use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a room as persisted in the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Players are gathering; no question has been shown yet.
    Waiting,
    /// Questions are being played.
    Playing,
    /// The last question has been revealed; the scoreboard is final.
    Finished,
}

impl RoomStatus {
    /// Stable lowercase name used in storage documents and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Playing => "playing",
            RoomStatus::Finished => "finished",
        }
    }
}

/// One multiple-choice question of a quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Question text.
    pub question: String,
    /// Exactly four answer choices.
    pub choices: Vec<String>,
    /// Index of the correct choice, in `[0, 3]`.
    pub correct_index: usize,
    /// Explanation displayed once the answer is revealed.
    pub explanation: String,
}

/// Immutable question set attached to a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizEntity {
    /// Ordered questions (exactly ten once validated).
    pub questions: Vec<QuestionEntity>,
}

/// Persisted room record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Short uppercase code typed by players to join.
    pub code: String,
    /// URL the quiz was generated from.
    pub source_url: String,
    /// Title of the source material.
    pub source_title: String,
    /// Questions played in this room.
    pub quiz: QuizEntity,
    /// Current lifecycle status.
    pub status: RoomStatus,
    /// Index of the question currently played (meaningful once not waiting).
    pub current_question_index: usize,
    /// Creation timestamp, used by the retention sweep.
    pub created_at: SystemTime,
}

impl RoomEntity {
    /// Number of questions in the room's quiz.
    pub fn question_count(&self) -> usize {
        self.quiz.questions.len()
    }

    /// Question at `index`, if any.
    pub fn question(&self, index: usize) -> Option<&QuestionEntity> {
        self.quiz.questions.get(index)
    }
}

/// Answer recorded for one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Question the answer belongs to.
    pub question_index: usize,
    /// Selected choice, `-1` when the player ran out of time.
    pub selected_index: i32,
    /// Whether the selected choice was the correct one.
    pub is_correct: bool,
    /// Milliseconds elapsed between question display and answer.
    pub time_ms: u64,
}

impl AnswerEntity {
    /// Answer synthesized when the question timer expires without a submission.
    pub fn timed_out(question_index: usize, time_limit_ms: u64) -> Self {
        Self {
            question_index,
            selected_index: -1,
            is_correct: false,
            time_ms: time_limit_ms,
        }
    }
}

/// Persisted player record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Opaque identifier known only to the owning client.
    pub id: Uuid,
    /// Room the player belongs to.
    pub room_id: Uuid,
    /// Display name, unique within the room.
    pub name: String,
    /// Whether this player created the room.
    pub is_host: bool,
    /// Cached sum of the points of `answers`.
    pub score: u32,
    /// Append-only answer log, at most one entry per question.
    pub answers: Vec<AnswerEntity>,
    /// Join timestamp, used to keep roster ordering stable.
    pub created_at: SystemTime,
}

impl PlayerEntity {
    /// Build a fresh player with an empty answer log.
    pub fn new(room_id: Uuid, name: String, is_host: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            name,
            is_host,
            score: 0,
            answers: Vec::new(),
            created_at: SystemTime::now(),
        }
    }

    /// Answer recorded for `question_index`, if any.
    pub fn answer_for(&self, question_index: usize) -> Option<&AnswerEntity> {
        self.answers
            .iter()
            .find(|answer| answer.question_index == question_index)
    }

    /// Whether an answer exists for `question_index`.
    pub fn has_answered(&self, question_index: usize) -> bool {
        self.answer_for(question_index).is_some()
    }
}

/// Partial update of the phase-relevant room fields. Applied as a last-write-wins overwrite.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomUpdate {
    /// New status, when set.
    pub status: Option<RoomStatus>,
    /// New current question index, when set.
    pub current_question_index: Option<usize>,
}

impl RoomUpdate {
    /// Update written by the host to start the game on the first question.
    pub fn start() -> Self {
        Self {
            status: Some(RoomStatus::Playing),
            current_question_index: Some(0),
        }
    }

    /// Update moving the room to an absolute question index.
    pub fn advance_to(index: usize) -> Self {
        Self {
            status: None,
            current_question_index: Some(index),
        }
    }

    /// Update ending the game.
    pub fn finish() -> Self {
        Self {
            status: Some(RoomStatus::Finished),
            current_question_index: None,
        }
    }

    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.current_question_index.is_none()
    }

    /// Overwrite the fields carried by this update.
    pub fn apply_to(&self, room: &mut RoomEntity) {
        if let Some(status) = self.status {
            room.status = status;
        }
        if let Some(index) = self.current_question_index {
            room.current_question_index = index;
        }
    }
}

/// Room together with its full roster, as returned by a room read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomWithPlayers {
    /// Room record.
    pub room: RoomEntity,
    /// Players ordered by join time.
    pub players: Vec<PlayerEntity>,
}

/// Result of an atomic answer append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The answer was appended and the score recomputed.
    Appended(PlayerEntity),
    /// An answer already existed for that question; the player is returned unchanged.
    Duplicate(PlayerEntity),
}

impl AppendOutcome {
    /// Player record after the operation.
    pub fn player(&self) -> &PlayerEntity {
        match self {
            AppendOutcome::Appended(player) | AppendOutcome::Duplicate(player) => player,
        }
    }

    /// Consume the outcome and return the player record.
    pub fn into_player(self) -> PlayerEntity {
        match self {
            AppendOutcome::Appended(player) | AppendOutcome::Duplicate(player) => player,
        }
    }
}
