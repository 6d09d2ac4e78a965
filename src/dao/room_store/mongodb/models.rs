use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{
    AnswerEntity, PlayerEntity, QuestionEntity, QuizEntity, RoomEntity, RoomStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    question: String,
    choices: Vec<String>,
    correct_index: i32,
    explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: String,
    code: String,
    source_url: String,
    source_title: String,
    questions: Vec<MongoQuestionDocument>,
    status: RoomStatus,
    current_question_index: i64,
    created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    question_index: i64,
    selected_index: i32,
    is_correct: bool,
    time_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    room_id: String,
    name: String,
    is_host: bool,
    score: i64,
    #[serde(default)]
    answers: Vec<MongoAnswerDocument>,
    created_at: DateTime,
}

impl From<QuestionEntity> for MongoQuestionDocument {
    fn from(value: QuestionEntity) -> Self {
        Self {
            question: value.question,
            choices: value.choices,
            correct_index: value.correct_index as i32,
            explanation: value.explanation,
        }
    }
}

impl From<MongoQuestionDocument> for QuestionEntity {
    fn from(value: MongoQuestionDocument) -> Self {
        Self {
            question: value.question,
            choices: value.choices,
            correct_index: value.correct_index.max(0) as usize,
            explanation: value.explanation,
        }
    }
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id.to_string(),
            code: value.code,
            source_url: value.source_url,
            source_title: value.source_title,
            questions: value.quiz.questions.into_iter().map(Into::into).collect(),
            status: value.status,
            current_question_index: value.current_question_index as i64,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoRoomDocument> for RoomEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoRoomDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(&value.id)?,
            code: value.code,
            source_url: value.source_url,
            source_title: value.source_title,
            quiz: QuizEntity {
                questions: value.questions.into_iter().map(Into::into).collect(),
            },
            status: value.status,
            current_question_index: value.current_question_index.max(0) as usize,
            created_at: value.created_at.to_system_time(),
        })
    }
}

impl From<AnswerEntity> for MongoAnswerDocument {
    fn from(value: AnswerEntity) -> Self {
        Self {
            question_index: value.question_index as i64,
            selected_index: value.selected_index,
            is_correct: value.is_correct,
            time_ms: value.time_ms as i64,
        }
    }
}

impl From<MongoAnswerDocument> for AnswerEntity {
    fn from(value: MongoAnswerDocument) -> Self {
        Self {
            question_index: value.question_index.max(0) as usize,
            selected_index: value.selected_index,
            is_correct: value.is_correct,
            time_ms: value.time_ms.max(0) as u64,
        }
    }
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id.to_string(),
            room_id: value.room_id.to_string(),
            name: value.name,
            is_host: value.is_host,
            score: i64::from(value.score),
            answers: value.answers.into_iter().map(Into::into).collect(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoPlayerDocument> for PlayerEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPlayerDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(&value.id)?,
            room_id: parse_id(&value.room_id)?,
            name: value.name,
            is_host: value.is_host,
            score: u32::try_from(value.score).unwrap_or(0),
            answers: value.answers.into_iter().map(Into::into).collect(),
            created_at: value.created_at.to_system_time(),
        })
    }
}

/// `$push` payload for one answer entry.
pub fn answer_document(answer: &AnswerEntity) -> Document {
    doc! {
        "question_index": answer.question_index as i64,
        "selected_index": answer.selected_index,
        "is_correct": answer.is_correct,
        "time_ms": answer.time_ms as i64,
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

fn parse_id(raw: &str) -> Result<Uuid, MongoDaoError> {
    Uuid::parse_str(raw).map_err(|err| MongoDaoError::CorruptDocument {
        id: raw.to_owned(),
        reason: err.to_string(),
    })
}
