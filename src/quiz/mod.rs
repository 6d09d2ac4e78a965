//! Quiz content providers used once, at room creation.

/// Quiz served from a JSON fixture.
pub mod fixture;
/// Quiz served by an external generator.
pub mod http;

use futures::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;

use crate::dao::models::{QuestionEntity, QuizEntity};

pub use fixture::StaticQuizProvider;
pub use http::HttpQuizProvider;

/// Number of questions every playable quiz carries.
pub const QUESTION_COUNT: usize = 10;
/// Number of choices every question carries.
pub const CHOICE_COUNT: usize = 4;

/// Failure to obtain a playable quiz. Room creation aborts on any of these.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The source material has no usable captions or transcript.
    #[error("no captions available for this source")]
    NoCaptions,
    /// The generator could not be reached or answered with an error.
    #[error("quiz generator failed: {0}")]
    Upstream(String),
    /// The generator answered but its output is not a valid quiz.
    #[error("quiz generator returned malformed output: {0}")]
    Malformed(String),
}

/// Validated quiz plus metadata about its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuiz {
    /// Validated questions.
    pub quiz: QuizEntity,
    /// Title of the source material.
    pub source_title: String,
}

/// External collaborator turning a source URL into a quiz.
pub trait QuizProvider: Send + Sync {
    fn generate_quiz(&self, source_url: &str) -> BoxFuture<'static, Result<GeneratedQuiz, QuizError>>;
}

/// Provider installed when no generator is configured; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredQuizProvider;

impl QuizProvider for UnconfiguredQuizProvider {
    fn generate_quiz(&self, _source_url: &str) -> BoxFuture<'static, Result<GeneratedQuiz, QuizError>> {
        Box::pin(async { Err(QuizError::Upstream("no quiz generator configured".into())) })
    }
}

#[derive(Debug, Deserialize)]
struct RawQuiz {
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    choices: Vec<String>,
    #[serde(alias = "correctIndex")]
    correct_index: i64,
    #[serde(default)]
    explanation: String,
}

/// Parse free-form generator output: the outermost `{...}` span must be a quiz object.
pub fn parse_quiz_text(text: &str) -> Result<QuizEntity, QuizError> {
    let start = text
        .find('{')
        .ok_or_else(|| QuizError::Malformed("no JSON object in generator output".into()))?;
    let end = text
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| QuizError::Malformed("unterminated JSON object".into()))?;

    let raw: RawQuiz = serde_json::from_str(&text[start..=end])
        .map_err(|err| QuizError::Malformed(err.to_string()))?;
    validate_quiz(raw)
}

/// Parse a quiz already shaped as JSON (fixture files, structured replies).
pub fn parse_quiz_value(value: serde_json::Value) -> Result<QuizEntity, QuizError> {
    let raw: RawQuiz =
        serde_json::from_value(value).map_err(|err| QuizError::Malformed(err.to_string()))?;
    validate_quiz(raw)
}

fn validate_quiz(raw: RawQuiz) -> Result<QuizEntity, QuizError> {
    if raw.questions.len() != QUESTION_COUNT {
        return Err(QuizError::Malformed(format!(
            "expected {QUESTION_COUNT} questions, got {}",
            raw.questions.len()
        )));
    }

    let questions = raw
        .questions
        .into_iter()
        .enumerate()
        .map(|(index, question)| {
            if question.choices.len() != CHOICE_COUNT {
                return Err(QuizError::Malformed(format!(
                    "question {index} has {} choices",
                    question.choices.len()
                )));
            }
            let correct_index = usize::try_from(question.correct_index)
                .ok()
                .filter(|value| *value < CHOICE_COUNT)
                .ok_or_else(|| {
                    QuizError::Malformed(format!(
                        "question {index} has correct index {}",
                        question.correct_index
                    ))
                })?;
            Ok(QuestionEntity {
                question: question.question,
                choices: question.choices,
                correct_index,
                explanation: question.explanation,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QuizEntity { questions })
}
