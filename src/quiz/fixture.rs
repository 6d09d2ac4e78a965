use std::{fs, path::Path};

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::info;

use super::{GeneratedQuiz, QuizError, QuizProvider, parse_quiz_value};
use crate::dao::models::{QuestionEntity, QuizEntity};

/// Provider returning the same quiz for every source, read from a JSON fixture.
#[derive(Debug, Clone)]
pub struct StaticQuizProvider {
    quiz: QuizEntity,
    title: String,
}

#[derive(Deserialize)]
struct FixtureFile {
    #[serde(default)]
    title: Option<String>,
    #[serde(flatten)]
    quiz: serde_json::Value,
}

impl StaticQuizProvider {
    /// Serve `quiz` under `title`.
    pub fn new(quiz: QuizEntity, title: impl Into<String>) -> Self {
        Self {
            quiz,
            title: title.into(),
        }
    }

    /// Load `{ "title"?: string, "questions": [...] }` from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, QuizError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            QuizError::Upstream(format!("failed to read {}: {err}", path.display()))
        })?;
        let fixture: FixtureFile =
            serde_json::from_str(&contents).map_err(|err| QuizError::Malformed(err.to_string()))?;
        let quiz = parse_quiz_value(fixture.quiz)?;
        info!(path = %path.display(), "loaded quiz fixture");
        Ok(Self::new(
            quiz,
            fixture.title.unwrap_or_else(|| "Fixture quiz".to_owned()),
        ))
    }

    /// Built-in ten question quiz.
    pub fn sample() -> Self {
        Self::new(sample_quiz(), "Sample quiz")
    }

    /// The quiz served to every room.
    pub fn quiz(&self) -> &QuizEntity {
        &self.quiz
    }
}

impl QuizProvider for StaticQuizProvider {
    fn generate_quiz(&self, _source_url: &str) -> BoxFuture<'static, Result<GeneratedQuiz, QuizError>> {
        let generated = GeneratedQuiz {
            quiz: self.quiz.clone(),
            source_title: self.title.clone(),
        };
        Box::pin(async move { Ok(generated) })
    }
}

fn question(text: &str, choices: [&str; 4], correct_index: usize, explanation: &str) -> QuestionEntity {
    QuestionEntity {
        question: text.to_owned(),
        choices: choices.iter().map(|choice| (*choice).to_owned()).collect(),
        correct_index,
        explanation: explanation.to_owned(),
    }
}

/// Ten questions with a fixed answer key: `[0, 1, 2, 3, 0, 1, 2, 3, 0, 1]`.
pub fn sample_quiz() -> QuizEntity {
    QuizEntity {
        questions: vec![
            question(
                "Which planet is closest to the sun?",
                ["Mercury", "Venus", "Earth", "Mars"],
                0,
                "Mercury orbits at about 0.39 AU.",
            ),
            question(
                "How many sides does a hexagon have?",
                ["Five", "Six", "Seven", "Eight"],
                1,
                "Hexa means six.",
            ),
            question(
                "What is the chemical symbol of gold?",
                ["Ag", "Gd", "Au", "Go"],
                2,
                "From the Latin aurum.",
            ),
            question(
                "Which ocean is the largest?",
                ["Atlantic", "Indian", "Arctic", "Pacific"],
                3,
                "The Pacific covers about a third of the surface of the Earth.",
            ),
            question(
                "What is 7 multiplied by 8?",
                ["56", "54", "64", "48"],
                0,
                "7 x 8 = 56.",
            ),
            question(
                "Which gas do plants absorb for photosynthesis?",
                ["Oxygen", "Carbon dioxide", "Nitrogen", "Helium"],
                1,
                "Plants fix CO2 into sugars.",
            ),
            question(
                "How many minutes are in two hours?",
                ["100", "60", "120", "180"],
                2,
                "2 x 60 = 120.",
            ),
            question(
                "Which is the smallest prime number?",
                ["0", "1", "3", "2"],
                3,
                "2 is the only even prime.",
            ),
            question(
                "What is the boiling point of water at sea level in Celsius?",
                ["100", "90", "212", "80"],
                0,
                "212 is the Fahrenheit value.",
            ),
            question(
                "Which continent is Egypt in?",
                ["Asia", "Africa", "Europe", "Oceania"],
                1,
                "Egypt is in north-east Africa.",
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{CHOICE_COUNT, QUESTION_COUNT};

    #[test]
    fn sample_quiz_is_playable() {
        let quiz = sample_quiz();
        assert_eq!(quiz.questions.len(), QUESTION_COUNT);
        for (index, question) in quiz.questions.iter().enumerate() {
            assert_eq!(question.choices.len(), CHOICE_COUNT);
            assert_eq!(question.correct_index, index % 4);
        }
    }

    #[tokio::test]
    async fn static_provider_ignores_source() {
        let provider = StaticQuizProvider::sample();
        let generated = provider.generate_quiz("https://example.invalid/a").await.unwrap();
        assert_eq!(generated.source_title, "Sample quiz");
        assert_eq!(generated.quiz, sample_quiz());
    }
}
