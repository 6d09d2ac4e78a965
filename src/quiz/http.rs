use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{GeneratedQuiz, QuizError, QuizProvider, parse_quiz_text, parse_quiz_value};

/// Quiz provider backed by an external generator service.
///
/// The service receives `{"source_url": ...}` and answers with either a
/// structured `quiz` object or free-form model `content` containing one.
/// `422 Unprocessable Entity` means the source has no captions.
#[derive(Clone)]
pub struct HttpQuizProvider {
    client: Client,
    endpoint: Arc<str>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    source_url: &'a str,
}

#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    quiz: Option<serde_json::Value>,
    #[serde(default)]
    content: Option<String>,
}

impl HttpQuizProvider {
    /// Client for `endpoint`; each call gives up after `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, QuizError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| QuizError::Upstream(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            endpoint: Arc::from(endpoint.into()),
        })
    }

    async fn generate(&self, source_url: String) -> Result<GeneratedQuiz, QuizError> {
        debug!(endpoint = %self.endpoint, source_url = %source_url, "requesting quiz generation");
        let response = self
            .client
            .post(self.endpoint.as_ref())
            .json(&GenerateRequest {
                source_url: &source_url,
            })
            .send()
            .await
            .map_err(|err| QuizError::Upstream(err.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNPROCESSABLE_ENTITY => return Err(QuizError::NoCaptions),
            status => {
                warn!(%status, "quiz generator answered with an error status");
                return Err(QuizError::Upstream(format!(
                    "generator answered with status {status}"
                )));
            }
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|err| QuizError::Malformed(err.to_string()))?;

        let quiz = match (reply.quiz, reply.content) {
            (Some(value), _) => parse_quiz_value(value)?,
            (None, Some(content)) => parse_quiz_text(&content)?,
            (None, None) => {
                return Err(QuizError::Malformed(
                    "reply carries neither `quiz` nor `content`".into(),
                ));
            }
        };

        Ok(GeneratedQuiz {
            quiz,
            source_title: reply
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or(source_url),
        })
    }
}

impl QuizProvider for HttpQuizProvider {
    fn generate_quiz(&self, source_url: &str) -> BoxFuture<'static, Result<GeneratedQuiz, QuizError>> {
        let provider = self.clone();
        let source_url = source_url.to_owned();
        Box::pin(async move { provider.generate(source_url).await })
    }
}
