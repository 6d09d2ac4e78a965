//! Application-level configuration loading: game timings, retention and quiz source.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_ROOM_BACK_CONFIG_PATH";
const QUIZ_GENERATOR_URL_ENV: &str = "QUIZ_GENERATOR_URL";
const QUIZ_FIXTURE_PATH_ENV: &str = "QUIZ_FIXTURE_PATH";
const CRON_SECRET_ENV: &str = "CRON_SECRET";

/// Timings shared by the server (answer clamping) and every client synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameTimings {
    /// Countdown ticks shown before each question.
    pub countdown_secs: u32,
    /// Seconds a question stays open.
    pub question_secs: u32,
    /// Delay between revealing the answer and the host advancing.
    pub reveal_delay: Duration,
    /// Fallback re-fetch period when no change notification arrives.
    pub refresh_interval: Duration,
}

impl GameTimings {
    /// Question time limit in milliseconds, as used for scoring.
    pub fn question_time_limit_ms(&self) -> u64 {
        u64::from(self.question_secs) * 1000
    }
}

impl Default for GameTimings {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            question_secs: 15,
            reveal_delay: Duration::from_secs(3),
            refresh_interval: Duration::from_secs(5),
        }
    }
}

/// Retention janitor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Rooms older than this are deleted.
    pub max_age: Duration,
    /// Pause between two sweeps.
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Where quizzes come from. The generator endpoint wins over the fixture when both are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSourceConfig {
    /// External quiz generator endpoint.
    pub generator_url: Option<String>,
    /// Timeout of one generator call.
    pub generator_timeout: Duration,
    /// JSON quiz served to every room when no generator is set.
    pub fixture_path: Option<PathBuf>,
}

impl Default for QuizSourceConfig {
    fn default() -> Self {
        Self {
            generator_url: None,
            generator_timeout: Duration::from_secs(120),
            fixture_path: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Per-question timers.
    pub timings: GameTimings,
    /// Old room cleanup.
    pub retention: RetentionConfig,
    /// Quiz source.
    pub quiz: QuizSourceConfig,
    /// Bearer token required by the maintenance endpoint, when set.
    pub cron_secret: Option<String>,
}

impl AppConfig {
    /// Load the configuration from disk and the environment, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    /// Apply deployment overrides looked up through `lookup` (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty(QUIZ_GENERATOR_URL_ENV) {
            self.quiz.generator_url = Some(url);
        }
        if let Some(path) = non_empty(QUIZ_FIXTURE_PATH_ENV) {
            self.quiz.fixture_path = Some(PathBuf::from(path));
        }
        if let Some(secret) = non_empty(CRON_SECRET_ENV) {
            self.cron_secret = Some(secret);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    game: RawGame,
    retention: RawRetention,
    quiz: RawQuiz,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGame {
    countdown_secs: Option<u32>,
    question_secs: Option<u32>,
    reveal_delay_ms: Option<u64>,
    refresh_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRetention {
    max_age_hours: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawQuiz {
    generator_url: Option<String>,
    generator_timeout_secs: Option<u64>,
    fixture_path: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let game = value.game;
        let timings = GameTimings {
            countdown_secs: game.countdown_secs.unwrap_or(defaults.timings.countdown_secs),
            question_secs: game
                .question_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.timings.question_secs),
            reveal_delay: game
                .reveal_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.timings.reveal_delay),
            refresh_interval: game
                .refresh_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.timings.refresh_interval),
        };

        let retention = RetentionConfig {
            max_age: value
                .retention
                .max_age_hours
                .map(|hours| Duration::from_secs(hours * 60 * 60))
                .unwrap_or(defaults.retention.max_age),
            sweep_interval: value
                .retention
                .sweep_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.retention.sweep_interval),
        };

        let quiz = QuizSourceConfig {
            generator_url: value.quiz.generator_url,
            generator_timeout: value
                .quiz
                .generator_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.quiz.generator_timeout),
            fixture_path: value.quiz.fixture_path,
        };

        Self {
            timings,
            retention,
            quiz,
            cron_secret: None,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"game": {"question_secs": 20}, "retention": {}}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.timings.question_secs, 20);
        assert_eq!(config.timings.question_time_limit_ms(), 20_000);
        assert_eq!(config.timings.countdown_secs, 3);
        assert_eq!(config.retention, RetentionConfig::default());
        assert_eq!(config.quiz, QuizSourceConfig::default());
    }

    #[test]
    fn zero_question_time_is_ignored() {
        let raw: RawConfig = serde_json::from_str(r#"{"game": {"question_secs": 0}}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.timings.question_secs, 15);
    }

    #[test]
    fn overrides_skip_blank_values() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            QUIZ_GENERATOR_URL_ENV => Some("http://generator.local/quiz".into()),
            CRON_SECRET_ENV => Some("   ".into()),
            _ => None,
        });
        assert_eq!(
            config.quiz.generator_url.as_deref(),
            Some("http://generator.local/quiz")
        );
        assert_eq!(config.cron_secret, None);
        assert_eq!(config.quiz.fixture_path, None);
    }
}
