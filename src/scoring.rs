//! Points awarded for a single answer and for a whole answer log.

use crate::dao::models::AnswerEntity;

/// Points granted for any correct answer.
pub const BASE_POINTS: u32 = 1_000;
/// Largest speed bonus, granted for an instant answer.
pub const MAX_SPEED_BONUS: u32 = 500;
/// One bonus point is lost every this many milliseconds.
pub const BONUS_DECAY_MS: u64 = 20;

/// Points for one answer.
///
/// Incorrect answers (timeouts included) are worth nothing. A correct answer is
/// worth `1000 + max(0, 500 - floor(time_ms / 20))`, so it never drops below
/// [`BASE_POINTS`]. `time_ms` is clamped to `time_limit_ms` first.
pub fn score(is_correct: bool, time_ms: u64, time_limit_ms: u64) -> u32 {
    if !is_correct {
        return 0;
    }

    let elapsed = time_ms.min(time_limit_ms);
    let decay = u32::try_from(elapsed / BONUS_DECAY_MS).unwrap_or(u32::MAX);
    BASE_POINTS + MAX_SPEED_BONUS.saturating_sub(decay)
}

/// Points for a single stored answer.
pub fn answer_points(answer: &AnswerEntity, time_limit_ms: u64) -> u32 {
    score(answer.is_correct, answer.time_ms, time_limit_ms)
}

/// Total score implied by an answer log; a player's stored score must always equal this.
pub fn total_score(answers: &[AnswerEntity], time_limit_ms: u64) -> u32 {
    answers
        .iter()
        .map(|answer| answer_points(answer, time_limit_ms))
        .sum()
}
