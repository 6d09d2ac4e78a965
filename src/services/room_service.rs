//! Business logic behind the room RPC surface. Every committed write is
//! followed by a change notification for the affected room.

use std::time::SystemTime;

use rand::{rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{
            AnswerEntity, AppendOutcome, PlayerEntity, QuizEntity, RoomEntity, RoomStatus,
            RoomUpdate, RoomWithPlayers,
        },
        storage::StorageError,
    },
    error::ServiceError,
    scoring,
    state::{ChangeEvent, ChangeKind, SharedState},
};

/// Characters used for room codes; `0/O` and `1/I` are left out.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Characters in a room code.
pub const CODE_LENGTH: usize = 6;
const MAX_CODE_ATTEMPTS: usize = 8;

/// Room plus the player the caller acts as.
#[derive(Debug, Clone)]
pub struct RoomSession {
    /// Room and roster after the operation.
    pub room: RoomWithPlayers,
    /// Player the caller acts as.
    pub player: PlayerEntity,
    /// True when a join matched an existing player by name.
    pub resumed: bool,
}

/// Answer sent by a client for the current (or an earlier) question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    /// Player id.
    pub player_id: Uuid,
    /// Question answered.
    pub question_index: usize,
    /// Chosen choice, `-1` for a timeout.
    pub selected_index: i32,
    /// Milliseconds since the question opened, clamped to the limit.
    pub time_ms: u64,
}

/// Result of an answer submission.
#[derive(Debug, Clone)]
pub struct AnswerReceipt {
    /// Player the caller acts as.
    pub player: PlayerEntity,
    /// Points awarded for this question (those of the stored answer on a duplicate).
    pub question_score: u32,
    /// An answer for this question was already stored.
    pub duplicate: bool,
}

/// Normalise a user-typed room code: trimmed, uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Draw a random room code.
pub fn generate_code() -> String {
    let mut rng = rng();
    (0..CODE_LENGTH)
        .filter_map(|_| CODE_ALPHABET.choose(&mut rng).map(|byte| char::from(*byte)))
        .collect()
}

/// Generate a quiz for `source_url` then persist the room together with its host.
///
/// Nothing is written when quiz generation fails.
pub async fn create_room(
    state: &SharedState,
    source_url: &str,
    host_name: &str,
) -> Result<RoomSession, ServiceError> {
    let source_url = source_url.trim();
    let host_name = sanitize_name(host_name)?;
    if source_url.is_empty() {
        return Err(ServiceError::InvalidInput("source url must not be empty".into()));
    }
    let store = state.require_room_store().await?;

    let generated = state
        .quiz_provider()
        .generate_quiz(source_url)
        .await
        .inspect_err(|err| warn!(source_url, error = %err, "quiz generation failed"))?;

    let mut last_conflict = None;
    for attempt in 0..MAX_CODE_ATTEMPTS {
        let room = new_room(
            generate_code(),
            source_url,
            &generated.source_title,
            generated.quiz.clone(),
        );
        let host = PlayerEntity::new(room.id, host_name.clone(), true);
        let code = room.code.clone();

        match store.create_room(room, host.clone()).await {
            Ok(room) => {
                info!(code = %code, host = %host.name, "room created");
                return Ok(RoomSession {
                    room,
                    player: host,
                    resumed: false,
                });
            }
            Err(StorageError::Conflict(message)) => {
                debug!(attempt, code = %code, "room code collision; retrying");
                last_conflict = Some(message);
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ServiceError::InvalidState(last_conflict.unwrap_or_else(|| {
        "could not allocate a room code".to_owned()
    })))
}

fn new_room(code: String, source_url: &str, source_title: &str, quiz: QuizEntity) -> RoomEntity {
    RoomEntity {
        id: Uuid::new_v4(),
        code,
        source_url: source_url.to_owned(),
        source_title: source_title.to_owned(),
        quiz,
        status: RoomStatus::Waiting,
        current_question_index: 0,
        created_at: SystemTime::now(),
    }
}

fn sanitize_name(name: &str) -> Result<String, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("player name must not be empty".into()));
    }
    Ok(name.to_owned())
}

/// Read a room and its roster.
pub async fn get_room(state: &SharedState, code: &str) -> Result<RoomWithPlayers, ServiceError> {
    let store = state.require_room_store().await?;
    Ok(store.get_room(&normalize_code(code)).await?)
}

/// Read a single player.
pub async fn get_player(state: &SharedState, id: Uuid) -> Result<PlayerEntity, ServiceError> {
    let store = state.require_room_store().await?;
    Ok(store.get_player(id).await?)
}

/// Join a room by name. A known name resumes that player whatever the room status;
/// a new name is only accepted while the room is waiting.
pub async fn join_room(
    state: &SharedState,
    code: &str,
    name: &str,
) -> Result<RoomSession, ServiceError> {
    let code = normalize_code(code);
    let name = sanitize_name(name)?;
    let store = state.require_room_store().await?;

    let room = store.get_room(&code).await?;
    if let Some(player) = room.players.iter().find(|player| player.name == name) {
        debug!(code = %code, name = %name, "player resumed");
        return Ok(RoomSession {
            player: player.clone(),
            room,
            resumed: true,
        });
    }

    if room.room.status != RoomStatus::Waiting {
        return Err(ServiceError::InvalidState(format!(
            "room `{code}` is {}; new players cannot join",
            room.room.status.as_str()
        )));
    }

    let candidate = PlayerEntity::new(room.room.id, name.clone(), false);
    let (player, resumed) = match store.add_player(&code, candidate).await {
        Ok(player) => (player, false),
        Err(StorageError::Conflict(_)) => {
            // Another join with the same name won the race: resume that player.
            let existing = store
                .find_player_by_name(&code, &name)
                .await?
                .ok_or_else(|| ServiceError::InvalidState(format!("name `{name}` is taken")))?;
            (existing, true)
        }
        Err(err) => return Err(err.into()),
    };

    if !resumed {
        info!(code = %code, name = %player.name, "player joined");
        state
            .notifier()
            .publish(ChangeEvent::player(room.room.id, ChangeKind::PlayerJoined));
    }

    let room = store.get_room(&code).await?;
    Ok(RoomSession {
        room,
        player,
        resumed,
    })
}

/// Check `update` against the room it targets.
///
/// Returns `Ok(false)` when the write would be a no-op on a finished room.
pub fn validate_room_update(room: &RoomEntity, update: &RoomUpdate) -> Result<bool, ServiceError> {
    if update.is_empty() {
        return Err(ServiceError::InvalidInput("update carries no field".into()));
    }

    if room.status == RoomStatus::Finished {
        let repeat_finish = update.status == Some(RoomStatus::Finished)
            && update
                .current_question_index
                .is_none_or(|index| index == room.current_question_index);
        return if repeat_finish {
            Ok(false)
        } else {
            Err(ServiceError::InvalidState(format!(
                "room `{}` is finished",
                room.code
            )))
        };
    }

    if update.status == Some(RoomStatus::Waiting) && room.status != RoomStatus::Waiting {
        return Err(ServiceError::InvalidState(
            "a started room cannot go back to waiting".into(),
        ));
    }

    if let Some(index) = update.current_question_index {
        if index >= room.question_count() {
            return Err(ServiceError::InvalidInput(format!(
                "question index {index} out of range (room has {} questions)",
                room.question_count()
            )));
        }
    }

    Ok(true)
}

/// Overwrite the room status and/or current question index (last write wins).
pub async fn update_room(
    state: &SharedState,
    code: &str,
    update: RoomUpdate,
) -> Result<RoomEntity, ServiceError> {
    let code = normalize_code(code);
    let store = state.require_room_store().await?;
    let current = store.get_room(&code).await?.room;

    if !validate_room_update(&current, &update)? {
        debug!(code = %code, "ignoring repeated finish");
        return Ok(current);
    }

    let room = store.update_room(&code, update).await?;
    info!(
        code = %code,
        status = room.status.as_str(),
        question = room.current_question_index,
        "room updated"
    );
    state
        .notifier()
        .publish(ChangeEvent::room(room.id, ChangeKind::RoomUpdated));
    Ok(room)
}

/// Delete a room and its players, closing its change feed.
pub async fn delete_room(state: &SharedState, code: &str) -> Result<RoomEntity, ServiceError> {
    let code = normalize_code(code);
    let store = state.require_room_store().await?;
    let room = store.delete_room(&code).await?;
    info!(code = %code, "room deleted");
    announce_deleted(state, &room);
    Ok(room)
}

/// Tell the room's subscribers it is gone, then drop its channel.
pub(crate) fn announce_deleted(state: &SharedState, room: &RoomEntity) {
    let notifier = state.notifier();
    notifier.publish(ChangeEvent::room(room.id, ChangeKind::RoomDeleted));
    notifier.forget_room(room.id);
}

/// Record an answer. Correctness is derived from the room's quiz and the
/// elapsed time is clamped to the question time limit.
pub async fn submit_answer(
    state: &SharedState,
    code: &str,
    submission: AnswerSubmission,
) -> Result<AnswerReceipt, ServiceError> {
    let code = normalize_code(code);
    let store = state.require_room_store().await?;
    let time_limit_ms = state.timings().question_time_limit_ms();

    let room = store.get_room(&code).await?.room;
    let player = store.get_player(submission.player_id).await?;
    if player.room_id != room.id {
        return Err(ServiceError::NotFound(format!(
            "player `{}` is not in room `{code}`",
            submission.player_id
        )));
    }

    let answer = build_answer(&room, &submission, time_limit_ms)?;
    let outcome = store
        .append_answer(submission.player_id, answer, time_limit_ms)
        .await?;

    let duplicate = matches!(outcome, AppendOutcome::Duplicate(_));
    let player = outcome.into_player();
    let question_score = player
        .answer_for(submission.question_index)
        .map(|stored| scoring::answer_points(stored, time_limit_ms))
        .unwrap_or(0);

    if duplicate {
        debug!(
            code = %code,
            player = %player.name,
            question = submission.question_index,
            "duplicate answer ignored"
        );
    } else {
        debug!(
            code = %code,
            player = %player.name,
            question = submission.question_index,
            question_score,
            "answer recorded"
        );
        state
            .notifier()
            .publish(ChangeEvent::player(room.id, ChangeKind::PlayerUpdated));
    }

    Ok(AnswerReceipt {
        player,
        question_score,
        duplicate,
    })
}

fn build_answer(
    room: &RoomEntity,
    submission: &AnswerSubmission,
    time_limit_ms: u64,
) -> Result<AnswerEntity, ServiceError> {
    if room.status != RoomStatus::Playing {
        return Err(ServiceError::InvalidState(format!(
            "room `{}` is {}; answers are not accepted",
            room.code,
            room.status.as_str()
        )));
    }
    if submission.question_index > room.current_question_index {
        return Err(ServiceError::InvalidState(format!(
            "question {} has not been asked yet",
            submission.question_index
        )));
    }
    let question = room.question(submission.question_index).ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "question index {} out of range",
            submission.question_index
        ))
    })?;

    let selected = submission.selected_index;
    if !(-1..=3).contains(&selected) {
        return Err(ServiceError::InvalidInput(format!(
            "selected index {selected} out of range"
        )));
    }

    Ok(AnswerEntity {
        question_index: submission.question_index,
        selected_index: selected,
        is_correct: usize::try_from(selected).is_ok_and(|index| index == question.correct_index),
        time_ms: submission.time_ms.min(time_limit_ms),
    })
}
