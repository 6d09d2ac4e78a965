use futures::{future::BoxFuture, stream::BoxStream};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    client::snapshot::RoomSnapshot,
    dao::models::RoomUpdate,
    error::ServiceError,
    services::room_service::AnswerSubmission,
    state::ChangeEvent,
};

/// Failures seen by a client. `NotFound` is terminal for the session; the
/// others are retried by the next refresh.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The room (or player) no longer exists.
    #[error("room not found")]
    NotFound,
    /// The write raced with another one, e.g. a duplicate join.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The request was invalid; retrying will not help.
    #[error("rejected: {0}")]
    Rejected(String),
    /// Transient failure of the server or the store.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<ServiceError> for ClientError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::NotFound(_) => ClientError::NotFound,
            ServiceError::InvalidState(message) => ClientError::Conflict(message),
            ServiceError::InvalidInput(message) | ServiceError::Unauthorized(message) => {
                ClientError::Rejected(message)
            }
            ServiceError::ContentGeneration(err) => ClientError::Rejected(err.to_string()),
            unavailable @ (ServiceError::Unavailable(_) | ServiceError::Degraded) => {
                ClientError::Unavailable(unavailable.to_string())
            }
        }
    }
}

/// Outcome of joining a room.
#[derive(Debug, Clone)]
pub struct JoinedRoom {
    /// Player id.
    pub player_id: Uuid,
    /// Room as seen right after the join.
    pub snapshot: RoomSnapshot,
    /// An existing player with that name was resumed.
    pub resumed: bool,
}

/// Stream of change hints for one room. Items only mean "re-fetch".
pub type ChangeStream = BoxStream<'static, ChangeEvent>;

/// Store and notifier operations a client synchronizer needs.
pub trait RoomApi: Send + Sync + 'static {
    /// Join `code` as `name`, or resume the player already using that name.
    fn join_room(&self, code: &str, name: &str) -> BoxFuture<'static, Result<JoinedRoom, ClientError>>;
    /// Read the room and its roster.
    fn fetch_room(&self, code: &str) -> BoxFuture<'static, Result<RoomSnapshot, ClientError>>;
    /// Overwrite status and/or current question.
    fn update_room(
        &self,
        code: &str,
        update: RoomUpdate,
    ) -> BoxFuture<'static, Result<(), ClientError>>;
    /// Record an answer; duplicates are ignored by the store.
    fn submit_answer(
        &self,
        code: &str,
        submission: AnswerSubmission,
    ) -> BoxFuture<'static, Result<(), ClientError>>;
    /// Open the change feed of the room.
    fn subscribe(&self, code: &str) -> BoxFuture<'static, Result<ChangeStream, ClientError>>;
}
