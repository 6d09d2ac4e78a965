/// In-process room store.
pub mod memory;
/// MongoDB-backed room store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    AnswerEntity, AppendOutcome, PlayerEntity, RoomEntity, RoomUpdate, RoomWithPlayers,
};
use crate::dao::storage::StorageResult;

pub use memory::MemoryRoomStore;

/// Abstraction over the durable room/player store shared by every client of a room.
///
/// Room codes passed in are expected to be normalised (trimmed, uppercase).
pub trait RoomStore: Send + Sync {
    /// Insert a room and its host player as one atomic unit.
    fn create_room(
        &self,
        room: RoomEntity,
        host: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<RoomWithPlayers>>;
    /// Read a room and its roster.
    fn get_room(&self, code: &str) -> BoxFuture<'static, StorageResult<RoomWithPlayers>>;
    /// Overwrite the fields carried by `update` (last write wins).
    fn update_room(
        &self,
        code: &str,
        update: RoomUpdate,
    ) -> BoxFuture<'static, StorageResult<RoomEntity>>;
    /// Delete a room and, by cascade, its players. Returns the deleted room.
    fn delete_room(&self, code: &str) -> BoxFuture<'static, StorageResult<RoomEntity>>;
    /// Insert a player; fails with `Conflict` when the name is taken in that room.
    fn add_player(
        &self,
        code: &str,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>>;
    /// Read a player by id.
    fn get_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<PlayerEntity>>;
    /// Look a player up by name within a room.
    fn find_player_by_name(
        &self,
        code: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Atomically append an answer and recompute the score; duplicates are ignored.
    fn append_answer(
        &self,
        player_id: Uuid,
        answer: AnswerEntity,
        time_limit_ms: u64,
    ) -> BoxFuture<'static, StorageResult<AppendOutcome>>;
    /// Delete every room created before `cutoff`, returning the deleted rooms.
    fn delete_rooms_created_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>>;
    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
