//! In-process room store backed by concurrent maps.
//!
//! Per-room and per-player mutations happen while holding the corresponding map
//! shard lock, which gives the atomic read-modify-write the synchronizer relies on.
//! Locks are always taken rooms first, players second.

use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::{
        models::{
            AnswerEntity, AppendOutcome, PlayerEntity, RoomEntity, RoomUpdate, RoomWithPlayers,
        },
        room_store::RoomStore,
        storage::{StorageError, StorageResult},
    },
    scoring,
};

/// Rooms by code and players by id, kept in memory.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rooms: DashMap<String, RoomRecord>,
    players: DashMap<Uuid, PlayerEntity>,
}

struct RoomRecord {
    room: RoomEntity,
    player_ids: Vec<Uuid>,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn create_room(&self, room: RoomEntity, host: PlayerEntity) -> StorageResult<RoomWithPlayers> {
        match self.inner.rooms.entry(room.code.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(format!(
                "room code `{}` already in use",
                room.code
            ))),
            Entry::Vacant(slot) => {
                self.inner.players.insert(host.id, host.clone());
                slot.insert(RoomRecord {
                    room: room.clone(),
                    player_ids: vec![host.id],
                });
                Ok(RoomWithPlayers {
                    room,
                    players: vec![host],
                })
            }
        }
    }

    fn get_room(&self, code: &str) -> StorageResult<RoomWithPlayers> {
        let (room, player_ids) = {
            let record = self
                .inner
                .rooms
                .get(code)
                .ok_or_else(|| room_not_found(code))?;
            (record.room.clone(), record.player_ids.clone())
        };

        let players = player_ids
            .iter()
            .filter_map(|id| self.inner.players.get(id).map(|entry| entry.clone()))
            .collect();

        Ok(RoomWithPlayers { room, players })
    }

    fn update_room(&self, code: &str, update: RoomUpdate) -> StorageResult<RoomEntity> {
        let mut record = self
            .inner
            .rooms
            .get_mut(code)
            .ok_or_else(|| room_not_found(code))?;
        update.apply_to(&mut record.room);
        Ok(record.room.clone())
    }

    fn delete_room(&self, code: &str) -> StorageResult<RoomEntity> {
        let (_, record) = self
            .inner
            .rooms
            .remove(code)
            .ok_or_else(|| room_not_found(code))?;
        for id in &record.player_ids {
            self.inner.players.remove(id);
        }
        Ok(record.room)
    }

    fn add_player(&self, code: &str, player: PlayerEntity) -> StorageResult<PlayerEntity> {
        let mut record = self
            .inner
            .rooms
            .get_mut(code)
            .ok_or_else(|| room_not_found(code))?;

        let name_taken = record.player_ids.iter().any(|id| {
            self.inner
                .players
                .get(id)
                .is_some_and(|existing| existing.name == player.name)
        });
        if name_taken {
            return Err(StorageError::Conflict(format!(
                "player `{}` already joined room `{code}`",
                player.name
            )));
        }

        let mut player = player;
        player.room_id = record.room.id;
        record.player_ids.push(player.id);
        self.inner.players.insert(player.id, player.clone());
        Ok(player)
    }

    fn get_player(&self, id: Uuid) -> StorageResult<PlayerEntity> {
        self.inner
            .players
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StorageError::NotFound(format!("player `{id}` not found")))
    }

    fn find_player_by_name(&self, code: &str, name: &str) -> StorageResult<Option<PlayerEntity>> {
        let player_ids = {
            let record = self
                .inner
                .rooms
                .get(code)
                .ok_or_else(|| room_not_found(code))?;
            record.player_ids.clone()
        };

        Ok(player_ids.iter().find_map(|id| {
            self.inner
                .players
                .get(id)
                .filter(|player| player.name == name)
                .map(|player| player.clone())
        }))
    }

    fn append_answer(
        &self,
        player_id: Uuid,
        answer: AnswerEntity,
        time_limit_ms: u64,
    ) -> StorageResult<AppendOutcome> {
        let mut player = self
            .inner
            .players
            .get_mut(&player_id)
            .ok_or_else(|| StorageError::NotFound(format!("player `{player_id}` not found")))?;

        if player.has_answered(answer.question_index) {
            return Ok(AppendOutcome::Duplicate(player.clone()));
        }

        player.answers.push(answer);
        player.score = scoring::total_score(&player.answers, time_limit_ms);
        Ok(AppendOutcome::Appended(player.clone()))
    }

    fn delete_rooms_created_before(&self, cutoff: SystemTime) -> Vec<RoomEntity> {
        let expired: Vec<String> = self
            .inner
            .rooms
            .iter()
            .filter(|record| record.room.created_at < cutoff)
            .map(|record| record.key().clone())
            .collect();

        expired
            .iter()
            .filter_map(|code| self.delete_room(code).ok())
            .collect()
    }
}

fn room_not_found(code: &str) -> StorageError {
    StorageError::NotFound(format!("room `{code}` not found"))
}

impl RoomStore for MemoryRoomStore {
    fn create_room(
        &self,
        room: RoomEntity,
        host: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<RoomWithPlayers>> {
        let result = self.create_room(room, host);
        Box::pin(async move { result })
    }

    fn get_room(&self, code: &str) -> BoxFuture<'static, StorageResult<RoomWithPlayers>> {
        let result = self.get_room(code);
        Box::pin(async move { result })
    }

    fn update_room(
        &self,
        code: &str,
        update: RoomUpdate,
    ) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let result = self.update_room(code, update);
        Box::pin(async move { result })
    }

    fn delete_room(&self, code: &str) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let result = self.delete_room(code);
        Box::pin(async move { result })
    }

    fn add_player(
        &self,
        code: &str,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let result = self.add_player(code, player);
        Box::pin(async move { result })
    }

    fn get_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let result = self.get_player(id);
        Box::pin(async move { result })
    }

    fn find_player_by_name(
        &self,
        code: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let result = self.find_player_by_name(code, name);
        Box::pin(async move { result })
    }

    fn append_answer(
        &self,
        player_id: Uuid,
        answer: AnswerEntity,
        time_limit_ms: u64,
    ) -> BoxFuture<'static, StorageResult<AppendOutcome>> {
        let result = self.append_answer(player_id, answer, time_limit_ms);
        Box::pin(async move { result })
    }

    fn delete_rooms_created_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        let deleted = self.delete_rooms_created_before(cutoff);
        Box::pin(async move { Ok(deleted) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::models::{QuestionEntity, QuizEntity, RoomStatus};

    const LIMIT: u64 = 15_000;

    fn room(code: &str) -> RoomEntity {
        RoomEntity {
            id: Uuid::new_v4(),
            code: code.into(),
            source_url: "https://example.com/watch?v=abc".into(),
            source_title: "Example".into(),
            quiz: QuizEntity {
                questions: vec![QuestionEntity {
                    question: "Q?".into(),
                    choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_index: 2,
                    explanation: "because".into(),
                }],
            },
            status: RoomStatus::Waiting,
            current_question_index: 0,
            created_at: SystemTime::now(),
        }
    }

    fn seeded(code: &str) -> (MemoryRoomStore, RoomWithPlayers) {
        let store = MemoryRoomStore::new();
        let room = room(code);
        let host = PlayerEntity::new(room.id, "host".into(), true);
        let created = store.create_room(room, host).unwrap();
        (store, created)
    }

    fn correct(question_index: usize, time_ms: u64) -> AnswerEntity {
        AnswerEntity {
            question_index,
            selected_index: 2,
            is_correct: true,
            time_ms,
        }
    }

    #[test]
    fn duplicate_room_code_conflicts() {
        let (store, created) = seeded("ABCDEF");
        let host = PlayerEntity::new(created.room.id, "other".into(), true);
        let err = store.create_room(room("ABCDEF"), host).unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[test]
    fn duplicate_player_name_conflicts() {
        let (store, created) = seeded("ABCDEF");
        let first = PlayerEntity::new(created.room.id, "bob".into(), false);
        store.add_player("ABCDEF", first.clone()).unwrap();

        let second = PlayerEntity::new(created.room.id, "bob".into(), false);
        let err = store.add_player("ABCDEF", second).unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        let found = store.find_player_by_name("ABCDEF", "bob").unwrap();
        assert_eq!(found.map(|p| p.id), Some(first.id));
        assert_eq!(store.get_room("ABCDEF").unwrap().players.len(), 2);
    }

    #[test]
    fn second_answer_for_same_question_is_ignored() {
        let (store, created) = seeded("ABCDEF");
        let host_id = created.players[0].id;

        let first = store.append_answer(host_id, correct(0, 1_000), LIMIT).unwrap();
        assert!(matches!(first, AppendOutcome::Appended(_)));
        assert_eq!(first.player().score, 1_450);

        let retry = store.append_answer(host_id, correct(0, 0), LIMIT).unwrap();
        assert!(matches!(retry, AppendOutcome::Duplicate(_)));

        let player = store.get_player(host_id).unwrap();
        assert_eq!(player.answers.len(), 1);
        assert_eq!(player.score, 1_450);
    }

    #[tokio::test]
    async fn concurrent_appends_for_one_player_never_double_count() {
        let (store, created) = seeded("ABCDEF");
        let host_id = created.players[0].id;

        let tasks = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    RoomStore::append_answer(&store, host_id, correct(0, 1_000), LIMIT).await
                })
            })
            .collect::<Vec<_>>();

        let mut appended = 0;
        for task in tasks {
            if let AppendOutcome::Appended(_) = task.await.unwrap().unwrap() {
                appended += 1;
            }
        }

        assert_eq!(appended, 1);
        let player = store.get_player(host_id).unwrap();
        assert_eq!(player.answers.len(), 1);
        assert_eq!(player.score, 1_450);
    }

    #[test]
    fn update_overwrites_only_given_fields() {
        let (store, _) = seeded("ABCDEF");
        let room = store.update_room("ABCDEF", RoomUpdate::start()).unwrap();
        assert_eq!(room.status, RoomStatus::Playing);
        assert_eq!(room.current_question_index, 0);

        let room = store.update_room("ABCDEF", RoomUpdate::advance_to(3)).unwrap();
        assert_eq!(room.status, RoomStatus::Playing);
        assert_eq!(room.current_question_index, 3);
    }

    #[test]
    fn delete_cascades_to_players() {
        let (store, created) = seeded("ABCDEF");
        let host_id = created.players[0].id;
        store.delete_room("ABCDEF").unwrap();

        assert!(matches!(
            store.get_room("ABCDEF").unwrap_err(),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            store.get_player(host_id).unwrap_err(),
            StorageError::NotFound(_)
        ));
    }

    #[test]
    fn sweep_removes_only_expired_rooms() {
        let store = MemoryRoomStore::new();
        let mut old = room("OLD111");
        old.created_at = SystemTime::now() - Duration::from_secs(25 * 3600);
        let fresh = room("NEW222");
        store
            .create_room(old.clone(), PlayerEntity::new(old.id, "a".into(), true))
            .unwrap();
        store
            .create_room(fresh.clone(), PlayerEntity::new(fresh.id, "b".into(), true))
            .unwrap();

        let cutoff = SystemTime::now() - Duration::from_secs(24 * 3600);
        let deleted = store.delete_rooms_created_before(cutoff);

        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].code, "OLD111");
        assert!(store.get_room("NEW222").is_ok());
    }
}
