use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::open_database,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{MongoPlayerDocument, MongoRoomDocument, answer_document, doc_id},
};
use crate::{
    dao::{
        models::{
            AnswerEntity, AppendOutcome, PlayerEntity, RoomEntity, RoomUpdate, RoomWithPlayers,
        },
        room_store::RoomStore,
        storage::StorageResult,
    },
    scoring,
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const PLAYER_COLLECTION_NAME: &str = "players";

/// Room store over the `rooms` and `players` collections.
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = open_database(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure the uniqueness indexes exist.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = open_database(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let rooms = self.rooms().await;
        let code_index = mongodb::IndexModel::builder()
            .keys(doc! {"code": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_code_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        rooms
            .create_index(code_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "code",
                source,
            })?;

        let players = self.players().await;
        let name_index = mongodb::IndexModel::builder()
            .keys(doc! {"room_id": 1, "name": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("player_room_name_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        players
            .create_index(name_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_COLLECTION_NAME,
                index: "room_id,name",
                source,
            })?;

        Ok(())
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    async fn find_room_document(&self, code: &str) -> MongoResult<RoomEntity> {
        let document = self
            .rooms()
            .await
            .find_one(doc! {"code": code})
            .await
            .map_err(|source| MongoDaoError::LoadRoom {
                code: code.to_owned(),
                source,
            })?
            .ok_or_else(|| MongoDaoError::RoomNotFound {
                code: code.to_owned(),
            })?;
        document.try_into()
    }

    async fn players_of(&self, room: &RoomEntity) -> MongoResult<Vec<PlayerEntity>> {
        let documents: Vec<MongoPlayerDocument> = self
            .players()
            .await
            .find(doc! {"room_id": room.id.to_string()})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::LoadRoom {
                code: room.code.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadRoom {
                code: room.code.clone(),
                source,
            })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_room(
        &self,
        room: RoomEntity,
        host: PlayerEntity,
    ) -> MongoResult<RoomWithPlayers> {
        let code = room.code.clone();
        let room_document: MongoRoomDocument = room.clone().into();
        self.rooms()
            .await
            .insert_one(&room_document)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::DuplicateKey {
                        what: format!("room code `{code}` already in use"),
                    }
                } else {
                    MongoDaoError::SaveRoom {
                        code: code.clone(),
                        source,
                    }
                }
            })?;

        let host_document: MongoPlayerDocument = host.clone().into();
        if let Err(source) = self.players().await.insert_one(&host_document).await {
            // Host insert failed: roll the room back.
            if let Err(err) = self.rooms().await.delete_one(doc_id(room.id)).await {
                warn!(code = %code, error = %err, "rollback of hostless room failed");
            }
            return Err(MongoDaoError::SavePlayer {
                id: host.id,
                source,
            });
        }

        Ok(RoomWithPlayers {
            room,
            players: vec![host],
        })
    }

    async fn get_room(&self, code: &str) -> MongoResult<RoomWithPlayers> {
        let room = self.find_room_document(code).await?;
        let players = self.players_of(&room).await?;
        Ok(RoomWithPlayers { room, players })
    }

    async fn update_room(&self, code: &str, update: RoomUpdate) -> MongoResult<RoomEntity> {
        let mut set = Document::new();
        if let Some(status) = update.status {
            set.insert("status", status.as_str());
        }
        if let Some(index) = update.current_question_index {
            set.insert("current_question_index", index as i64);
        }
        if set.is_empty() {
            return self.find_room_document(code).await;
        }

        let document = self
            .rooms()
            .await
            .find_one_and_update(doc! {"code": code}, doc! {"$set": set})
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveRoom {
                code: code.to_owned(),
                source,
            })?
            .ok_or_else(|| MongoDaoError::RoomNotFound {
                code: code.to_owned(),
            })?;
        document.try_into()
    }

    async fn delete_room(&self, code: &str) -> MongoResult<RoomEntity> {
        let document = self
            .rooms()
            .await
            .find_one_and_delete(doc! {"code": code})
            .await
            .map_err(|source| MongoDaoError::DeleteRoom {
                code: code.to_owned(),
                source,
            })?
            .ok_or_else(|| MongoDaoError::RoomNotFound {
                code: code.to_owned(),
            })?;
        let room: RoomEntity = document.try_into()?;

        self.players()
            .await
            .delete_many(doc! {"room_id": room.id.to_string()})
            .await
            .map_err(|source| MongoDaoError::DeleteRoom {
                code: code.to_owned(),
                source,
            })?;

        Ok(room)
    }

    async fn add_player(&self, code: &str, player: PlayerEntity) -> MongoResult<PlayerEntity> {
        let room = self.find_room_document(code).await?;
        let mut player = player;
        player.room_id = room.id;

        let document: MongoPlayerDocument = player.clone().into();
        self.players()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::DuplicateKey {
                        what: format!("player `{}` already joined room `{code}`", player.name),
                    }
                } else {
                    MongoDaoError::SavePlayer {
                        id: player.id,
                        source,
                    }
                }
            })?;

        Ok(player)
    }

    async fn get_player(&self, id: Uuid) -> MongoResult<PlayerEntity> {
        self.players()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { id, source })?
            .ok_or(MongoDaoError::PlayerNotFound { id })?
            .try_into()
    }

    async fn find_player_by_name(
        &self,
        code: &str,
        name: &str,
    ) -> MongoResult<Option<PlayerEntity>> {
        let room = self.find_room_document(code).await?;
        let document = self
            .players()
            .await
            .find_one(doc! {"room_id": room.id.to_string(), "name": name})
            .await
            .map_err(|source| MongoDaoError::LoadRoom {
                code: code.to_owned(),
                source,
            })?;
        document.map(TryInto::try_into).transpose()
    }

    async fn append_answer(
        &self,
        player_id: Uuid,
        answer: AnswerEntity,
        time_limit_ms: u64,
    ) -> MongoResult<AppendOutcome> {
        let points = scoring::answer_points(&answer, time_limit_ms);
        let filter = doc! {
            "_id": player_id.to_string(),
            "answers.question_index": {"$ne": answer.question_index as i64},
        };
        let update = doc! {
            "$push": {"answers": answer_document(&answer)},
            "$inc": {"score": i64::from(points)},
        };

        let players = self.players().await;
        let updated = players
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SavePlayer {
                id: player_id,
                source,
            })?;

        match updated {
            Some(document) => Ok(AppendOutcome::Appended(document.try_into()?)),
            // Filter missed: either the answer is already there or the player is gone.
            None => {
                let existing = self.get_player(player_id).await?;
                Ok(AppendOutcome::Duplicate(existing))
            }
        }
    }

    async fn delete_rooms_created_before(
        &self,
        cutoff: SystemTime,
    ) -> MongoResult<Vec<RoomEntity>> {
        let filter = doc! {"created_at": {"$lt": DateTime::from_system_time(cutoff)}};
        let expired: Vec<MongoRoomDocument> = self
            .rooms()
            .await
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::Sweep { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Sweep { source })?;

        let mut deleted = Vec::with_capacity(expired.len());
        for document in expired {
            let room: RoomEntity = document.try_into()?;
            match self.delete_room(&room.code).await {
                Ok(room) => deleted.push(room),
                // Someone else removed it between the scan and the delete.
                Err(MongoDaoError::RoomNotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(deleted)
    }
}

impl RoomStore for MongoRoomStore {
    fn create_room(
        &self,
        room: RoomEntity,
        host: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<RoomWithPlayers>> {
        let store = self.clone();
        Box::pin(async move { store.create_room(room, host).await.map_err(Into::into) })
    }

    fn get_room(&self, code: &str) -> BoxFuture<'static, StorageResult<RoomWithPlayers>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.get_room(&code).await.map_err(Into::into) })
    }

    fn update_room(
        &self,
        code: &str,
        update: RoomUpdate,
    ) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.update_room(&code, update).await.map_err(Into::into) })
    }

    fn delete_room(&self, code: &str) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.delete_room(&code).await.map_err(Into::into) })
    }

    fn add_player(
        &self,
        code: &str,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.add_player(&code, player).await.map_err(Into::into) })
    }

    fn get_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        Box::pin(async move { store.get_player(id).await.map_err(Into::into) })
    }

    fn find_player_by_name(
        &self,
        code: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        let code = code.to_owned();
        let name = name.to_owned();
        Box::pin(async move {
            store
                .find_player_by_name(&code, &name)
                .await
                .map_err(Into::into)
        })
    }

    fn append_answer(
        &self,
        player_id: Uuid,
        answer: AnswerEntity,
        time_limit_ms: u64,
    ) -> BoxFuture<'static, StorageResult<AppendOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .append_answer(player_id, answer, time_limit_ms)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_rooms_created_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_rooms_created_before(cutoff)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
