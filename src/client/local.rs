use futures::{StreamExt, future::BoxFuture};

use crate::{
    client::{
        api::{ChangeStream, ClientError, JoinedRoom, RoomApi},
        snapshot::RoomSnapshot,
    },
    dao::models::RoomUpdate,
    services::room_service::{self, AnswerSubmission},
    state::SharedState,
};

/// [`RoomApi`] running against the in-process services, for bots hosted next
/// to the server and for tests.
#[derive(Clone)]
pub struct LocalRoomApi {
    state: SharedState,
}

impl LocalRoomApi {
    /// API over `state`.
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl RoomApi for LocalRoomApi {
    fn join_room(&self, code: &str, name: &str) -> BoxFuture<'static, Result<JoinedRoom, ClientError>> {
        let state = self.state.clone();
        let code = code.to_owned();
        let name = name.to_owned();
        Box::pin(async move {
            let session = room_service::join_room(&state, &code, &name).await?;
            Ok(JoinedRoom {
                player_id: session.player.id,
                snapshot: RoomSnapshot::from(&session.room),
                resumed: session.resumed,
            })
        })
    }

    fn fetch_room(&self, code: &str) -> BoxFuture<'static, Result<RoomSnapshot, ClientError>> {
        let state = self.state.clone();
        let code = code.to_owned();
        Box::pin(async move {
            let room = room_service::get_room(&state, &code).await?;
            Ok(RoomSnapshot::from(&room))
        })
    }

    fn update_room(
        &self,
        code: &str,
        update: RoomUpdate,
    ) -> BoxFuture<'static, Result<(), ClientError>> {
        let state = self.state.clone();
        let code = code.to_owned();
        Box::pin(async move {
            room_service::update_room(&state, &code, update).await?;
            Ok(())
        })
    }

    fn submit_answer(
        &self,
        code: &str,
        submission: AnswerSubmission,
    ) -> BoxFuture<'static, Result<(), ClientError>> {
        let state = self.state.clone();
        let code = code.to_owned();
        Box::pin(async move {
            room_service::submit_answer(&state, &code, submission).await?;
            Ok(())
        })
    }

    fn subscribe(&self, code: &str) -> BoxFuture<'static, Result<ChangeStream, ClientError>> {
        let state = self.state.clone();
        let code = code.to_owned();
        Box::pin(async move {
            let room = room_service::get_room(&state, &code).await?;
            let subscription = state.notifier().subscribe(room.room.id);
            Ok(subscription.into_stream().boxed())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{models::RoomStatus, room_store::MemoryRoomStore},
        quiz::fixture::StaticQuizProvider,
        state::AppState,
    };

    async fn api() -> (LocalRoomApi, String) {
        let state = AppState::with_store(
            AppConfig::default(),
            Arc::new(StaticQuizProvider::sample()),
            Arc::new(MemoryRoomStore::new()),
        )
        .await;
        let session = room_service::create_room(&state, "https://example.com/v", "Host")
            .await
            .unwrap();
        (LocalRoomApi::new(state), session.room.room.code)
    }

    #[tokio::test]
    async fn join_then_fetch_sees_roster() {
        let (api, code) = api().await;
        let joined = api.join_room(&code.to_lowercase(), "Bob").await.unwrap();
        assert!(!joined.resumed);

        let again = api.join_room(&code, "Bob").await.unwrap();
        assert!(again.resumed);
        assert_eq!(again.player_id, joined.player_id);

        let snapshot = api.fetch_room(&code).await.unwrap();
        assert_eq!(snapshot.players.len(), 2);
        assert_eq!(snapshot.status, RoomStatus::Waiting);
    }

    #[tokio::test]
    async fn updates_reach_subscribers() {
        let (api, code) = api().await;
        let mut changes = api.subscribe(&code).await.unwrap();
        api.update_room(&code, RoomUpdate::start()).await.unwrap();
        assert!(changes.next().await.is_some());
        assert_eq!(api.fetch_room(&code).await.unwrap().status, RoomStatus::Playing);
    }

    #[tokio::test]
    async fn missing_room_is_not_found() {
        let (api, _) = api().await;
        assert!(matches!(
            api.fetch_room("ZZZZZZ").await,
            Err(ClientError::NotFound)
        ));
    }
}
