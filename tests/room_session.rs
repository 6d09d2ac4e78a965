use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures::{
    FutureExt,
    future::{BoxFuture, ready},
};
use tokio::time::{Instant, sleep, sleep_until, timeout};

use quiz_room_back::{
    client::{
        ClientError, ClientHandle, ClientOptions, ClientPhase, ClientView, JoinedRoom,
        LocalRoomApi, RoomApi, api::ChangeStream, snapshot::RoomSnapshot,
    },
    config::AppConfig,
    dao::{
        models::{RoomStatus, RoomUpdate},
        room_store::MemoryRoomStore,
    },
    quiz::StaticQuizProvider,
    services::room_service::{self, AnswerSubmission},
    state::{AppState, SharedState},
};

async fn within<F>(future: F) -> ClientView
where
    F: Future<Output = Option<ClientView>>,
{
    timeout(Duration::from_secs(120), future)
        .await
        .expect("client did not reach the expected view in time")
        .expect("client stopped")
}

struct Room {
    state: SharedState,
    api: Arc<dyn RoomApi>,
    code: String,
    host_id: uuid::Uuid,
}

async fn open_room() -> Room {
    let state = AppState::with_store(
        AppConfig::default(),
        Arc::new(StaticQuizProvider::sample()),
        Arc::new(MemoryRoomStore::new()),
    )
    .await;
    let created = room_service::create_room(&state, "https://www.youtube.com/watch?v=quiz", "Alice")
        .await
        .unwrap();
    Room {
        api: Arc::new(LocalRoomApi::new(state.clone())),
        code: created.room.room.code,
        host_id: created.player.id,
        state,
    }
}

fn spawn_client(room: &Room, player_id: uuid::Uuid) -> ClientHandle {
    ClientHandle::spawn(room.api.clone(), ClientOptions::new(room.code.clone(), player_id))
}

#[tokio::test(start_paused = true)]
async fn two_players_play_the_first_question() {
    let room = open_room().await;
    let bob = room.api.join_room(&room.code, "Bob").await.unwrap();
    assert!(!bob.resumed);

    let alice_client = spawn_client(&room, room.host_id);
    let bob_client = spawn_client(&room, bob.player_id);

    within(alice_client.wait_for(|view| view.is_host && view.player_count == 2)).await;
    within(bob_client.wait_for(|view| !view.is_host && view.player_count == 2)).await;

    // Bob's observed question indices, to check none is skipped.
    let mut bob_views = bob_client.watch();
    let recorder = tokio::spawn(async move {
        let mut seen: Vec<usize> = Vec::new();
        loop {
            let index = bob_views.borrow_and_update().question_index;
            if seen.last() != Some(&index) {
                seen.push(index);
            }
            if index >= 1 || bob_views.changed().await.is_err() {
                return seen;
            }
        }
    });

    assert!(alice_client.start_game().await);
    within(alice_client.wait_for(|view| view.phase == ClientPhase::Countdown)).await;
    within(bob_client.wait_for(|view| view.phase == ClientPhase::Countdown)).await;

    let alice_question = within(alice_client.wait_for(|view| view.phase == ClientPhase::Question)).await;
    let bob_question = within(bob_client.wait_for(|view| view.phase == ClientPhase::Question)).await;
    assert_eq!(alice_question.question_index, 0);
    assert_eq!(bob_question.question_index, 0);
    let correct = alice_question.question.as_ref().unwrap().correct_index;

    sleep_until(alice_question.question_started_at.unwrap() + Duration::from_millis(1_000)).await;
    assert!(alice_client.answer(correct).await);
    within(alice_client.wait_for(|view| view.has_answered)).await;
    assert_eq!(bob_client.view().phase, ClientPhase::Question);

    sleep_until(bob_question.question_started_at.unwrap() + Duration::from_millis(9_000)).await;
    assert!(bob_client.answer(correct).await);

    // Both reveal on Bob's answer, well before the question timer runs out.
    let alice_reveal = within(alice_client.wait_for(|view| view.phase == ClientPhase::ShowingAnswer)).await;
    let bob_reveal = within(bob_client.wait_for(|view| view.phase == ClientPhase::ShowingAnswer)).await;
    assert!(alice_reveal.time_left > 0);
    assert!(bob_reveal.time_left > 0);
    assert!(Instant::now() < bob_question.question_started_at.unwrap() + Duration::from_secs(15));

    let snapshot = room_service::get_room(&room.state, &room.code).await.unwrap();
    let score_of = |name: &str| {
        snapshot
            .players
            .iter()
            .find(|player| player.name == name)
            .map(|player| player.score)
    };
    assert_eq!(score_of("Alice"), Some(1450));
    assert_eq!(score_of("Bob"), Some(1050));

    let alice_next = within(
        alice_client.wait_for(|view| view.phase == ClientPhase::Countdown && view.question_index == 1),
    )
    .await;
    let bob_next = within(
        bob_client.wait_for(|view| view.phase == ClientPhase::Countdown && view.question_index == 1),
    )
    .await;
    assert!(!alice_next.has_answered);
    assert!(!bob_next.has_answered);

    let room_now = room_service::get_room(&room.state, &room.code).await.unwrap().room;
    assert_eq!(room_now.status, RoomStatus::Playing);
    assert_eq!(room_now.current_question_index, 1);
    assert_eq!(recorder.await.unwrap(), vec![0, 1]);

    alice_client.leave().await;
    bob_client.leave().await;
}

#[tokio::test(start_paused = true)]
async fn duplicated_host_tabs_advance_exactly_once() {
    let room = open_room().await;
    let bob = room.api.join_room(&room.code, "Bob").await.unwrap();

    // The host has the room open twice; both tabs see every reveal.
    let first_tab = spawn_client(&room, room.host_id);
    let second_tab = spawn_client(&room, room.host_id);
    let bob_client = spawn_client(&room, bob.player_id);
    within(first_tab.wait_for(|view| view.is_host && view.player_count == 2)).await;
    within(second_tab.wait_for(|view| view.is_host && view.player_count == 2)).await;
    within(bob_client.wait_for(|view| view.player_count == 2)).await;

    assert!(first_tab.start_game().await);
    within(first_tab.wait_for(|view| view.phase == ClientPhase::Question)).await;
    within(second_tab.wait_for(|view| view.phase == ClientPhase::Question)).await;
    within(bob_client.wait_for(|view| view.phase == ClientPhase::Question)).await;

    assert!(first_tab.answer(1).await);
    assert!(bob_client.answer(0).await);

    for client in [&first_tab, &second_tab, &bob_client] {
        within(client.wait_for(|view| view.question_index == 1)).await;
    }

    // Still inside question 1's countdown: a second advance would show here.
    sleep(Duration::from_secs(2)).await;
    let current = room_service::get_room(&room.state, &room.code).await.unwrap().room;
    assert_eq!(current.current_question_index, 1);

    let alice = room_service::get_player(&room.state, room.host_id).await.unwrap();
    assert_eq!(alice.answers.len(), 1);

    first_tab.leave().await;
    second_tab.leave().await;
    bob_client.leave().await;
}

#[tokio::test(start_paused = true)]
async fn rejoining_by_name_resumes_mid_game() {
    let room = open_room().await;
    let bob = room.api.join_room(&room.code, "Bob").await.unwrap();
    room_service::update_room(&room.state, &room.code, quiz_room_back::dao::models::RoomUpdate::start())
        .await
        .unwrap();

    let again = room.api.join_room(&room.code, "Bob").await.unwrap();
    assert!(again.resumed);
    assert_eq!(again.player_id, bob.player_id);
    assert_eq!(again.snapshot.players.len(), 2);

    assert!(room.api.join_room(&room.code, "Carol").await.is_err());

    let client = spawn_client(&room, bob.player_id);
    let view = within(client.wait_for(|view| view.phase == ClientPhase::Countdown)).await;
    assert_eq!(view.question_index, 0);
    client.leave().await;
}

/// In-process API whose first answer and first advance past question 0 fail
/// as if the server were briefly unreachable.
struct FlakyApi {
    inner: LocalRoomApi,
    fail_answer: AtomicBool,
    fail_advance: AtomicBool,
}

impl FlakyApi {
    fn new(state: SharedState, fail_answer: bool, fail_advance: bool) -> Self {
        Self {
            inner: LocalRoomApi::new(state),
            fail_answer: AtomicBool::new(fail_answer),
            fail_advance: AtomicBool::new(fail_advance),
        }
    }

    fn unavailable<T: Send + 'static>() -> BoxFuture<'static, Result<T, ClientError>> {
        ready(Err(ClientError::Unavailable("connection reset".into()))).boxed()
    }
}

impl RoomApi for FlakyApi {
    fn join_room(&self, code: &str, name: &str) -> BoxFuture<'static, Result<JoinedRoom, ClientError>> {
        self.inner.join_room(code, name)
    }

    fn fetch_room(&self, code: &str) -> BoxFuture<'static, Result<RoomSnapshot, ClientError>> {
        self.inner.fetch_room(code)
    }

    fn update_room(&self, code: &str, update: RoomUpdate) -> BoxFuture<'static, Result<(), ClientError>> {
        let advances = update.current_question_index.is_some_and(|index| index > 0);
        if advances && self.fail_advance.swap(false, Ordering::SeqCst) {
            return Self::unavailable();
        }
        self.inner.update_room(code, update)
    }

    fn submit_answer(
        &self,
        code: &str,
        submission: AnswerSubmission,
    ) -> BoxFuture<'static, Result<(), ClientError>> {
        if self.fail_answer.swap(false, Ordering::SeqCst) {
            return Self::unavailable();
        }
        self.inner.submit_answer(code, submission)
    }

    fn subscribe(&self, code: &str) -> BoxFuture<'static, Result<ChangeStream, ClientError>> {
        self.inner.subscribe(code)
    }
}

#[tokio::test(start_paused = true)]
async fn host_advance_survives_a_failed_write() {
    let room = open_room().await;
    let api = Arc::new(FlakyApi::new(room.state.clone(), false, true));
    let client = ClientHandle::spawn(api.clone(), ClientOptions::new(room.code.clone(), room.host_id));

    within(client.wait_for(|view| view.is_host)).await;
    assert!(client.start_game().await);
    let question = within(client.wait_for(|view| view.phase == ClientPhase::Question)).await;
    assert!(client.answer(question.question.as_ref().unwrap().correct_index).await);
    within(client.wait_for(|view| view.phase == ClientPhase::ShowingAnswer)).await;

    let next = within(
        client.wait_for(|view| view.phase == ClientPhase::Countdown && view.question_index == 1),
    )
    .await;
    assert!(!next.has_answered);
    assert!(!api.fail_advance.load(Ordering::SeqCst));
    let current = room_service::get_room(&room.state, &room.code).await.unwrap().room;
    assert_eq!(current.current_question_index, 1);

    client.leave().await;
}

#[tokio::test(start_paused = true)]
async fn answer_lost_in_transit_is_recorded_before_the_timer_ends() {
    let room = open_room().await;
    let api = Arc::new(FlakyApi::new(room.state.clone(), true, false));
    let client = ClientHandle::spawn(api.clone(), ClientOptions::new(room.code.clone(), room.host_id));

    within(client.wait_for(|view| view.is_host)).await;
    assert!(client.start_game().await);
    let question = within(client.wait_for(|view| view.phase == ClientPhase::Question)).await;
    let correct = question.question.as_ref().unwrap().correct_index;

    sleep_until(question.question_started_at.unwrap() + Duration::from_millis(1_000)).await;
    assert!(client.answer(correct).await);

    let reveal = within(client.wait_for(|view| view.phase == ClientPhase::ShowingAnswer)).await;
    assert!(reveal.time_left > 0);
    assert!(!api.fail_answer.load(Ordering::SeqCst));

    let host = room_service::get_player(&room.state, room.host_id).await.unwrap();
    assert_eq!(host.answers.len(), 1);
    assert_eq!(host.answers[0].selected_index, correct as i32);
    assert_eq!(host.answers[0].time_ms, 1_000);
    assert_eq!(host.score, 1450);

    client.leave().await;
}
