//! Runs one [`ClientSynchronizer`] as a tokio task: feeds it ticks, change
//! notifications and periodic refreshes, and performs the writes it asks for.

use std::{future, sync::Arc, time::Duration};

use futures::{FutureExt, StreamExt};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at, sleep_until},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    client::{
        api::{ChangeStream, ClientError, RoomApi},
        synchronizer::{ClientSynchronizer, ClientView, SyncEffect},
    },
    config::GameTimings,
    dao::models::RoomUpdate,
    state::ChangeEvent,
};

const TICK: Duration = Duration::from_secs(1);
const COMMAND_BUFFER: usize = 16;

/// Which room and player a client task plays as.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Room code.
    pub code: String,
    /// Player the task plays as (host or not is read from the roster).
    pub player_id: Uuid,
    /// Local timers.
    pub timings: GameTimings,
}

impl ClientOptions {
    /// Options with the default game timings.
    pub fn new(code: impl Into<String>, player_id: Uuid) -> Self {
        Self {
            code: code.into(),
            player_id,
            timings: GameTimings::default(),
        }
    }

    /// Replace the local timers.
    pub fn with_timings(mut self, timings: GameTimings) -> Self {
        self.timings = timings;
        self
    }
}

/// User input forwarded to the client task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// Answer the current question with this choice.
    Answer(usize),
    /// Host only: start the game from the lobby.
    StartGame,
    /// Stop reacting to the room. A pending host advance is dropped.
    Leave,
}

/// Handle to a running client task.
pub struct ClientHandle {
    commands: mpsc::Sender<ClientCommand>,
    view: watch::Receiver<ClientView>,
    task: JoinHandle<()>,
}

impl ClientHandle {
    /// Spawn the client task on the current runtime.
    pub fn spawn(api: Arc<dyn RoomApi>, options: ClientOptions) -> Self {
        let sync = ClientSynchronizer::new(options.player_id, options.timings);
        let (view_tx, view) = watch::channel(sync.view());
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(run(api, options, sync, command_rx, view_tx));
        Self {
            commands,
            view,
            task,
        }
    }

    /// Latest published view.
    pub fn view(&self) -> ClientView {
        self.view.borrow().clone()
    }

    /// Receiver of every published view.
    pub fn watch(&self) -> watch::Receiver<ClientView> {
        self.view.clone()
    }

    /// Wait until the view satisfies `predicate`. `None` once the task is gone
    /// without ever matching.
    pub async fn wait_for(&self, predicate: impl FnMut(&ClientView) -> bool) -> Option<ClientView> {
        let mut view = self.view.clone();
        let matched = view.wait_for(predicate).await.ok().map(|view| view.clone());
        matched
    }

    /// Returns `false` when the task has already stopped.
    pub async fn send(&self, command: ClientCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Forward [`ClientCommand::Answer`].
    pub async fn answer(&self, choice: usize) -> bool {
        self.send(ClientCommand::Answer(choice)).await
    }

    /// Forward [`ClientCommand::StartGame`].
    pub async fn start_game(&self) -> bool {
        self.send(ClientCommand::StartGame).await
    }

    /// Stop the task and wait for it to end.
    pub async fn leave(self) {
        let _ = self.commands.send(ClientCommand::Leave).await;
        self.join().await;
    }

    /// Wait for the task to end on its own (game finished or room gone).
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            warn!(error = %err, "client task failed");
        }
    }
}

/// Host write waiting for its reveal delay.
#[derive(Debug, Clone, Copy)]
struct PendingAdvance {
    question_index: usize,
    update: RoomUpdate,
    due: Instant,
}

struct ClientTask {
    api: Arc<dyn RoomApi>,
    code: String,
    sync: ClientSynchronizer,
    view: watch::Sender<ClientView>,
    advance: Option<PendingAdvance>,
}

async fn run(
    api: Arc<dyn RoomApi>,
    options: ClientOptions,
    sync: ClientSynchronizer,
    mut commands: mpsc::Receiver<ClientCommand>,
    view: watch::Sender<ClientView>,
) {
    let refresh_every = options.timings.refresh_interval;
    let mut task = ClientTask {
        api,
        code: options.code,
        sync,
        view,
        advance: None,
    };
    info!(code = %task.code, player_id = %options.player_id, "client started");

    // Subscribe before the first read so no change slips in between.
    let mut changes = task.open_feed().await;
    task.refresh().await;

    let start = Instant::now();
    let mut ticker = interval_at(start + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut refresher = interval_at(start + refresh_every, refresh_every);
    refresher.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !task.sync.is_done() {
        tokio::select! {
            _ = ticker.tick() => {
                let effects = task.sync.tick(Instant::now());
                task.perform(effects).await;
            }
            _ = advance_due(task.advance.map(|advance| advance.due)) => {
                task.run_advance().await;
            }
            _ = refresher.tick() => {
                if changes.is_none() {
                    changes = task.open_feed().await;
                }
                task.refresh().await;
            }
            change = next_change(&mut changes) => match change {
                Some(change) => {
                    debug!(code = %task.code, change = ?change.change, "room changed");
                    if let Some(stream) = changes.as_mut() {
                        // Coalesce a burst into one read.
                        while let Some(Some(_)) = stream.next().now_or_never() {}
                    }
                    task.refresh().await;
                }
                None => {
                    debug!(code = %task.code, "change feed closed");
                    changes = None;
                    task.refresh().await;
                }
            },
            command = commands.recv() => match command {
                Some(ClientCommand::Answer(choice)) => {
                    if let Some(effect) = task.sync.submit_answer(choice, Instant::now()) {
                        task.perform(vec![effect]).await;
                    }
                }
                Some(ClientCommand::StartGame) => {
                    if let Some(effect) = task.sync.start_game() {
                        task.perform(vec![effect]).await;
                    }
                }
                Some(ClientCommand::Leave) | None => break,
            },
        }
        task.publish();
    }

    task.publish();
    info!(
        code = %task.code,
        player_id = %options.player_id,
        phase = ?task.sync.phase(),
        "client stopped"
    );
}

async fn advance_due(due: Option<Instant>) {
    match due {
        Some(due) => sleep_until(due).await,
        None => future::pending().await,
    }
}

async fn next_change(changes: &mut Option<ChangeStream>) -> Option<ChangeEvent> {
    match changes {
        Some(stream) => stream.next().await,
        None => future::pending().await,
    }
}

impl ClientTask {
    async fn open_feed(&mut self) -> Option<ChangeStream> {
        match self.api.subscribe(&self.code).await {
            Ok(stream) => Some(stream),
            Err(err) => {
                self.on_error("subscribe", err);
                None
            }
        }
    }

    async fn refresh(&mut self) {
        match self.api.fetch_room(&self.code).await {
            Ok(snapshot) => {
                let effects = self.sync.apply_snapshot(snapshot, Instant::now());
                self.perform(effects).await;
            }
            Err(err) => self.on_error("refresh", err),
        }
        self.publish();
    }

    async fn perform(&mut self, effects: Vec<SyncEffect>) {
        for effect in effects {
            match effect {
                SyncEffect::SubmitAnswer(submission) => {
                    if let Err(err) = self.api.submit_answer(&self.code, submission).await {
                        self.on_error("submit answer", err);
                    }
                }
                SyncEffect::UpdateRoom(update) => {
                    if let Err(err) = self.api.update_room(&self.code, update).await {
                        self.on_error("update room", err);
                    }
                }
                SyncEffect::ScheduleAdvance {
                    question_index,
                    update,
                    delay,
                } => {
                    self.advance = Some(PendingAdvance {
                        question_index,
                        update,
                        due: Instant::now() + delay,
                    });
                }
            }
        }
    }

    async fn run_advance(&mut self) {
        let Some(PendingAdvance {
            question_index,
            update,
            ..
        }) = self.advance.take()
        else {
            return;
        };
        match self.api.update_room(&self.code, update).await {
            Ok(()) => info!(code = %self.code, question_index, "host advanced room"),
            Err(ClientError::Unavailable(message)) => {
                warn!(
                    code = %self.code,
                    question_index,
                    error = %message,
                    "host advance failed, retrying on next refresh"
                );
                self.sync.advance_failed(question_index);
            }
            Err(err) => self.on_error("host advance", err),
        }
    }

    fn on_error(&mut self, operation: &str, err: ClientError) {
        match err {
            ClientError::NotFound => {
                warn!(code = %self.code, operation, "room not found");
                self.sync.fail("room not found");
            }
            // Steady-state failures are retried by the next refresh.
            other => warn!(code = %self.code, operation, error = %other, "room call failed"),
        }
    }

    fn publish(&self) {
        let next = self.sync.view();
        self.view.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::{local::LocalRoomApi, state_machine::ClientPhase},
        config::AppConfig,
        dao::room_store::MemoryRoomStore,
        quiz::fixture::StaticQuizProvider,
        services::room_service,
        state::AppState,
    };

    async fn room() -> (crate::state::SharedState, String, Uuid) {
        let state = AppState::with_store(
            AppConfig::default(),
            Arc::new(StaticQuizProvider::sample()),
            Arc::new(MemoryRoomStore::new()),
        )
        .await;
        let session = room_service::create_room(&state, "https://example.com/v", "Host")
            .await
            .unwrap();
        (state, session.room.room.code, session.player.id)
    }

    #[tokio::test(start_paused = true)]
    async fn solo_host_times_out_and_advances() {
        let (state, code, host_id) = room().await;
        let api: Arc<dyn RoomApi> = Arc::new(LocalRoomApi::new(state.clone()));
        let client = ClientHandle::spawn(api, ClientOptions::new(code.clone(), host_id));

        client.wait_for(|view| view.is_host).await.unwrap();
        assert!(client.start_game().await);

        let view = client
            .wait_for(|view| view.phase == ClientPhase::Countdown && view.question_index == 1)
            .await
            .unwrap();
        assert_eq!(view.countdown, 3);

        let host = room_service::get_player(&state, host_id).await.unwrap();
        assert_eq!(host.answers.len(), 1);
        assert_eq!(host.answers[0].selected_index, -1);
        assert_eq!(host.answers[0].time_ms, 15_000);
        assert_eq!(host.score, 0);

        client.leave().await;
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_during_the_reveal_drops_the_host_advance() {
        let (state, code, host_id) = room().await;
        let api: Arc<dyn RoomApi> = Arc::new(LocalRoomApi::new(state.clone()));
        let client = ClientHandle::spawn(api, ClientOptions::new(code.clone(), host_id));

        client.wait_for(|view| view.is_host).await.unwrap();
        assert!(client.start_game().await);
        client
            .wait_for(|view| view.phase == ClientPhase::Question)
            .await
            .unwrap();
        assert!(client.answer(0).await);
        client
            .wait_for(|view| view.phase == ClientPhase::ShowingAnswer)
            .await
            .unwrap();
        client.leave().await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        let room = room_service::get_room(&state, &code).await.unwrap().room;
        assert_eq!(room.current_question_index, 0);
        assert_eq!(room.status, crate::dao::models::RoomStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_room_ends_in_not_found() {
        let (state, code, host_id) = room().await;
        let api: Arc<dyn RoomApi> = Arc::new(LocalRoomApi::new(state.clone()));
        let client = ClientHandle::spawn(api, ClientOptions::new(code.clone(), host_id));
        client.wait_for(|view| view.player_count == 1).await.unwrap();

        room_service::delete_room(&state, &code).await.unwrap();
        let view = client.wait_for(|view| view.error.is_some()).await.unwrap();
        assert_eq!(view.error.as_deref(), Some("room not found"));
        client.join().await;
    }
}
