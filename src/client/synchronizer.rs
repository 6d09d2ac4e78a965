//! Per-client session logic: owns the local phase and timers, reacts to
//! snapshots and ticks, and tells its driver which writes to perform.
//!
//! The synchronizer does no I/O. Every input carries the current instant so
//! the same code runs under real time and under a paused test clock.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::{
    client::{
        host::HostAdvancer,
        reconcile::{is_stale, reconcile},
        snapshot::{RoomSnapshot, Standing},
        state_machine::{ClientPhase, PhaseEvent, PhaseMachine},
    },
    config::GameTimings,
    dao::models::{QuestionEntity, RoomStatus, RoomUpdate},
    services::room_service::AnswerSubmission,
};

/// Side effect requested by the synchronizer. The driver performs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEffect {
    /// Send this answer to the store.
    SubmitAnswer(AnswerSubmission),
    /// Write `update` to the room right away.
    UpdateRoom(RoomUpdate),
    /// Write `update` to the room after `delay` (host advance).
    ScheduleAdvance {
        /// Question whose reveal triggered the write.
        question_index: usize,
        /// Absolute update to write.
        update: RoomUpdate,
        /// Time left before the write is due.
        delay: Duration,
    },
}

/// Render-ready state of one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    /// Local phase.
    pub phase: ClientPhase,
    /// Question the phase refers to.
    pub question_index: usize,
    /// Questions in the quiz; 0 before the first snapshot.
    pub question_count: usize,
    /// The current question, when known.
    pub question: Option<QuestionEntity>,
    /// Seconds left in the countdown.
    pub countdown: u32,
    /// Seconds left to answer.
    pub time_left: u32,
    /// An answer was given (or synthesized) for the current question.
    pub has_answered: bool,
    /// Chosen index, `-1` for a timeout.
    pub selected_answer: Option<i32>,
    /// When the current question opened locally.
    pub question_started_at: Option<Instant>,
    /// This player hosts the room.
    pub is_host: bool,
    /// Players with an answer stored for the current question.
    pub answered_count: usize,
    /// Players in the room.
    pub player_count: usize,
    /// Scoreboard, best first.
    pub standings: Vec<Standing>,
    /// Terminal error shown instead of the game, e.g. "room not found".
    pub error: Option<String>,
}

/// Local session state of one player.
#[derive(Debug)]
pub struct ClientSynchronizer {
    player_id: Uuid,
    timings: GameTimings,
    machine: PhaseMachine,
    snapshot: Option<RoomSnapshot>,
    is_host: bool,
    question_index: usize,
    countdown: u32,
    time_left: u32,
    question_started_at: Option<Instant>,
    has_answered: bool,
    selected_answer: Option<i32>,
    /// Sent but not yet seen in a snapshot.
    pending_answer: Option<AnswerSubmission>,
    revealed_at: Option<Instant>,
    host: HostAdvancer,
    error: Option<String>,
}

impl ClientSynchronizer {
    /// Fresh session in the waiting phase.
    pub fn new(player_id: Uuid, timings: GameTimings) -> Self {
        Self {
            player_id,
            timings,
            machine: PhaseMachine::new(),
            snapshot: None,
            is_host: false,
            question_index: 0,
            countdown: timings.countdown_secs,
            time_left: timings.question_secs,
            question_started_at: None,
            has_answered: false,
            selected_answer: None,
            pending_answer: None,
            revealed_at: None,
            host: HostAdvancer::new(),
            error: None,
        }
    }

    /// Player this session plays as.
    pub fn player_id(&self) -> Uuid {
        self.player_id
    }

    /// Current local phase.
    pub fn phase(&self) -> ClientPhase {
        self.machine.phase()
    }

    /// Last accepted snapshot.
    pub fn snapshot(&self) -> Option<&RoomSnapshot> {
        self.snapshot.as_ref()
    }

    /// Whether the roster marks this player as host.
    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// True once the session can no longer change: game over or room gone.
    pub fn is_done(&self) -> bool {
        self.phase().is_terminal() || self.error.is_some()
    }

    /// Feed a freshly fetched snapshot. Also re-sends an answer the store has
    /// not recorded yet, and re-schedules a host advance whose write failed.
    pub fn apply_snapshot(&mut self, snapshot: RoomSnapshot, now: Instant) -> Vec<SyncEffect> {
        let mut effects = Vec::new();
        if self.error.is_some() {
            return effects;
        }
        if let Some(previous) = &self.snapshot
            && is_stale(previous, &snapshot)
        {
            debug!(
                player_id = %self.player_id,
                index = snapshot.current_question_index,
                "dropping stale snapshot"
            );
            return effects;
        }

        let event = reconcile(self.snapshot.as_ref(), &snapshot, self.phase());
        if let Some(me) = snapshot.player(self.player_id) {
            self.is_host = me.is_host;
        }
        self.snapshot = Some(snapshot);

        if let Some(event) = event {
            self.handle(event, now, &mut effects);
        }
        self.resend_pending_answer(&mut effects);
        self.schedule_advance(now, &mut effects);
        effects
    }

    /// One-second cooperative tick driving the countdown and question timers.
    pub fn tick(&mut self, now: Instant) -> Vec<SyncEffect> {
        let mut effects = Vec::new();
        if self.error.is_some() {
            return effects;
        }

        match self.phase() {
            ClientPhase::Countdown => {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown == 0 {
                    self.handle(PhaseEvent::CountdownElapsed, now, &mut effects);
                }
            }
            ClientPhase::Question => {
                self.time_left = self.time_left.saturating_sub(1);
                if self.time_left == 0 {
                    if !self.has_answered {
                        let submission = AnswerSubmission {
                            player_id: self.player_id,
                            question_index: self.question_index,
                            selected_index: -1,
                            time_ms: self.timings.question_time_limit_ms(),
                        };
                        effects.push(self.record_answer(submission));
                    }
                    self.handle(PhaseEvent::TimeUp, now, &mut effects);
                }
            }
            ClientPhase::Waiting | ClientPhase::ShowingAnswer | ClientPhase::Finished => {}
        }
        effects
    }

    /// Answer the current question. A no-op outside the question phase, after
    /// a previous answer, or for a choice that does not exist.
    pub fn submit_answer(&mut self, selected: usize, now: Instant) -> Option<SyncEffect> {
        if self.error.is_some() || self.phase() != ClientPhase::Question || self.has_answered {
            return None;
        }
        let choices = self
            .snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.question(self.question_index))
            .map_or(0, |question| question.choices.len());
        if selected >= choices {
            return None;
        }
        let selected_index = i32::try_from(selected).ok()?;

        let limit = self.timings.question_time_limit_ms();
        let elapsed = self
            .question_started_at
            .map_or(Duration::ZERO, |started| now.saturating_duration_since(started));
        let time_ms = u64::try_from(elapsed.as_millis()).unwrap_or(limit).min(limit);

        Some(self.record_answer(AnswerSubmission {
            player_id: self.player_id,
            question_index: self.question_index,
            selected_index,
            time_ms,
        }))
    }

    /// The host write scheduled for `question_index` did not reach the store.
    /// The next snapshot still showing that question schedules it again.
    pub fn advance_failed(&mut self, question_index: usize) {
        self.host.rearm(question_index);
    }

    /// Host-only: start the game from the lobby.
    pub fn start_game(&self) -> Option<SyncEffect> {
        (self.is_host && self.error.is_none() && self.phase() == ClientPhase::Waiting)
            .then(|| SyncEffect::UpdateRoom(RoomUpdate::start()))
    }

    /// Put the client in its terminal error view.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Render-ready copy of the current state.
    pub fn view(&self) -> ClientView {
        let snapshot = self.snapshot.as_ref();
        ClientView {
            phase: self.phase(),
            question_index: self.question_index,
            question_count: snapshot.map_or(0, RoomSnapshot::question_count),
            question: snapshot
                .and_then(|snapshot| snapshot.question(self.question_index))
                .cloned(),
            countdown: self.countdown,
            time_left: self.time_left,
            has_answered: self.has_answered,
            selected_answer: self.selected_answer,
            question_started_at: self.question_started_at,
            is_host: self.is_host,
            answered_count: snapshot.map_or(0, |snapshot| snapshot.answered_count(self.question_index)),
            player_count: snapshot.map_or(0, |snapshot| snapshot.players.len()),
            standings: snapshot.map(RoomSnapshot::standings).unwrap_or_default(),
            error: self.error.clone(),
        }
    }

    fn handle(&mut self, event: PhaseEvent, now: Instant, effects: &mut Vec<SyncEffect>) {
        let from = self.phase();
        let to = match self.machine.apply(event) {
            Ok(to) => to,
            Err(err) => {
                debug!(player_id = %self.player_id, error = %err, "ignored phase event");
                return;
            }
        };
        debug!(player_id = %self.player_id, ?from, ?to, ?event, "phase transition");

        match to {
            ClientPhase::Countdown => self.enter_countdown(now, effects),
            ClientPhase::Question => self.enter_question(now, effects),
            ClientPhase::ShowingAnswer => self.enter_showing_answer(now, effects),
            ClientPhase::Waiting | ClientPhase::Finished => {}
        }
    }

    fn current_index(&self) -> usize {
        self.snapshot
            .as_ref()
            .map_or(self.question_index, |snapshot| snapshot.current_question_index)
    }

    fn enter_countdown(&mut self, now: Instant, effects: &mut Vec<SyncEffect>) {
        self.question_index = self.current_index();
        self.countdown = self.timings.countdown_secs;
        self.has_answered = false;
        self.selected_answer = None;
        self.pending_answer = None;
        self.revealed_at = None;
        if self.countdown == 0 {
            self.handle(PhaseEvent::CountdownElapsed, now, effects);
        }
    }

    fn enter_question(&mut self, now: Instant, effects: &mut Vec<SyncEffect>) {
        self.question_index = self.current_index();
        self.question_started_at = Some(now);
        self.time_left = self.timings.question_secs;
        self.has_answered = false;
        self.selected_answer = None;
        self.pending_answer = None;

        let Some(snapshot) = &self.snapshot else {
            return;
        };
        // Resumed session: our answer may already be stored.
        if let Some(answer) = snapshot
            .player(self.player_id)
            .and_then(|me| me.answer_for(self.question_index))
        {
            self.has_answered = true;
            self.selected_answer = Some(answer.selected_index);
        }
        if snapshot.all_answered(self.question_index) {
            self.handle(PhaseEvent::AllAnswered, now, effects);
        }
    }

    fn record_answer(&mut self, submission: AnswerSubmission) -> SyncEffect {
        self.has_answered = true;
        self.selected_answer = Some(submission.selected_index);
        self.pending_answer = Some(submission);
        SyncEffect::SubmitAnswer(submission)
    }

    fn resend_pending_answer(&mut self, effects: &mut Vec<SyncEffect>) {
        let Some(pending) = self.pending_answer else {
            return;
        };
        let stored = self
            .snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.player(self.player_id))
            .is_some_and(|me| me.answer_for(pending.question_index).is_some());
        let current = pending.question_index == self.question_index
            && matches!(self.phase(), ClientPhase::Question | ClientPhase::ShowingAnswer);
        if stored || !current {
            self.pending_answer = None;
            return;
        }
        debug!(
            player_id = %self.player_id,
            question_index = pending.question_index,
            "answer not stored yet, sending again"
        );
        effects.push(SyncEffect::SubmitAnswer(pending));
    }

    fn enter_showing_answer(&mut self, now: Instant, effects: &mut Vec<SyncEffect>) {
        self.revealed_at = Some(now);
        self.schedule_advance(now, effects);
    }

    /// Host only, while the revealed question is still the room's current one.
    fn schedule_advance(&mut self, now: Instant, effects: &mut Vec<SyncEffect>) {
        if !self.is_host || self.phase() != ClientPhase::ShowingAnswer {
            return;
        }
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        if snapshot.status != RoomStatus::Playing
            || snapshot.current_question_index != self.question_index
        {
            return;
        }
        let Some(write) = self.host.on_reveal(self.question_index, snapshot.question_count()) else {
            return;
        };
        let due = self.revealed_at.unwrap_or(now) + self.timings.reveal_delay;
        debug!(
            player_id = %self.player_id,
            question_index = self.question_index,
            ?write,
            "scheduling host advance"
        );
        effects.push(SyncEffect::ScheduleAdvance {
            question_index: self.question_index,
            update: write.update(),
            delay: due.saturating_duration_since(now),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::snapshot::{PlayerSnapshot, fixtures::snapshot},
        dao::models::AnswerEntity,
    };

    fn started(
        me: Uuid,
        players: &[(Uuid, &[usize])],
        host: bool,
    ) -> (ClientSynchronizer, Instant) {
        let now = Instant::now();
        let mut sync = ClientSynchronizer::new(me, GameTimings::default());
        let mut lobby = snapshot(RoomStatus::Waiting, 0, players);
        set_host(&mut lobby, me, host);
        assert!(sync.apply_snapshot(lobby, now).is_empty());

        let mut playing = snapshot(RoomStatus::Playing, 0, players);
        set_host(&mut playing, me, host);
        assert!(sync.apply_snapshot(playing, now).is_empty());
        assert_eq!(sync.phase(), ClientPhase::Countdown);
        (sync, now)
    }

    fn set_host(snapshot: &mut RoomSnapshot, me: Uuid, host: bool) {
        for player in &mut snapshot.players {
            player.is_host = host && player.id == me;
        }
    }

    fn run_countdown(sync: &mut ClientSynchronizer, now: Instant) {
        for _ in 0..3 {
            assert!(sync.tick(now).is_empty());
        }
        assert_eq!(sync.phase(), ClientPhase::Question);
    }

    #[test]
    fn countdown_runs_three_ticks_then_opens_question() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[])], false);
        assert_eq!(sync.view().countdown, 3);
        sync.tick(now);
        sync.tick(now);
        assert_eq!(sync.view().countdown, 1);
        assert_eq!(sync.phase(), ClientPhase::Countdown);
        sync.tick(now);

        let view = sync.view();
        assert_eq!(view.phase, ClientPhase::Question);
        assert_eq!(view.time_left, 15);
        assert!(!view.has_answered);
        assert_eq!(view.question_started_at, Some(now));
    }

    #[test]
    fn answer_is_timed_from_question_start_and_only_sent_once() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[])], false);
        run_countdown(&mut sync, now);

        let effect = sync.submit_answer(2, now + Duration::from_millis(1000));
        assert_eq!(
            effect,
            Some(SyncEffect::SubmitAnswer(AnswerSubmission {
                player_id: me,
                question_index: 0,
                selected_index: 2,
                time_ms: 1000,
            }))
        );
        assert_eq!(sync.submit_answer(1, now), None);
        assert_eq!(sync.view().selected_answer, Some(2));
    }

    #[test]
    fn out_of_range_choice_is_ignored() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[])], false);
        run_countdown(&mut sync, now);
        assert_eq!(sync.submit_answer(4, now), None);
        assert!(!sync.view().has_answered);
    }

    #[test]
    fn timeout_synthesizes_a_blank_answer() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[])], false);
        run_countdown(&mut sync, now);

        for _ in 0..14 {
            assert!(sync.tick(now).is_empty());
        }
        let effects = sync.tick(now);
        assert_eq!(
            effects,
            vec![SyncEffect::SubmitAnswer(AnswerSubmission {
                player_id: me,
                question_index: 0,
                selected_index: -1,
                time_ms: 15_000,
            })]
        );
        assert_eq!(sync.phase(), ClientPhase::ShowingAnswer);
    }

    #[test]
    fn timeout_after_answering_sends_nothing() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[])], false);
        run_countdown(&mut sync, now);
        sync.submit_answer(0, now);
        let effects: Vec<_> = (0..15).flat_map(|_| sync.tick(now)).collect();
        assert!(effects.is_empty());
        assert_eq!(sync.phase(), ClientPhase::ShowingAnswer);
    }

    #[test]
    fn full_roster_reveals_and_host_schedules_one_advance() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[]), (other, &[])], true);
        run_countdown(&mut sync, now);

        let mut partial = snapshot(RoomStatus::Playing, 0, &[(me, &[0]), (other, &[])]);
        set_host(&mut partial, me, true);
        assert!(sync.apply_snapshot(partial, now).is_empty());
        assert_eq!(sync.phase(), ClientPhase::Question);

        let mut full = snapshot(RoomStatus::Playing, 0, &[(me, &[0]), (other, &[0])]);
        set_host(&mut full, me, true);
        let effects = sync.apply_snapshot(full.clone(), now);
        assert_eq!(
            effects,
            vec![SyncEffect::ScheduleAdvance {
                question_index: 0,
                update: RoomUpdate::advance_to(1),
                delay: Duration::from_secs(3),
            }]
        );
        assert_eq!(sync.phase(), ClientPhase::ShowingAnswer);

        // Duplicate notification, then the timer firing: no second write.
        assert!(sync.apply_snapshot(full, now).is_empty());
        assert!(sync.tick(now).is_empty());
    }

    #[test]
    fn unrecorded_answer_is_sent_again_until_stored() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[]), (other, &[])], false);
        run_countdown(&mut sync, now);
        let sent = sync.submit_answer(1, now + Duration::from_millis(1_000)).unwrap();

        let missing = snapshot(RoomStatus::Playing, 0, &[(me, &[]), (other, &[])]);
        assert_eq!(sync.apply_snapshot(missing.clone(), now), vec![sent]);

        // Still unrecorded after the timer ran out: no blank answer, the real one again.
        let effects: Vec<_> = (0..15).flat_map(|_| sync.tick(now)).collect();
        assert!(effects.is_empty());
        assert_eq!(sync.phase(), ClientPhase::ShowingAnswer);
        assert_eq!(sync.apply_snapshot(missing, now), vec![sent]);

        let stored = snapshot(RoomStatus::Playing, 0, &[(me, &[0]), (other, &[0])]);
        assert!(sync.apply_snapshot(stored.clone(), now).is_empty());
        assert!(sync.apply_snapshot(stored, now).is_empty());
    }

    #[test]
    fn pending_answer_is_dropped_once_the_room_moves_on() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[])], false);
        run_countdown(&mut sync, now);
        sync.submit_answer(0, now).unwrap();

        assert!(
            sync.apply_snapshot(snapshot(RoomStatus::Playing, 1, &[(me, &[])]), now)
                .is_empty()
        );
        assert_eq!(sync.phase(), ClientPhase::Countdown);
        assert!(
            sync.apply_snapshot(snapshot(RoomStatus::Playing, 1, &[(me, &[])]), now)
                .is_empty()
        );
    }

    #[test]
    fn failed_advance_is_scheduled_again_by_the_next_snapshot() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[])], true);
        run_countdown(&mut sync, now);

        let mut answered = snapshot(RoomStatus::Playing, 0, &[(me, &[0])]);
        set_host(&mut answered, me, true);
        let effects = sync.apply_snapshot(answered.clone(), now);
        assert!(matches!(effects.as_slice(), [SyncEffect::ScheduleAdvance { .. }]));

        // Without a failure the same snapshot schedules nothing.
        assert!(sync.apply_snapshot(answered.clone(), now + Duration::from_secs(1)).is_empty());

        sync.advance_failed(0);
        assert_eq!(
            sync.apply_snapshot(answered.clone(), now + Duration::from_secs(1)),
            vec![SyncEffect::ScheduleAdvance {
                question_index: 0,
                update: RoomUpdate::advance_to(1),
                delay: Duration::from_secs(2),
            }]
        );

        sync.advance_failed(0);
        assert_eq!(
            sync.apply_snapshot(answered, now + Duration::from_secs(8)),
            vec![SyncEffect::ScheduleAdvance {
                question_index: 0,
                update: RoomUpdate::advance_to(1),
                delay: Duration::ZERO,
            }]
        );
    }

    #[test]
    fn failed_advance_is_not_repeated_after_the_room_moved_on() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[])], true);
        run_countdown(&mut sync, now);
        let mut answered = snapshot(RoomStatus::Playing, 0, &[(me, &[0])]);
        set_host(&mut answered, me, true);
        sync.apply_snapshot(answered, now);

        sync.advance_failed(0);
        let mut advanced = snapshot(RoomStatus::Playing, 1, &[(me, &[0])]);
        set_host(&mut advanced, me, true);
        assert!(sync.apply_snapshot(advanced, now).is_empty());
        assert_eq!(sync.phase(), ClientPhase::Countdown);
    }

    #[test]
    fn non_host_never_schedules() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[])], false);
        run_countdown(&mut sync, now);
        let effects = sync.apply_snapshot(snapshot(RoomStatus::Playing, 0, &[(me, &[0])]), now);
        assert!(effects.is_empty());
        assert_eq!(sync.phase(), ClientPhase::ShowingAnswer);
    }

    #[test]
    fn index_advance_restarts_countdown_for_next_question() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[])], false);
        run_countdown(&mut sync, now);
        sync.apply_snapshot(snapshot(RoomStatus::Playing, 0, &[(me, &[0])]), now);

        sync.apply_snapshot(snapshot(RoomStatus::Playing, 1, &[(me, &[0])]), now);
        let view = sync.view();
        assert_eq!(view.phase, ClientPhase::Countdown);
        assert_eq!(view.question_index, 1);
        assert_eq!(view.countdown, 3);
        assert!(!view.has_answered);

        // A stale read of question 0 is dropped.
        sync.apply_snapshot(snapshot(RoomStatus::Playing, 0, &[(me, &[0])]), now);
        assert_eq!(sync.snapshot().map(|s| s.current_question_index), Some(1));
    }

    #[test]
    fn resumed_player_with_stored_answer_waits_for_reveal() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[0]), (other, &[])], false);
        run_countdown(&mut sync, now);
        let view = sync.view();
        assert!(view.has_answered);
        assert_eq!(view.selected_answer, Some(-1));
        assert_eq!(sync.submit_answer(1, now), None);
    }

    #[test]
    fn entering_question_with_everyone_answered_reveals_at_once() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[0])], true);
        for _ in 0..2 {
            sync.tick(now);
        }
        let effects = sync.tick(now);
        assert_eq!(sync.phase(), ClientPhase::ShowingAnswer);
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn last_question_reveal_finishes_then_snapshot_ends_session() {
        let me = Uuid::new_v4();
        let now = Instant::now();
        let mut sync = ClientSynchronizer::new(me, GameTimings::default());
        let mut last = snapshot(RoomStatus::Playing, 9, &[(me, &[])]);
        last.players[0].is_host = true;
        sync.apply_snapshot(last, now);
        run_countdown(&mut sync, now);
        assert_eq!(sync.view().question_index, 9);

        let mut answered = snapshot(RoomStatus::Playing, 9, &[(me, &[9])]);
        answered.players[0].is_host = true;
        let effects = sync.apply_snapshot(answered, now);
        assert!(matches!(
            effects.as_slice(),
            [SyncEffect::ScheduleAdvance { update, .. }] if *update == RoomUpdate::finish()
        ));

        sync.apply_snapshot(snapshot(RoomStatus::Finished, 9, &[(me, &[9])]), now);
        assert_eq!(sync.phase(), ClientPhase::Finished);
        assert!(sync.is_done());
    }

    #[test]
    fn start_game_is_host_only() {
        let me = Uuid::new_v4();
        let now = Instant::now();
        let mut sync = ClientSynchronizer::new(me, GameTimings::default());
        let mut lobby = snapshot(RoomStatus::Waiting, 0, &[(me, &[])]);
        sync.apply_snapshot(lobby.clone(), now);
        assert_eq!(sync.start_game(), None);

        lobby.players[0].is_host = true;
        sync.apply_snapshot(lobby, now);
        assert_eq!(
            sync.start_game(),
            Some(SyncEffect::UpdateRoom(RoomUpdate::start()))
        );
    }

    #[test]
    fn failed_client_ignores_everything() {
        let me = Uuid::new_v4();
        let (mut sync, now) = started(me, &[(me, &[])], false);
        sync.fail("room not found");
        assert!(sync.tick(now).is_empty());
        assert_eq!(sync.phase(), ClientPhase::Countdown);
        assert_eq!(sync.view().error.as_deref(), Some("room not found"));
        assert!(sync.is_done());
    }

    #[test]
    fn view_reports_scores() {
        let me = Uuid::new_v4();
        let now = Instant::now();
        let mut sync = ClientSynchronizer::new(me, GameTimings::default());
        let mut room = snapshot(RoomStatus::Waiting, 0, &[]);
        room.players.push(PlayerSnapshot {
            id: me,
            name: "Alice".into(),
            is_host: false,
            score: 1450,
            answers: vec![AnswerEntity::timed_out(0, 15_000)],
        });
        sync.apply_snapshot(room, now);
        let view = sync.view();
        assert_eq!(view.player_count, 1);
        assert_eq!(view.standings[0].score, 1450);
    }
}
