//! Derives phase events by comparing a freshly fetched snapshot with the last
//! accepted one. Notifications never carry phase information: everything a
//! client learns about the shared session comes through here.

use crate::{
    client::{
        snapshot::RoomSnapshot,
        state_machine::{ClientPhase, PhaseEvent},
    },
    dao::models::RoomStatus,
};

fn status_rank(status: RoomStatus) -> u8 {
    match status {
        RoomStatus::Waiting => 0,
        RoomStatus::Playing => 1,
        RoomStatus::Finished => 2,
    }
}

/// True when `next` is older than `previous`: a lower question index or a
/// status that went backwards. Room state only moves forward, so such a read
/// raced with a newer one and must be dropped.
pub fn is_stale(previous: &RoomSnapshot, next: &RoomSnapshot) -> bool {
    status_rank(next.status) < status_rank(previous.status)
        || (next.status == previous.status
            && next.current_question_index < previous.current_question_index)
}

/// Event implied by `next` for a client currently in `phase`, if any.
///
/// `previous` is the last snapshot the client accepted, `None` before the
/// first fetch.
pub fn reconcile(
    previous: Option<&RoomSnapshot>,
    next: &RoomSnapshot,
    phase: ClientPhase,
) -> Option<PhaseEvent> {
    if phase.is_terminal() {
        return None;
    }
    if previous.is_some_and(|previous| is_stale(previous, next)) {
        return None;
    }

    match next.status {
        RoomStatus::Finished => return Some(PhaseEvent::GameFinished),
        RoomStatus::Waiting => return None,
        RoomStatus::Playing => {}
    }

    if phase == ClientPhase::Waiting {
        return Some(PhaseEvent::GameStarted);
    }

    let advanced = previous
        .is_some_and(|previous| next.current_question_index > previous.current_question_index);
    if advanced && phase != ClientPhase::Countdown {
        return Some(PhaseEvent::QuestionAdvanced);
    }

    if phase == ClientPhase::Question && next.all_answered(next.current_question_index) {
        return Some(PhaseEvent::AllAnswered);
    }

    None
}
