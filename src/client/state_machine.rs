//! Client-side phase machine of a room session.
//!
//! Phases are local to one client: two clients may transiently disagree and
//! converge through reconciliation against fetched snapshots.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Phase a client believes the room is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientPhase {
    /// Lobby, before the host starts the game.
    Waiting,
    /// 3-2-1 countdown before a question is shown.
    Countdown,
    /// Question visible, answer timer running.
    Question,
    /// Correct answer and explanation revealed.
    ShowingAnswer,
    /// Final scoreboard. Terminal.
    Finished,
}

impl ClientPhase {
    /// Nothing leaves this phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, ClientPhase::Finished)
    }
}

/// Inputs driving the phase machine, either derived from a snapshot or from local timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseEvent {
    /// A snapshot shows the room playing while we are still waiting.
    GameStarted,
    /// The local countdown reached zero.
    CountdownElapsed,
    /// The roster shows every player answered the current question.
    AllAnswered,
    /// The local question timer reached zero.
    TimeUp,
    /// A snapshot shows a question index beyond the last one observed.
    QuestionAdvanced,
    /// A snapshot shows the room finished.
    GameFinished,
}

/// Error returned when an event does not apply to the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the machine was in.
    pub from: ClientPhase,
    /// Rejected event.
    pub event: PhaseEvent,
}

/// Pure transition table.
pub fn compute_transition(
    from: ClientPhase,
    event: PhaseEvent,
) -> Result<ClientPhase, InvalidTransition> {
    let next = match (from, event) {
        (ClientPhase::Waiting, PhaseEvent::GameStarted) => ClientPhase::Countdown,
        (ClientPhase::Countdown, PhaseEvent::CountdownElapsed) => ClientPhase::Question,
        (ClientPhase::Question, PhaseEvent::AllAnswered | PhaseEvent::TimeUp) => {
            ClientPhase::ShowingAnswer
        }
        (ClientPhase::Question | ClientPhase::ShowingAnswer, PhaseEvent::QuestionAdvanced) => {
            ClientPhase::Countdown
        }
        (from, PhaseEvent::GameFinished) if !from.is_terminal() => ClientPhase::Finished,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

/// Holder of the current phase that only moves along [`compute_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseMachine {
    phase: ClientPhase,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseMachine {
    /// Machine in the waiting phase.
    pub fn new() -> Self {
        Self {
            phase: ClientPhase::Waiting,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    /// Apply `event`, leaving the phase untouched when the transition is invalid.
    pub fn apply(&mut self, event: PhaseEvent) -> Result<ClientPhase, InvalidTransition> {
        let next = compute_transition(self.phase, event)?;
        self.phase = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut PhaseMachine, event: PhaseEvent) -> ClientPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_waiting() {
        assert_eq!(PhaseMachine::new().phase(), ClientPhase::Waiting);
    }

    #[test]
    fn full_happy_path_through_two_questions() {
        let mut sm = PhaseMachine::new();
        assert_eq!(apply(&mut sm, PhaseEvent::GameStarted), ClientPhase::Countdown);
        assert_eq!(apply(&mut sm, PhaseEvent::CountdownElapsed), ClientPhase::Question);
        assert_eq!(apply(&mut sm, PhaseEvent::AllAnswered), ClientPhase::ShowingAnswer);
        assert_eq!(apply(&mut sm, PhaseEvent::QuestionAdvanced), ClientPhase::Countdown);
        assert_eq!(apply(&mut sm, PhaseEvent::CountdownElapsed), ClientPhase::Question);
        assert_eq!(apply(&mut sm, PhaseEvent::TimeUp), ClientPhase::ShowingAnswer);
        assert_eq!(apply(&mut sm, PhaseEvent::GameFinished), ClientPhase::Finished);
    }

    #[test]
    fn lagging_question_can_jump_to_next_countdown() {
        assert_eq!(
            compute_transition(ClientPhase::Question, PhaseEvent::QuestionAdvanced),
            Ok(ClientPhase::Countdown)
        );
    }

    #[test]
    fn second_reveal_trigger_is_rejected() {
        let mut sm = PhaseMachine::new();
        apply(&mut sm, PhaseEvent::GameStarted);
        apply(&mut sm, PhaseEvent::CountdownElapsed);
        apply(&mut sm, PhaseEvent::TimeUp);

        let err = sm.apply(PhaseEvent::AllAnswered).unwrap_err();
        assert_eq!(err.from, ClientPhase::ShowingAnswer);
        assert_eq!(sm.phase(), ClientPhase::ShowingAnswer);
    }

    #[test]
    fn finished_is_terminal_and_reachable_from_everywhere_else() {
        for phase in [
            ClientPhase::Waiting,
            ClientPhase::Countdown,
            ClientPhase::Question,
            ClientPhase::ShowingAnswer,
        ] {
            assert_eq!(
                compute_transition(phase, PhaseEvent::GameFinished),
                Ok(ClientPhase::Finished)
            );
        }

        for event in [
            PhaseEvent::GameStarted,
            PhaseEvent::CountdownElapsed,
            PhaseEvent::AllAnswered,
            PhaseEvent::TimeUp,
            PhaseEvent::QuestionAdvanced,
            PhaseEvent::GameFinished,
        ] {
            assert!(compute_transition(ClientPhase::Finished, event).is_err());
        }
    }

    #[test]
    fn countdown_ignores_question_advance() {
        assert!(compute_transition(ClientPhase::Countdown, PhaseEvent::QuestionAdvanced).is_err());
        assert!(compute_transition(ClientPhase::Waiting, PhaseEvent::TimeUp).is_err());
    }
}
