use uuid::Uuid;

use crate::{
    dao::models::{AnswerEntity, PlayerEntity, QuestionEntity, RoomStatus, RoomWithPlayers},
    dto::{player::PlayerView, room::RoomDetails},
};

/// Point-in-time copy of a room and its roster as seen by one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Room id.
    pub room_id: Uuid,
    /// Room code.
    pub code: String,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Question the room is on.
    pub current_question_index: usize,
    /// The quiz, in order.
    pub questions: Vec<QuestionEntity>,
    /// Roster in join order.
    pub players: Vec<PlayerSnapshot>,
}

/// Roster entry of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    /// Player id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Host of the room.
    pub is_host: bool,
    /// Total points.
    pub score: u32,
    /// Answer log, at most one entry per question.
    pub answers: Vec<AnswerEntity>,
}

/// Scoreboard line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// Player id.
    pub player_id: Uuid,
    /// Display name.
    pub name: String,
    /// Total points.
    pub score: u32,
}

impl PlayerSnapshot {
    /// Stored answer for `question_index`, if any.
    pub fn answer_for(&self, question_index: usize) -> Option<&AnswerEntity> {
        self.answers
            .iter()
            .find(|answer| answer.question_index == question_index)
    }
}

impl RoomSnapshot {
    /// Questions in the quiz.
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Question at `index`.
    pub fn question(&self, index: usize) -> Option<&QuestionEntity> {
        self.questions.get(index)
    }

    /// Roster entry of `id`.
    pub fn player(&self, id: Uuid) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|player| player.id == id)
    }

    /// Players with an answer recorded for `question_index`.
    pub fn answered_count(&self, question_index: usize) -> usize {
        self.players
            .iter()
            .filter(|player| player.answer_for(question_index).is_some())
            .count()
    }

    /// True when the roster is non-empty and every player answered `question_index`.
    pub fn all_answered(&self, question_index: usize) -> bool {
        !self.players.is_empty() && self.answered_count(question_index) == self.players.len()
    }

    /// Players ordered by score, highest first; ties keep roster order.
    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .players
            .iter()
            .map(|player| Standing {
                player_id: player.id,
                name: player.name.clone(),
                score: player.score,
            })
            .collect();
        standings.sort_by(|a, b| b.score.cmp(&a.score));
        standings
    }
}

impl From<&PlayerEntity> for PlayerSnapshot {
    fn from(value: &PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            is_host: value.is_host,
            score: value.score,
            answers: value.answers.clone(),
        }
    }
}

impl From<&RoomWithPlayers> for RoomSnapshot {
    fn from(value: &RoomWithPlayers) -> Self {
        Self {
            room_id: value.room.id,
            code: value.room.code.clone(),
            status: value.room.status,
            current_question_index: value.room.current_question_index,
            questions: value.room.quiz.questions.clone(),
            players: value.players.iter().map(Into::into).collect(),
        }
    }
}

impl From<PlayerView> for PlayerSnapshot {
    fn from(value: PlayerView) -> Self {
        Self {
            id: value.id,
            name: value.name,
            is_host: value.is_host,
            score: value.score,
            answers: value.answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<RoomDetails> for RoomSnapshot {
    fn from(value: RoomDetails) -> Self {
        Self {
            room_id: value.room.id,
            code: value.room.code,
            status: value.room.status,
            current_question_index: value.room.current_question_index,
            questions: value.room.questions.into_iter().map(Into::into).collect(),
            players: value.players.into_iter().map(Into::into).collect(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::{fixtures::snapshot, *};

    #[test]
    fn all_answered_needs_every_player() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let partial = snapshot(RoomStatus::Playing, 0, &[(a, &[0]), (b, &[])]);
        assert!(!partial.all_answered(0));
        assert_eq!(partial.answered_count(0), 1);

        let complete = snapshot(RoomStatus::Playing, 0, &[(a, &[0]), (b, &[0])]);
        assert!(complete.all_answered(0));
        assert!(!complete.all_answered(1));
    }

    #[test]
    fn empty_roster_is_never_all_answered() {
        assert!(!snapshot(RoomStatus::Playing, 0, &[]).all_answered(0));
    }

    #[test]
    fn standings_sort_by_score() {
        let mut room = snapshot(
            RoomStatus::Finished,
            9,
            &[(Uuid::new_v4(), &[]), (Uuid::new_v4(), &[])],
        );
        room.players[1].score = 1450;
        room.players[0].score = 1050;
        let standings = room.standings();
        assert_eq!(standings[0].score, 1450);
        assert_eq!(standings[1].name, "player-0");
    }
}
