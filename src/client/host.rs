use crate::dao::models::RoomUpdate;

/// Write the host performs once a question has been revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceWrite {
    /// Move the room to this absolute question index.
    NextQuestion(usize),
    /// The revealed question was the last one.
    Finish,
}

impl AdvanceWrite {
    /// Room update carrying this write.
    pub fn update(self) -> RoomUpdate {
        match self {
            AdvanceWrite::NextQuestion(index) => RoomUpdate::advance_to(index),
            AdvanceWrite::Finish => RoomUpdate::finish(),
        }
    }
}

/// Host-side guard allowing one advance per question.
///
/// The reveal condition may be observed on several refreshes of the same
/// question; only the first observation schedules a write. The guard is
/// monotonic, so a late observation of an earlier question is ignored too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostAdvancer {
    scheduled: Option<usize>,
}

impl HostAdvancer {
    /// Guard with nothing scheduled yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest question index an advance was scheduled for.
    pub fn last_scheduled(&self) -> Option<usize> {
        self.scheduled
    }

    /// Called when `question_index` is revealed. Returns the write to perform,
    /// or `None` when one was already scheduled for this question.
    pub fn on_reveal(&mut self, question_index: usize, question_count: usize) -> Option<AdvanceWrite> {
        if self
            .scheduled
            .is_some_and(|scheduled| scheduled >= question_index)
        {
            return None;
        }
        self.scheduled = Some(question_index);

        let next = question_index + 1;
        if next < question_count {
            Some(AdvanceWrite::NextQuestion(next))
        } else {
            Some(AdvanceWrite::Finish)
        }
    }

    /// Forget the advance scheduled for `question_index` after its write failed,
    /// so the next reveal observation schedules it again.
    pub fn rearm(&mut self, question_index: usize) {
        if self.scheduled == Some(question_index) {
            self.scheduled = question_index.checked_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::RoomStatus;

    #[test]
    fn schedules_once_per_question() {
        let mut host = HostAdvancer::new();
        assert_eq!(host.on_reveal(0, 10), Some(AdvanceWrite::NextQuestion(1)));
        assert_eq!(host.on_reveal(0, 10), None);
        assert_eq!(host.on_reveal(1, 10), Some(AdvanceWrite::NextQuestion(2)));
        assert_eq!(host.last_scheduled(), Some(1));
    }

    #[test]
    fn never_goes_back() {
        let mut host = HostAdvancer::new();
        host.on_reveal(5, 10);
        assert_eq!(host.on_reveal(3, 10), None);
    }

    #[test]
    fn rearm_allows_the_failed_question_again() {
        let mut host = HostAdvancer::new();
        host.on_reveal(0, 10);
        host.on_reveal(1, 10);
        host.rearm(0);
        assert_eq!(host.on_reveal(1, 10), None);

        host.rearm(1);
        assert_eq!(host.last_scheduled(), Some(0));
        assert_eq!(host.on_reveal(1, 10), Some(AdvanceWrite::NextQuestion(2)));
        assert_eq!(host.on_reveal(1, 10), None);

        let mut first = HostAdvancer::new();
        first.on_reveal(0, 10);
        first.rearm(0);
        assert_eq!(first.last_scheduled(), None);
        assert_eq!(first.on_reveal(0, 10), Some(AdvanceWrite::NextQuestion(1)));
    }

    #[test]
    fn last_question_finishes_the_game() {
        let mut host = HostAdvancer::new();
        let write = host.on_reveal(9, 10).unwrap();
        assert_eq!(write, AdvanceWrite::Finish);
        assert_eq!(write.update().status, Some(RoomStatus::Finished));
        assert_eq!(
            AdvanceWrite::NextQuestion(4).update(),
            RoomUpdate::advance_to(4)
        );
    }
}
