//! Task run state

use serde::{Deserialize, Serialize};

use crate::checkpoint::RunningTally;
use crate::metrics::ScoredRecord;
use crate::scoring::BleuStats;
use crate::tasks::TaskKind;

/// Lifecycle of one task within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    /// Running, with at least one checkpoint written
    Checkpointed,
    Complete,
    Failed,
    /// Cancelled at a batch boundary
    Stopped,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed | RunState::Stopped)
    }

    /// Whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (NotStarted, Running) | (NotStarted, Failed) => true,
            (Running | Checkpointed, Checkpointed) => true,
            (Running | Checkpointed, Complete | Failed | Stopped) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::NotStarted => "not started",
            RunState::Running => "running",
            RunState::Checkpointed => "checkpointed",
            RunState::Complete => "complete",
            RunState::Failed => "failed",
            RunState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Mutable progress of a task, owned by the single orchestrating loop
#[derive(Debug, Clone)]
pub struct TaskProgress {
    task: TaskKind,
    state: RunState,
    records: Vec<ScoredRecord>,
    tally: RunningTally,
    bleu: BleuStats,
    /// Offset of the last checkpoint taken (start of the next segment)
    segment_start: usize,
}

impl TaskProgress {
    pub fn new(task: TaskKind) -> Self {
        Self {
            task,
            state: RunState::NotStarted,
            records: Vec::new(),
            tally: RunningTally::default(),
            bleu: BleuStats::default(),
            segment_start: 0,
        }
    }

    /// Progress seeded from records restored out of checkpoints
    pub fn resumed(task: TaskKind, records: Vec<ScoredRecord>) -> Self {
        let mut progress = Self::new(task);
        for record in records {
            progress.push(record);
        }
        progress.segment_start = progress.records.len();
        progress
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Move to `next`; illegal transitions are ignored and logged
    pub fn transition(&mut self, next: RunState) {
        if self.state == next && next == RunState::Checkpointed {
            return;
        }
        if self.state.can_transition_to(next) {
            self.state = next;
        } else {
            tracing::warn!(task = %self.task, from = %self.state, to = %next, "Ignoring invalid state transition");
        }
    }

    pub fn push(&mut self, record: ScoredRecord) {
        self.tally.record(&record);
        if self.task == TaskKind::Code && !record.is_skipped() {
            self.bleu.add_pair(&record.predicted, &record.reference);
        }
        self.records.push(record);
    }

    pub fn processed(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[ScoredRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ScoredRecord> {
        self.records
    }

    pub fn tally(&self) -> &RunningTally {
        &self.tally
    }

    pub fn segment_start(&self) -> usize {
        self.segment_start
    }

    /// Start the next segment at `start`, e.g. the last checkpoint that was actually stored
    pub fn rewind_segment(&mut self, start: usize) {
        self.segment_start = start.min(self.records.len());
    }

    /// Records since the last checkpoint; marks a new segment start
    pub fn take_segment(&mut self) -> (usize, Vec<ScoredRecord>) {
        let start = self.segment_start;
        let segment = self.records[start..].to_vec();
        self.segment_start = self.records.len();
        (start, segment)
    }

    /// Task metric over all records so far
    pub fn running_score(&self) -> f64 {
        match self.task {
            TaskKind::Mcq => {
                if self.tally.scored == 0 {
                    0.0
                } else {
                    self.tally.correct as f64 / self.tally.scored as f64
                }
            }
            TaskKind::Qa => self.tally.mean_score(),
            TaskKind::Code => {
                if self.bleu.translation_length == 0 {
                    0.0
                } else {
                    self.bleu.primary_bleu()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq(id: usize, correct: bool) -> ScoredRecord {
        ScoredRecord {
            item_id: id,
            task_kind: TaskKind::Mcq,
            predicted: "A".to_string(),
            reference: if correct { "A" } else { "B" }.to_string(),
            score: if correct { 1.0 } else { 0.0 },
            is_correct: Some(correct),
            latency_ms: 0,
            response_succeeded: true,
            skip_reason: None,
        }
    }

    #[test]
    fn test_transitions() {
        assert!(RunState::NotStarted.can_transition_to(RunState::Running));
        assert!(RunState::Running.can_transition_to(RunState::Checkpointed));
        assert!(RunState::Checkpointed.can_transition_to(RunState::Checkpointed));
        assert!(RunState::Checkpointed.can_transition_to(RunState::Stopped));
        assert!(!RunState::Complete.can_transition_to(RunState::Running));
        assert!(!RunState::NotStarted.can_transition_to(RunState::Complete));
        assert!(RunState::Stopped.is_terminal());
    }

    #[test]
    fn test_segments_and_running_score() {
        let mut progress = TaskProgress::new(TaskKind::Mcq);
        progress.transition(RunState::Running);
        progress.push(mcq(0, true));
        progress.push(mcq(1, false));

        let (start, segment) = progress.take_segment();
        assert_eq!(start, 0);
        assert_eq!(segment.len(), 2);

        progress.push(mcq(2, true));
        progress.push(mcq(3, true));
        let (start, segment) = progress.take_segment();
        assert_eq!(start, 2);
        assert_eq!(segment.len(), 2);
        assert_eq!(progress.running_score(), 0.75);
    }

    #[test]
    fn test_rewound_segment_covers_lost_checkpoint() {
        let mut progress = TaskProgress::new(TaskKind::Mcq);
        progress.push(mcq(0, true));
        progress.push(mcq(1, true));
        progress.take_segment();
        progress.push(mcq(2, false));

        progress.rewind_segment(0);
        let (start, segment) = progress.take_segment();
        assert_eq!(start, 0);
        assert_eq!(segment.len(), 3);
    }

    #[test]
    fn test_resumed_progress_starts_new_segment() {
        let progress = TaskProgress::resumed(TaskKind::Mcq, vec![mcq(0, true), mcq(1, true)]);
        assert_eq!(progress.processed(), 2);
        assert_eq!(progress.segment_start(), 2);
        assert_eq!(progress.tally().correct, 2);
        assert_eq!(progress.state(), RunState::NotStarted);
    }
}
