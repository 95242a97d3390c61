//! Checkpoint types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::{SCHEMA_VERSION, ScoredRecord};
use crate::tasks::TaskKind;

/// Running counters over the records of a task
///
/// Updated one record at a time, in evaluation order, so replaying the same records
/// reproduces it exactly (including the floating-point sum).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningTally {
    /// Records that were scored
    pub scored: usize,
    /// Rows skipped at load time
    pub skipped: usize,
    /// Correct multiple-choice answers
    pub correct: usize,
    /// Sum of per-item scores
    pub score_sum: f64,
}

impl RunningTally {
    pub fn record(&mut self, record: &ScoredRecord) {
        if record.is_skipped() {
            self.skipped += 1;
            return;
        }
        self.scored += 1;
        if record.is_correct() {
            self.correct += 1;
        }
        self.score_sum += record.score;
    }

    /// Replay records from scratch
    pub fn from_records(records: &[ScoredRecord]) -> Self {
        let mut tally = Self::default();
        for record in records {
            tally.record(record);
        }
        tally
    }

    /// Items counted, skipped rows included
    pub fn processed(&self) -> usize {
        self.scored + self.skipped
    }

    /// Mean per-item score
    pub fn mean_score(&self) -> f64 {
        if self.scored == 0 {
            0.0
        } else {
            self.score_sum / self.scored as f64
        }
    }
}

/// Identity of a checkpoint within a task: its offset and the attempt that wrote it
///
/// Every run or resume of a task writes under a fresh attempt number, so re-evaluating a
/// range that an earlier attempt already checkpointed never collides with its files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CheckpointKey {
    pub offset: usize,
    pub attempt: u32,
}

impl CheckpointKey {
    pub fn new(offset: usize, attempt: u32) -> Self {
        Self { offset, attempt }
    }
}

impl std::fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (attempt {})", self.offset, self.attempt)
    }
}

/// Persisted progress of one task at one offset
///
/// A checkpoint is a segment: it carries the records in `[segment_start, items_processed)`,
/// and the checkpoint at `(segment_start, segment_attempt)` (if any) carries the ones
/// before that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    pub run_id: String,

    pub task: TaskKind,

    /// Offset of this checkpoint: number of suite entries processed
    pub items_processed: usize,

    /// Attempt that wrote this checkpoint
    #[serde(default)]
    pub attempt: u32,

    /// Offset of the previous checkpoint in the chain (0 for the first)
    #[serde(default)]
    pub segment_start: usize,

    /// Attempt of the previous checkpoint in the chain
    #[serde(default)]
    pub segment_attempt: u32,

    pub tally: RunningTally,

    /// Task metric over all records so far
    pub running_score: f64,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub records: Vec<ScoredRecord>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Checkpoint {
    pub fn key(&self) -> CheckpointKey {
        CheckpointKey::new(self.items_processed, self.attempt)
    }

    /// Key of the previous segment, `None` for the first one
    pub fn previous_key(&self) -> Option<CheckpointKey> {
        (self.segment_start > 0).then(|| CheckpointKey::new(self.segment_start, self.segment_attempt))
    }

    /// File stem used for this checkpoint
    pub fn file_stem(&self) -> String {
        checkpoint_file_stem(self.task, self.key())
    }
}

/// `{task}_checkpoint_{offset}` for the first attempt, `{task}_checkpoint_{offset}_r{attempt}`
/// for later ones
pub fn checkpoint_file_stem(task: TaskKind, key: CheckpointKey) -> String {
    if key.attempt == 0 {
        format!("{}_checkpoint_{}", task.as_str(), key.offset)
    } else {
        format!("{}_checkpoint_{}_r{}", task.as_str(), key.offset, key.attempt)
    }
}

/// Parse a checkpoint key out of a file name for the given task
pub fn parse_checkpoint_file_name(task: TaskKind, file_name: &str) -> Option<CheckpointKey> {
    let rest = file_name
        .strip_suffix(".json")?
        .strip_prefix(task.as_str())?
        .strip_prefix("_checkpoint_")?;
    match rest.split_once("_r") {
        Some((offset, attempt)) => Some(CheckpointKey::new(offset.parse().ok()?, attempt.parse().ok()?)),
        None => Some(CheckpointKey::new(rest.parse().ok()?, 0)),
    }
}

/// Summary of a checkpoint for listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub task: TaskKind,
    pub items_processed: usize,
    pub attempt: u32,
    pub segment_start: usize,
    pub running_score: f64,
    pub scored: usize,
    pub skipped: usize,
    pub timestamp: DateTime<Utc>,
}

impl From<&Checkpoint> for CheckpointSummary {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self {
            task: checkpoint.task,
            items_processed: checkpoint.items_processed,
            attempt: checkpoint.attempt,
            segment_start: checkpoint.segment_start,
            running_score: checkpoint.running_score,
            scored: checkpoint.tally.scored,
            skipped: checkpoint.tally.skipped,
            timestamp: checkpoint.timestamp,
        }
    }
}
