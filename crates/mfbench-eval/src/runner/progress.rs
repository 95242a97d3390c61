//! Progress reporting

use std::sync::Arc;

use super::RunState;
use crate::tasks::TaskKind;

/// Callback type for progress updates
pub type ProgressCallback = Arc<dyn Fn(RunProgress) + Send + Sync>;

/// What happened
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Task started, possibly from a checkpoint
    Started { resumed_from: Option<usize> },
    /// One more item was scored
    ItemScored,
    /// A checkpoint was taken at this offset
    Checkpoint { offset: usize },
    /// Task reached a terminal state
    Finished { state: RunState },
}

/// Progress update during evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct RunProgress {
    pub task: TaskKind,
    /// Suite entries processed so far
    pub processed: usize,
    /// Suite entries after sampling
    pub total: usize,
    pub event: ProgressEvent,
}
