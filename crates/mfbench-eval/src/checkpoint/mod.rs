//! Checkpointing of task progress
//!
//! Checkpoints are written every `checkpoint_interval` processed items, one new file per
//! task, offset and attempt, and are never modified afterwards.

mod backend;
mod store;
mod types;

#[cfg(test)]
pub use backend::MockCheckpointBackend;
pub use backend::{CheckpointBackend, FileCheckpointBackend, MemoryCheckpointBackend};
pub use store::{CheckpointStore, ResumePoint};
pub use types::{
    Checkpoint, CheckpointKey, CheckpointSummary, RunningTally, checkpoint_file_stem, parse_checkpoint_file_name,
};
