//! Per-task runner configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How one task is batched, paced and checkpointed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRunConfig {
    /// Items per batch; cancellation is checked between batches
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Processed items between checkpoints
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Pause between consecutive model calls on one worker
    #[serde(default = "default_rate_limit_delay", with = "humantime_serde")]
    pub rate_limit_delay: Duration,

    /// Evaluate only the first N entries (all when unset)
    #[serde(default)]
    pub sample_size: Option<usize>,
}

fn default_batch_size() -> usize {
    50
}

fn default_checkpoint_interval() -> usize {
    100
}

fn default_rate_limit_delay() -> Duration {
    Duration::from_millis(500)
}

impl Default for TaskRunConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            checkpoint_interval: default_checkpoint_interval(),
            rate_limit_delay: default_rate_limit_delay(),
            sample_size: None,
        }
    }
}

impl TaskRunConfig {
    /// Multiple-choice defaults: checkpoint every 100 items
    pub fn mcq() -> Self {
        Self::default()
    }

    /// Question-answering defaults: checkpoint every 200 items
    pub fn qa() -> Self {
        Self {
            checkpoint_interval: 200,
            ..Self::default()
        }
    }

    /// Code-summarization defaults: checkpoint every 100 items
    pub fn code() -> Self {
        Self::default()
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the checkpoint interval
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Set the delay between calls
    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    /// Set the sample size
    pub fn with_sample_size(mut self, sample_size: Option<usize>) -> Self {
        self.sample_size = sample_size;
        self
    }
}
