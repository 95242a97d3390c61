//! Evaluation runner
//!
//! Batching, pacing, checkpointing and orchestration of benchmark tasks.

mod batch;
mod config;
mod orchestrator;
mod progress;
mod state;

pub use batch::BatchRunner;
pub use config::TaskRunConfig;
pub use orchestrator::Orchestrator;
pub use progress::{ProgressCallback, ProgressEvent, RunProgress};
pub use state::{RunState, TaskProgress};
