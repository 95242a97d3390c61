//! Benchmark tasks, prompts and dataset loading

mod loader;
mod prompt;
mod task;

pub use loader::{DatasetLoader, DatasetSource, StaticDataset, suite_from_rows};
pub use prompt::{MAX_CODE_CHARS, build_prompt};
pub use task::{
    Choice, CodeItem, McqItem, QaItem, SuiteEntry, TaskKind, TaskSuite, TestItem, truncate_preview,
};
