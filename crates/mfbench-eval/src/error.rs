//! Error types for the evaluation orchestrator
//!
//! Only some of these errors ever escape the crate. Query failures are swallowed by the
//! gateway and show up as empty responses, checkpoint write failures are downgraded to
//! warnings by the runner, and dataset failures become a [`TaskFailure`] value on the
//! final report. What remains fatal is configuration and result persistence.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tasks::TaskKind;

/// Result type alias for evaluation operations
pub type BenchResult<T> = Result<T, BenchError>;

/// Main error type for the evaluation orchestrator
#[derive(Error, Debug, Clone)]
pub enum BenchError {
    /// Input could not be turned into a prompt
    #[error("Sanitization failed: {message}")]
    Sanitization { message: String },

    /// External model process exceeded its wall-clock budget
    #[error("Model query timed out after {timeout_ms} ms")]
    QueryTimeout { timeout_ms: u64 },

    /// External model process ran but did not succeed
    #[error("Model process failed (exit code {exit_code:?}): {message}")]
    QueryProcess {
        exit_code: Option<i32>,
        message: String,
    },

    /// External model process could not be started
    #[error("Failed to spawn model process '{program}': {message}")]
    Spawn { program: String, message: String },

    /// Source data for a whole task could not be obtained
    #[error("Failed to load dataset for {task}: {message}")]
    DatasetLoad { task: TaskKind, message: String },

    /// A checkpoint could not be persisted
    #[error("Failed to write checkpoint {task}@{offset}: {message}")]
    CheckpointWrite {
        task: TaskKind,
        offset: usize,
        message: String,
    },

    /// A checkpoint could not be read back
    #[error("Failed to read checkpoint: {message}")]
    CheckpointRead {
        message: String,
        context: Option<String>,
    },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },
}

impl BenchError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error with context
    pub fn config_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create a dataset load error for a task
    pub fn dataset(task: TaskKind, message: impl Into<String>) -> Self {
        Self::DatasetLoad {
            task,
            message: message.into(),
        }
    }

    /// Create a checkpoint read error
    pub fn checkpoint_read(message: impl Into<String>) -> Self {
        Self::CheckpointRead {
            message: message.into(),
            context: None,
        }
    }

    /// Create a checkpoint read error with context
    pub fn checkpoint_read_with_context(
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::CheckpointRead {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create an IO error tied to a path
    pub fn io_at(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Short machine-readable code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Sanitization { .. } => "sanitization_failure",
            Self::QueryTimeout { .. } => "query_timeout",
            Self::QueryProcess { .. } => "query_process_error",
            Self::Spawn { .. } => "query_spawn_error",
            Self::DatasetLoad { .. } => "dataset_load_error",
            Self::CheckpointWrite { .. } => "checkpoint_write_error",
            Self::CheckpointRead { .. } => "checkpoint_read_error",
            Self::Config { .. } => "config_error",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
        }
    }

    /// Whether this error ends the task it occurred in.
    ///
    /// Query and checkpoint-write failures are recovered locally; only a task
    /// without data cannot continue.
    pub fn is_task_fatal(&self) -> bool {
        matches!(self, Self::DatasetLoad { .. })
    }
}

impl From<std::io::Error> for BenchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

/// Structured record of a task that could not be evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Task that failed
    pub task: TaskKind,

    /// Machine-readable error code
    pub error_code: String,

    /// Human-readable message
    pub message: String,
}

impl TaskFailure {
    /// Build a task failure from the error that ended it
    pub fn from_error(task: TaskKind, error: &BenchError) -> Self {
        Self {
            task,
            error_code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_dataset_errors_are_task_fatal() {
        assert!(BenchError::dataset(TaskKind::Mcq, "missing").is_task_fatal());
        assert!(!BenchError::QueryTimeout { timeout_ms: 30_000 }.is_task_fatal());
        assert!(
            !BenchError::CheckpointWrite {
                task: TaskKind::Qa,
                offset: 200,
                message: "disk full".to_string(),
            }
            .is_task_fatal()
        );
    }

    #[test]
    fn test_task_failure_from_error() {
        let err = BenchError::dataset(TaskKind::Code, "file not found");
        let failure = TaskFailure::from_error(TaskKind::Code, &err);

        assert_eq!(failure.task, TaskKind::Code);
        assert_eq!(failure.error_code, "dataset_load_error");
        assert!(failure.message.contains("file not found"));
    }

    #[test]
    fn test_error_display() {
        let err = BenchError::QueryProcess {
            exit_code: Some(2),
            message: "bad flag".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Model process failed (exit code Some(2)): bad flag"
        );
    }
}
