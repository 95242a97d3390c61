//! External model gateway
//!
//! The gateway is the only component that talks to the model. A call never fails from the
//! caller's point of view: every failure is folded into a [`QueryResult`] with an empty
//! response and a [`QueryFailure`] describing what went wrong.

mod process;
mod workdir;

pub use process::ProcessGateway;
pub use workdir::WorkDir;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BenchError;

/// Anything that turns a prompt into a response
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Issue one query. Exactly one attempt; never retried here.
    async fn query(&self, prompt: &str) -> QueryResult;

    /// Human-readable description of the model behind this gateway
    fn describe(&self) -> String {
        "model".to_string()
    }
}

/// Why a query produced no response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryFailure {
    /// Prompt was empty after sanitization; nothing was spawned
    EmptyPrompt,
    /// Wall-clock budget exceeded; the child was killed
    Timeout { timeout_ms: u64 },
    /// Child exited unsuccessfully
    NonZeroExit { exit_code: Option<i32>, stderr: String },
    /// Child could not be started
    Spawn { message: String },
    /// Waiting on the child failed
    Io { message: String },
}

impl QueryFailure {
    /// Error value carrying the same information, for logging and classification
    pub fn to_error(&self, program: &str) -> BenchError {
        match self {
            QueryFailure::EmptyPrompt => BenchError::Sanitization {
                message: "prompt is empty after sanitization".to_string(),
            },
            QueryFailure::Timeout { timeout_ms } => BenchError::QueryTimeout {
                timeout_ms: *timeout_ms,
            },
            QueryFailure::NonZeroExit { exit_code, stderr } => BenchError::QueryProcess {
                exit_code: *exit_code,
                message: stderr.clone(),
            },
            QueryFailure::Spawn { message } => BenchError::Spawn {
                program: program.to_string(),
                message: message.clone(),
            },
            QueryFailure::Io { message } => BenchError::QueryProcess {
                exit_code: None,
                message: message.clone(),
            },
        }
    }
}

/// Outcome of one gateway call
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Trimmed model output; empty on failure
    pub raw_response: String,

    /// Wall-clock time of the call
    pub latency: Duration,

    pub succeeded: bool,

    pub failure: Option<QueryFailure>,
}

impl QueryResult {
    pub fn success(response: impl Into<String>, latency: Duration) -> Self {
        Self {
            raw_response: response.into(),
            latency,
            succeeded: true,
            failure: None,
        }
    }

    pub fn failed(failure: QueryFailure, latency: Duration) -> Self {
        Self {
            raw_response: String::new(),
            latency,
            succeeded: false,
            failure: Some(failure),
        }
    }

    /// Latency in whole milliseconds
    pub fn latency_ms(&self) -> u64 {
        self.latency.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_has_empty_response() {
        let result = QueryResult::failed(
            QueryFailure::Timeout { timeout_ms: 30_000 },
            Duration::from_secs(30),
        );
        assert!(!result.succeeded);
        assert!(result.raw_response.is_empty());
        assert_eq!(result.latency_ms(), 30_000);
    }

    #[test]
    fn test_failure_maps_to_error_kind() {
        let timeout = QueryFailure::Timeout { timeout_ms: 100 }.to_error("q");
        assert_eq!(timeout.error_code(), "query_timeout");

        let spawn = QueryFailure::Spawn {
            message: "No such file or directory".to_string(),
        }
        .to_error("q");
        assert_eq!(spawn.error_code(), "query_spawn_error");
        assert!(spawn.to_string().contains("'q'"));

        let exit = QueryFailure::NonZeroExit {
            exit_code: Some(1),
            stderr: String::new(),
        }
        .to_error("q");
        assert!(!exit.is_task_fatal());
    }
}
