//! Results files of a run

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use super::JsonReporter;
use crate::error::{BenchError, BenchResult};
use crate::metrics::EvalReport;

/// Full report
pub const RESULTS_FILE: &str = "results.json";

/// Headline numbers only
pub const SUMMARY_FILE: &str = "summary.json";

/// Condensed view of a run written next to the full report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    /// Scored items across tasks
    pub total_tests: usize,
    pub tests_per_task: BTreeMap<String, usize>,
    pub duration_secs: f64,
    pub composite_score: f64,
    pub task_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub failed_tasks: Vec<String>,
    #[serde(default)]
    pub stopped: bool,
}

impl From<&EvalReport> for RunSummary {
    fn from(report: &EvalReport) -> Self {
        Self {
            run_id: report.run_id.clone(),
            timestamp: report.finished_at,
            model: report.model.clone(),
            total_tests: report.total_scored(),
            tests_per_task: report
                .tasks
                .iter()
                .map(|t| (t.task.as_str().to_string(), t.items_processed()))
                .collect(),
            duration_secs: report.duration_secs,
            composite_score: report.composite.value,
            task_scores: report
                .tasks
                .iter()
                .filter_map(|t| t.primary_score().map(|s| (t.task.metric_name().to_string(), s)))
                .collect(),
            failed_tasks: report
                .failed_tasks()
                .iter()
                .map(|t| t.task.as_str().to_string())
                .collect(),
            stopped: report.stopped,
        }
    }
}

/// Writes and reads the results files in a run directory
pub struct ResultsWriter {
    run_dir: PathBuf,
}

impl ResultsWriter {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn results_path(&self) -> PathBuf {
        self.run_dir.join(RESULTS_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.run_dir.join(SUMMARY_FILE)
    }

    /// Write `results.json` and `summary.json`, replacing earlier versions
    pub async fn write(&self, report: &EvalReport) -> BenchResult<RunSummary> {
        fs::create_dir_all(&self.run_dir).await.map_err(|e| {
            BenchError::io_at(
                format!("Failed to create run directory: {}", e),
                self.run_dir.display().to_string(),
            )
        })?;

        let summary = RunSummary::from(report);
        write_file(&self.results_path(), &JsonReporter::generate(report)?).await?;
        write_file(&self.summary_path(), &serde_json::to_string_pretty(&summary)?).await?;

        info!(
            path = %self.results_path().display(),
            composite = summary.composite_score,
            "Results written"
        );
        Ok(summary)
    }

    /// Read the full report of this run
    pub async fn read(&self) -> BenchResult<EvalReport> {
        read_report(&self.results_path()).await
    }
}

/// Read a report from any `results.json`
pub async fn read_report(path: &Path) -> BenchResult<EvalReport> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        BenchError::io_at(
            format!("Failed to read report: {}", e),
            path.display().to_string(),
        )
    })?;
    JsonReporter::parse(&content)
}

async fn write_file(path: &Path, content: &str) -> BenchResult<()> {
    fs::write(path, content).await.map_err(|e| {
        BenchError::io_at(
            format!("Failed to write {}: {}", path.display(), e),
            path.display().to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::report::tests::sample_report;

    #[tokio::test]
    async fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let writer = ResultsWriter::new(dir.path().join("run"));
        let report = sample_report();

        let summary = writer.write(&report).await.unwrap();
        assert_eq!(summary.total_tests, 4);
        assert_eq!(summary.composite_score, 0.5);
        assert_eq!(summary.task_scores.get("accuracy"), Some(&0.5));
        assert_eq!(summary.failed_tasks, vec!["code".to_string()]);

        let read = writer.read().await.unwrap();
        assert_eq!(read.run_id, report.run_id);
        assert_eq!(read.tasks.len(), 2);

        let on_disk: RunSummary =
            serde_json::from_str(&std::fs::read_to_string(writer.summary_path()).unwrap()).unwrap();
        assert_eq!(on_disk, summary);
    }

    #[tokio::test]
    async fn test_read_missing_report_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_report(&dir.path().join("results.json")).await.unwrap_err();
        assert!(matches!(err, BenchError::Io { .. }));
    }
}
