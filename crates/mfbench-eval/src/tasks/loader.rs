//! Dataset loading
//!
//! Reads MainframeBench rows from local JSON, JSON Lines or YAML files and turns them into
//! [`TaskSuite`]s. Rows missing a required field become [`SuiteEntry::Skipped`] instead of
//! failing the whole task.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::{Choice, CodeItem, McqItem, QaItem, SuiteEntry, TaskKind, TaskSuite, TestItem};
use crate::error::{BenchError, BenchResult};

/// Source of task suites
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Load the ordered suite for one task kind
    async fn load(&self, kind: TaskKind) -> BenchResult<TaskSuite>;
}

/// Loader for dataset files in a directory
///
/// For each task it looks for `<dataset_name>.{json,jsonl,yaml,yml}` and then
/// `full_<dataset_name>_tests.json` under the data directory.
pub struct DatasetLoader {
    data_dir: PathBuf,
}

impl DatasetLoader {
    /// Create a loader rooted at the given data directory
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Candidate file paths for a task, in lookup order
    pub fn candidate_paths(&self, kind: TaskKind) -> Vec<PathBuf> {
        let name = kind.dataset_name();
        let mut paths: Vec<PathBuf> = ["json", "jsonl", "yaml", "yml"]
            .iter()
            .map(|ext| self.data_dir.join(format!("{}.{}", name, ext)))
            .collect();
        paths.push(self.data_dir.join(format!("full_{}_tests.json", name)));
        paths
    }

    /// Find the dataset file for a task
    pub fn resolve(&self, kind: TaskKind) -> BenchResult<PathBuf> {
        self.candidate_paths(kind)
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| {
                BenchError::dataset(
                    kind,
                    format!(
                        "no {} dataset file found in {}",
                        kind.dataset_name(),
                        self.data_dir.display()
                    ),
                )
            })
    }

    /// Load a suite from an explicit file
    pub async fn load_file(&self, kind: TaskKind, path: &Path) -> BenchResult<TaskSuite> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            BenchError::dataset(kind, format!("failed to read {}: {}", path.display(), e))
        })?;

        let rows = parse_rows(path, &content)
            .map_err(|message| BenchError::dataset(kind, format!("{}: {}", path.display(), message)))?;

        let suite = suite_from_rows(kind, &rows);
        tracing::info!(
            task = %kind,
            path = %path.display(),
            entries = suite.len(),
            skipped = suite.skipped_count(),
            "Loaded dataset"
        );
        Ok(suite)
    }
}

#[async_trait]
impl DatasetSource for DatasetLoader {
    async fn load(&self, kind: TaskKind) -> BenchResult<TaskSuite> {
        let path = self.resolve(kind)?;
        self.load_file(kind, &path).await
    }
}

/// Dataset backed by suites held in memory (useful for testing)
#[derive(Default)]
pub struct StaticDataset {
    suites: HashMap<TaskKind, Result<TaskSuite, String>>,
}

impl StaticDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a suite for its task kind
    pub fn with_suite(mut self, suite: TaskSuite) -> Self {
        self.suites.insert(suite.kind(), Ok(suite));
        self
    }

    /// Make a task fail to load with the given message
    pub fn with_failure(mut self, kind: TaskKind, message: impl Into<String>) -> Self {
        self.suites.insert(kind, Err(message.into()));
        self
    }
}

#[async_trait]
impl DatasetSource for StaticDataset {
    async fn load(&self, kind: TaskKind) -> BenchResult<TaskSuite> {
        match self.suites.get(&kind) {
            Some(Ok(suite)) => Ok(suite.clone()),
            Some(Err(message)) => Err(BenchError::dataset(kind, message.clone())),
            None => Err(BenchError::dataset(kind, "no suite registered")),
        }
    }
}

/// Parse the rows of a dataset file based on its extension
fn parse_rows(path: &Path, content: &str) -> Result<Vec<Value>, String> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let document: Value = match ext {
        "jsonl" => {
            return content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .enumerate()
                .map(|(n, line)| {
                    serde_json::from_str(line).map_err(|e| format!("line {}: {}", n + 1, e))
                })
                .collect();
        }
        "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| e.to_string())?,
        _ => serde_json::from_str(content).map_err(|e| e.to_string())?,
    };

    match document {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => {
            for key in ["tests", "train", "data", "rows"] {
                if let Some(Value::Array(rows)) = map.remove(key) {
                    return Ok(rows);
                }
            }
            Err("expected an array of rows or an object with a 'tests' or 'train' array".to_string())
        }
        _ => Err("expected an array of rows".to_string()),
    }
}

/// Convert raw rows into suite entries, assigning ordinals by position
pub fn suite_from_rows(kind: TaskKind, rows: &[Value]) -> TaskSuite {
    let entries = rows
        .iter()
        .enumerate()
        .map(|(id, row)| match item_from_row(kind, id, row) {
            Ok(item) => SuiteEntry::Item(item),
            Err(reason) => {
                tracing::debug!(task = %kind, item_id = id, %reason, "Skipping dataset row");
                SuiteEntry::Skipped { id, reason }
            }
        })
        .collect();
    TaskSuite::new(kind, entries)
}

fn item_from_row(kind: TaskKind, id: usize, row: &Value) -> Result<TestItem, String> {
    match kind {
        TaskKind::Mcq => {
            let question = field(row, &["question"])?;
            let options = [
                field(row, &["A"])?,
                field(row, &["B"])?,
                field(row, &["C"])?,
                field(row, &["D"])?,
            ];
            let raw_answer = field(row, &["answer", "correct"])?;
            let answer = Choice::from_letter(&raw_answer)
                .ok_or_else(|| format!("answer '{}' is not one of A-D", raw_answer))?;
            Ok(TestItem::Mcq(McqItem {
                id,
                question,
                options,
                answer,
            }))
        }
        TaskKind::Qa => Ok(TestItem::Qa(QaItem {
            id,
            question: field(row, &["question"])?,
            answer: field(row, &["answer", "reference"])?,
        })),
        TaskKind::Code => Ok(TestItem::Code(CodeItem {
            id,
            code: field(row, &["code", "source"])?,
            summary: field(row, &["summary", "reference"])?,
        })),
    }
}

/// Read the first present, non-empty field among `names`
fn field(row: &Value, names: &[&str]) -> Result<String, String> {
    for name in names {
        let text = match row.get(*name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        if !text.trim().is_empty() {
            return Ok(text);
        }
    }
    Err(format!("missing required field '{}'", names[0]))
}
