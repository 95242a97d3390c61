//! Core metric types for evaluation
//!
//! Defines the per-item records, per-task aggregates, the composite score and the full run
//! report. Everything here is persisted, so new fields must carry `#[serde(default)]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult, TaskFailure};
use crate::runner::RunState;
use crate::scoring::BleuReport;
use crate::tasks::TaskKind;

/// Version of the persisted report and checkpoint layout
pub const SCHEMA_VERSION: u32 = 1;

/// Score of one item, in evaluation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub item_id: usize,

    pub task_kind: TaskKind,

    /// Letter, answer or extracted summary; empty when the model gave nothing usable
    pub predicted: String,

    pub reference: String,

    pub score: f64,

    /// Multiple-choice only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,

    #[serde(default)]
    pub latency_ms: u64,

    #[serde(default = "default_true")]
    pub response_succeeded: bool,

    /// Set when the dataset row could not be used; such records are not scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ScoredRecord {
    /// Placeholder for a dataset row that was skipped at load time
    pub fn skipped(task_kind: TaskKind, item_id: usize, reason: impl Into<String>) -> Self {
        Self {
            item_id,
            task_kind,
            predicted: String::new(),
            reference: String::new(),
            score: 0.0,
            is_correct: None,
            latency_ms: 0,
            response_succeeded: false,
            skip_reason: Some(reason.into()),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct == Some(true)
    }
}

/// Task-specific aggregate metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum TaskMetrics {
    Mcq {
        accuracy: f64,
        correct: usize,
        total: usize,
    },
    Qa {
        average_quality_score: f64,
        total_samples: usize,
    },
    Code {
        bleu: BleuReport,
        total_samples: usize,
    },
}

/// Aggregate result for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub task: TaskKind,

    pub metrics: TaskMetrics,

    /// Rows skipped at load time
    #[serde(default)]
    pub skipped: usize,

    /// Items whose model call produced no response
    #[serde(default)]
    pub failed_queries: usize,

    #[serde(default)]
    pub mean_latency_ms: f64,
}

impl AggregateResult {
    /// The single number that represents this task in the composite
    pub fn primary_score(&self) -> f64 {
        match &self.metrics {
            TaskMetrics::Mcq { accuracy, .. } => *accuracy,
            TaskMetrics::Qa {
                average_quality_score,
                ..
            } => *average_quality_score,
            TaskMetrics::Code { bleu, .. } => bleu.bleu,
        }
    }

    /// Number of scored items
    pub fn total(&self) -> usize {
        match &self.metrics {
            TaskMetrics::Mcq { total, .. } => *total,
            TaskMetrics::Qa { total_samples, .. } => *total_samples,
            TaskMetrics::Code { total_samples, .. } => *total_samples,
        }
    }
}

/// Composite weights (heuristic, documented defaults 0.4 / 0.3 / 0.3)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    #[serde(default = "default_mcq_weight")]
    pub mcq: f64,
    #[serde(default = "default_qa_weight")]
    pub qa: f64,
    #[serde(default = "default_bleu_weight")]
    pub bleu: f64,
}

fn default_mcq_weight() -> f64 {
    0.4
}

fn default_qa_weight() -> f64 {
    0.3
}

fn default_bleu_weight() -> f64 {
    0.3
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            mcq: default_mcq_weight(),
            qa: default_qa_weight(),
            bleu: default_bleu_weight(),
        }
    }
}

impl CompositeWeights {
    pub fn weight(&self, kind: TaskKind) -> f64 {
        match kind {
            TaskKind::Mcq => self.mcq,
            TaskKind::Qa => self.qa,
            TaskKind::Code => self.bleu,
        }
    }

    pub fn validate(&self) -> BenchResult<()> {
        let weights = [self.mcq, self.qa, self.bleu];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(BenchError::config("composite weights must be non-negative"));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(BenchError::config("composite weights must sum to a positive value"));
        }
        Ok(())
    }
}

/// Weighted composite over the tasks that produced a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Composite in [0, 1]
    pub value: f64,

    /// Tasks that contributed
    pub included: Vec<TaskKind>,

    /// Tasks that failed or were not run; their weight is redistributed
    #[serde(default)]
    pub missing: Vec<TaskKind>,

    /// Sum of the weights of the included tasks before renormalization
    #[serde(default)]
    pub weight_covered: f64,
}

impl CompositeScore {
    /// Whether every weighted task contributed
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Relative difference to one baseline metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineDelta {
    /// Metric name, `mcq_accuracy` or `bleu`
    pub metric: String,
    pub baseline_value: f64,
    pub observed: f64,
    /// Percentage change; 0 when nothing was observed
    pub delta_pct: f64,
}

/// Comparison of this run against one named baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub baseline: String,
    pub deltas: Vec<BaselineDelta>,
}

/// Short preview of an item and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPreview {
    pub item_id: usize,
    pub question: String,
    pub predicted: String,
    pub reference: String,
    pub score: f64,
}

/// Everything known about one task after a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task: TaskKind,

    pub state: RunState,

    /// Present when the task produced records
    #[serde(default)]
    pub result: Option<AggregateResult>,

    /// Present when the task could not run
    #[serde(default)]
    pub failure: Option<TaskFailure>,

    /// Entries in the suite after sampling
    #[serde(default)]
    pub total_items: usize,

    /// All records in evaluation order
    #[serde(default)]
    pub records: Vec<ScoredRecord>,

    #[serde(default)]
    pub previews: Vec<RecordPreview>,

    /// Offsets at which checkpoints were written
    #[serde(default)]
    pub checkpoints: Vec<usize>,

    /// Checkpoint writes that failed (non-fatal)
    #[serde(default)]
    pub checkpoint_errors: usize,

    /// Offset the task was resumed from, if any
    #[serde(default)]
    pub resumed_from: Option<usize>,
}

impl TaskOutcome {
    /// Outcome of a task that failed before producing records
    pub fn failed(task: TaskKind, failure: TaskFailure) -> Self {
        Self {
            task,
            state: RunState::Failed,
            result: None,
            failure: Some(failure),
            total_items: 0,
            records: Vec::new(),
            previews: Vec::new(),
            checkpoints: Vec::new(),
            checkpoint_errors: 0,
            resumed_from: None,
        }
    }

    /// Outcome of a task that was never reached, e.g. after cancellation
    pub fn not_started(task: TaskKind) -> Self {
        Self {
            task,
            state: RunState::NotStarted,
            result: None,
            failure: None,
            total_items: 0,
            records: Vec::new(),
            previews: Vec::new(),
            checkpoints: Vec::new(),
            checkpoint_errors: 0,
            resumed_from: None,
        }
    }

    pub fn items_processed(&self) -> usize {
        self.records.len()
    }

    pub fn primary_score(&self) -> Option<f64> {
        self.result.as_ref().map(AggregateResult::primary_score)
    }
}

/// Full report of an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    pub run_id: String,

    /// Model command line or gateway description
    pub model: String,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    pub duration_secs: f64,

    pub tasks: Vec<TaskOutcome>,

    pub composite: CompositeScore,

    #[serde(default)]
    pub benchmarks: Vec<BenchmarkComparison>,

    /// Whether the run was cancelled before all tasks completed
    #[serde(default)]
    pub stopped: bool,

    /// Version of the tool that produced the report
    #[serde(default)]
    pub tool_version: String,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl EvalReport {
    pub fn task(&self, kind: TaskKind) -> Option<&TaskOutcome> {
        self.tasks.iter().find(|t| t.task == kind)
    }

    /// Tasks that failed to run
    pub fn failed_tasks(&self) -> Vec<&TaskOutcome> {
        self.tasks.iter().filter(|t| t.failure.is_some()).collect()
    }

    /// Total records across tasks, skipped rows excluded
    pub fn total_scored(&self) -> usize {
        self.tasks
            .iter()
            .map(|t| t.records.iter().filter(|r| !r.is_skipped()).count())
            .sum()
    }
}
