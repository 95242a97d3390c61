//! Metrics aggregation for evaluation results
//!
//! Turns scored records into per-task aggregates, the weighted composite and the baseline
//! comparisons. Everything here is a pure function of the records, so a stored report can
//! be rescored and produce the same numbers.

use super::types::{
    AggregateResult, BaselineDelta, BenchmarkComparison, CompositeScore, CompositeWeights,
    EvalReport, ScoredRecord, TaskMetrics, TaskOutcome,
};
use crate::runner::RunState;
use crate::scoring::BleuReport;
use crate::tasks::TaskKind;

/// Published scores of a reference model
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub name: String,
    pub mcq_accuracy: Option<f64>,
    pub bleu: Option<f64>,
}

impl Baseline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mcq_accuracy: None,
            bleu: None,
        }
    }

    pub fn with_mcq_accuracy(mut self, accuracy: f64) -> Self {
        self.mcq_accuracy = Some(accuracy);
        self
    }

    pub fn with_bleu(mut self, bleu: f64) -> Self {
        self.bleu = Some(bleu);
        self
    }
}

/// XMainframe-Instruct and GPT-3.5 as reported on MainframeBench
pub fn default_baselines() -> Vec<Baseline> {
    vec![
        Baseline::new("XMainframe-Instruct")
            .with_mcq_accuracy(0.7789)
            .with_bleu(0.1139),
        Baseline::new("GPT-3.5").with_bleu(0.12),
    ]
}

/// Relative change in percent; 0 when nothing was observed
pub fn relative_delta(observed: f64, baseline: f64) -> f64 {
    if observed <= 0.0 || baseline == 0.0 {
        0.0
    } else {
        (observed - baseline) / baseline * 100.0
    }
}

/// Aggregator for computing summary metrics from scored records
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    weights: CompositeWeights,
    baselines: Vec<Baseline>,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(CompositeWeights::default())
    }
}

impl MetricsAggregator {
    pub fn new(weights: CompositeWeights) -> Self {
        Self {
            weights,
            baselines: default_baselines(),
        }
    }

    pub fn weights(&self) -> &CompositeWeights {
        &self.weights
    }

    /// Aggregate the records of one task. Skipped rows are counted but not scored.
    pub fn aggregate(&self, task: TaskKind, records: &[ScoredRecord]) -> AggregateResult {
        let scored: Vec<&ScoredRecord> = records.iter().filter(|r| !r.is_skipped()).collect();
        let total = scored.len();

        let metrics = match task {
            TaskKind::Mcq => {
                let correct = scored.iter().filter(|r| r.is_correct()).count();
                TaskMetrics::Mcq {
                    accuracy: ratio(correct as f64, total),
                    correct,
                    total,
                }
            }
            TaskKind::Qa => TaskMetrics::Qa {
                average_quality_score: ratio(scored.iter().map(|r| r.score).sum(), total),
                total_samples: total,
            },
            TaskKind::Code => {
                let predictions: Vec<&str> = scored.iter().map(|r| r.predicted.as_str()).collect();
                let references: Vec<&str> = scored.iter().map(|r| r.reference.as_str()).collect();
                TaskMetrics::Code {
                    bleu: BleuReport::compute(&predictions, &references),
                    total_samples: total,
                }
            }
        };

        AggregateResult {
            task,
            metrics,
            skipped: records.len() - total,
            failed_queries: scored.iter().filter(|r| !r.response_succeeded).count(),
            mean_latency_ms: ratio(scored.iter().map(|r| r.latency_ms as f64).sum(), total),
        }
    }

    /// Weighted composite over the tasks that produced a result.
    ///
    /// Weights of the remaining `expected` tasks are redistributed over the available ones,
    /// so a partial run still yields a score in [0, 1]; `missing` names what was left out.
    pub fn composite(&self, results: &[&AggregateResult], expected: &[TaskKind]) -> CompositeScore {
        let included: Vec<TaskKind> = results.iter().map(|r| r.task).collect();
        let missing: Vec<TaskKind> = expected
            .iter()
            .copied()
            .filter(|kind| !included.contains(kind))
            .collect();

        let weight_covered: f64 = results.iter().map(|r| self.weights.weight(r.task)).sum();
        let weighted: f64 = results
            .iter()
            .map(|r| self.weights.weight(r.task) * r.primary_score())
            .sum();

        let value = if weight_covered > 0.0 {
            (weighted / weight_covered).clamp(0.0, 1.0)
        } else {
            0.0
        };

        CompositeScore {
            value,
            included,
            missing,
            weight_covered,
        }
    }

    /// Deltas against every baseline metric this run has a result for
    pub fn compare(&self, results: &[&AggregateResult]) -> Vec<BenchmarkComparison> {
        let observed = |kind: TaskKind| {
            results
                .iter()
                .find(|r| r.task == kind)
                .map(|r| r.primary_score())
        };

        self.baselines
            .iter()
            .map(|baseline| {
                let mut deltas = Vec::new();
                if let (Some(base), Some(obs)) = (baseline.mcq_accuracy, observed(TaskKind::Mcq)) {
                    deltas.push(delta("mcq_accuracy", base, obs));
                }
                if let (Some(base), Some(obs)) = (baseline.bleu, observed(TaskKind::Code)) {
                    deltas.push(delta("bleu", base, obs));
                }
                BenchmarkComparison {
                    baseline: baseline.name.clone(),
                    deltas,
                }
            })
            .collect()
    }

    /// Composite and comparisons for a set of task outcomes
    pub fn summarize(
        &self,
        outcomes: &[TaskOutcome],
        expected: &[TaskKind],
    ) -> (CompositeScore, Vec<BenchmarkComparison>) {
        let results: Vec<&AggregateResult> =
            outcomes.iter().filter_map(|o| o.result.as_ref()).collect();
        (self.composite(&results, expected), self.compare(&results))
    }

    /// Recompute every aggregate, the composite and the comparisons from stored records
    pub fn rescore(&self, report: &mut EvalReport) {
        for outcome in &mut report.tasks {
            if outcome.failure.is_none() {
                outcome.result = Some(self.aggregate(outcome.task, &outcome.records));
            }
        }
        let expected: Vec<TaskKind> = report.tasks.iter().map(|t| t.task).collect();
        let (composite, benchmarks) = self.summarize(&report.tasks, &expected);
        report.composite = composite;
        report.benchmarks = benchmarks;
    }

    /// Fold the outcomes of a resumed run into the report of the run it continues.
    ///
    /// Tasks in `resumed` replace the same tasks in `previous`; the others are kept as they
    /// were. The composite is computed over `expected` plus every task either report holds,
    /// so tasks that still have no result are listed as missing.
    pub fn merge(&self, previous: EvalReport, resumed: EvalReport, expected: &[TaskKind]) -> EvalReport {
        let mut tasks = previous.tasks;
        for outcome in resumed.tasks {
            match tasks.iter_mut().find(|t| t.task == outcome.task) {
                Some(slot) => *slot = outcome,
                None => tasks.push(outcome),
            }
        }
        tasks.sort_by_key(|t| TaskKind::all().iter().position(|k| *k == t.task));

        let expected: Vec<TaskKind> = TaskKind::all()
            .iter()
            .copied()
            .filter(|kind| expected.contains(kind) || tasks.iter().any(|t| t.task == *kind))
            .collect();
        let (composite, benchmarks) = self.summarize(&tasks, &expected);
        let stopped = tasks
            .iter()
            .any(|t| matches!(t.state, RunState::Stopped | RunState::NotStarted));

        EvalReport {
            schema_version: resumed.schema_version,
            run_id: resumed.run_id,
            model: resumed.model,
            started_at: previous.started_at,
            finished_at: resumed.finished_at,
            duration_secs: previous.duration_secs + resumed.duration_secs,
            tasks,
            composite,
            benchmarks,
            stopped,
            tool_version: resumed.tool_version,
        }
    }
}

fn delta(metric: &str, baseline_value: f64, observed: f64) -> BaselineDelta {
    BaselineDelta {
        metric: metric.to_string(),
        baseline_value,
        observed,
        delta_pct: relative_delta(observed, baseline_value),
    }
}

fn ratio(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq_record(id: usize, correct: bool) -> ScoredRecord {
        ScoredRecord {
            item_id: id,
            task_kind: TaskKind::Mcq,
            predicted: if correct { "B" } else { "C" }.to_string(),
            reference: "B".to_string(),
            score: if correct { 1.0 } else { 0.0 },
            is_correct: Some(correct),
            latency_ms: 100,
            response_succeeded: true,
            skip_reason: None,
        }
    }

    fn result(task: TaskKind, score: f64) -> AggregateResult {
        let metrics = match task {
            TaskKind::Mcq => TaskMetrics::Mcq {
                accuracy: score,
                correct: 0,
                total: 0,
            },
            TaskKind::Qa => TaskMetrics::Qa {
                average_quality_score: score,
                total_samples: 0,
            },
            TaskKind::Code => TaskMetrics::Code {
                bleu: BleuReport {
                    bleu: score,
                    ..Default::default()
                },
                total_samples: 0,
            },
        };
        AggregateResult {
            task,
            metrics,
            skipped: 0,
            failed_queries: 0,
            mean_latency_ms: 0.0,
        }
    }

    #[test]
    fn test_mcq_accuracy_ignores_skipped_rows() {
        let records = vec![
            mcq_record(0, true),
            ScoredRecord::skipped(TaskKind::Mcq, 1, "bad answer"),
            mcq_record(2, false),
            mcq_record(3, true),
            mcq_record(4, false),
        ];
        let result = MetricsAggregator::default().aggregate(TaskKind::Mcq, &records);

        assert_eq!(
            result.metrics,
            TaskMetrics::Mcq {
                accuracy: 0.5,
                correct: 2,
                total: 4
            }
        );
        assert_eq!(result.skipped, 1);
        assert_eq!(result.mean_latency_ms, 100.0);
    }

    #[test]
    fn test_empty_task_scores_zero() {
        let result = MetricsAggregator::default().aggregate(TaskKind::Qa, &[]);
        assert_eq!(result.primary_score(), 0.0);
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_full_composite_uses_fixed_weights() {
        let mcq = result(TaskKind::Mcq, 0.8);
        let qa = result(TaskKind::Qa, 0.5);
        let code = result(TaskKind::Code, 0.1);
        let composite =
            MetricsAggregator::default().composite(&[&mcq, &qa, &code], TaskKind::all());

        assert!((composite.value - (0.4 * 0.8 + 0.3 * 0.5 + 0.3 * 0.1)).abs() < 1e-12);
        assert!(composite.is_complete());
    }

    #[test]
    fn test_composite_renormalizes_over_available_tasks() {
        let mcq = result(TaskKind::Mcq, 0.8);
        let code = result(TaskKind::Code, 0.1);
        let composite = MetricsAggregator::default().composite(&[&mcq, &code], TaskKind::all());

        assert!((composite.value - (0.4 * 0.8 + 0.3 * 0.1) / 0.7).abs() < 1e-12);
        assert_eq!(composite.missing, vec![TaskKind::Qa]);
        assert!(!composite.is_complete());
    }

    #[test]
    fn test_composite_with_nothing_available() {
        let composite = MetricsAggregator::default().composite(&[], TaskKind::all());
        assert_eq!(composite.value, 0.0);
        assert_eq!(composite.missing.len(), 3);
    }

    #[test]
    fn test_relative_delta() {
        assert!((relative_delta(0.8, 0.7789) - (0.8 - 0.7789) / 0.7789 * 100.0).abs() < 1e-12);
        assert!(relative_delta(0.1, 0.12) < 0.0);
        assert_eq!(relative_delta(0.0, 0.12), 0.0);
    }

    #[test]
    fn test_compare_against_default_baselines() {
        let mcq = result(TaskKind::Mcq, 0.8);
        let code = result(TaskKind::Code, 0.24);
        let comparisons = MetricsAggregator::default().compare(&[&mcq, &code]);

        assert_eq!(comparisons.len(), 2);
        assert_eq!(comparisons[0].baseline, "XMainframe-Instruct");
        assert_eq!(comparisons[0].deltas.len(), 2);
        assert_eq!(comparisons[1].baseline, "GPT-3.5");
        assert_eq!(comparisons[1].deltas.len(), 1);
        assert!((comparisons[1].deltas[0].delta_pct - 100.0).abs() < 1e-9);
    }

    fn outcome(task: TaskKind, records: Vec<ScoredRecord>) -> TaskOutcome {
        let aggregator = MetricsAggregator::default();
        TaskOutcome {
            task,
            state: RunState::Complete,
            result: Some(aggregator.aggregate(task, &records)),
            failure: None,
            total_items: records.len(),
            records,
            previews: Vec::new(),
            checkpoints: Vec::new(),
            checkpoint_errors: 0,
            resumed_from: None,
        }
    }

    fn report(tasks: Vec<TaskOutcome>, duration_secs: f64) -> EvalReport {
        let aggregator = MetricsAggregator::default();
        let expected: Vec<TaskKind> = tasks.iter().map(|t| t.task).collect();
        let (composite, benchmarks) = aggregator.summarize(&tasks, &expected);
        let now = chrono::Utc::now();
        EvalReport {
            schema_version: crate::metrics::SCHEMA_VERSION,
            run_id: "run-1".to_string(),
            model: "stub".to_string(),
            started_at: now,
            finished_at: now,
            duration_secs,
            tasks,
            composite,
            benchmarks,
            stopped: false,
            tool_version: "0.1.0".to_string(),
        }
    }

    fn qa_record(id: usize, score: f64) -> ScoredRecord {
        ScoredRecord {
            item_id: id,
            task_kind: TaskKind::Qa,
            predicted: "answer".to_string(),
            reference: "reference".to_string(),
            score,
            is_correct: None,
            latency_ms: 10,
            response_succeeded: true,
            skip_reason: None,
        }
    }

    #[test]
    fn test_merge_keeps_tasks_the_resume_did_not_touch() {
        let aggregator = MetricsAggregator::default();
        let mut stopped = outcome(TaskKind::Mcq, vec![mcq_record(0, true)]);
        stopped.state = RunState::Stopped;
        let previous = report(
            vec![stopped, outcome(TaskKind::Qa, vec![qa_record(0, 0.25), qa_record(1, 0.75)])],
            30.0,
        );
        let resumed = report(
            vec![outcome(
                TaskKind::Mcq,
                vec![mcq_record(0, true), mcq_record(1, false), mcq_record(2, true), mcq_record(3, true)],
            )],
            10.0,
        );

        let merged = aggregator.merge(previous, resumed, TaskKind::all());

        assert_eq!(merged.tasks.len(), 2);
        assert_eq!(merged.tasks[0].task, TaskKind::Mcq);
        assert_eq!(merged.tasks[0].primary_score(), Some(0.75));
        assert_eq!(merged.tasks[1].primary_score(), Some(0.5));
        assert!(!merged.stopped);
        assert_eq!(merged.duration_secs, 40.0);
        assert_eq!(merged.composite.missing, vec![TaskKind::Code]);
        assert!((merged.composite.value - (0.4 * 0.75 + 0.3 * 0.5) / 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_compare_skips_tasks_without_results() {
        let qa = result(TaskKind::Qa, 0.5);
        let comparisons = MetricsAggregator::default().compare(&[&qa]);
        assert!(comparisons.iter().all(|c| c.deltas.is_empty()));
    }
}
