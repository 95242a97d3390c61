//! Report generation for evaluation results
//!
//! Renders an [`EvalReport`] as JSON, Markdown or a plain terminal table, and writes the
//! results files of a run.

mod json;
mod markdown;
mod writer;

pub use json::JsonReporter;
pub use markdown::MarkdownReporter;
pub use writer::{RESULTS_FILE, ResultsWriter, RunSummary, SUMMARY_FILE, read_report};

use crate::error::BenchResult;
use crate::metrics::{BaselineDelta, EvalReport, TaskMetrics, TaskOutcome};

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Markdown,
    Table,
}

impl ReportFormat {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            "table" | "text" => Some(ReportFormat::Table),
            _ => None,
        }
    }
}

/// Generate a report in the specified format
pub fn generate_report(report: &EvalReport, format: ReportFormat) -> BenchResult<String> {
    match format {
        ReportFormat::Json => JsonReporter::generate(report),
        ReportFormat::Markdown => MarkdownReporter::generate(report),
        ReportFormat::Table => Ok(generate_table(report)),
    }
}

/// One-line description of a task's metrics
pub(crate) fn describe_metrics(metrics: &TaskMetrics) -> String {
    match metrics {
        TaskMetrics::Mcq {
            accuracy,
            correct,
            total,
        } => format!("accuracy {:.4} ({}/{})", accuracy, correct, total),
        TaskMetrics::Qa {
            average_quality_score,
            total_samples,
        } => format!("avg quality {:.4} (n={})", average_quality_score, total_samples),
        TaskMetrics::Code {
            bleu,
            total_samples,
        } => format!(
            "BLEU {:.4} (validation {:.4}, n={})",
            bleu.bleu, bleu.bleu_validation, total_samples
        ),
    }
}

/// Status column for a task
pub(crate) fn task_status(outcome: &TaskOutcome) -> String {
    match &outcome.failure {
        Some(failure) => format!("FAILED ({})", failure.error_code),
        None => outcome.state.to_string().to_uppercase(),
    }
}

/// Signed percentage, e.g. `+12.3%`
pub(crate) fn format_delta(delta: &BaselineDelta) -> String {
    format!("{:+.1}%", delta.delta_pct)
}

/// Generate a simple table report for terminal output
fn generate_table(report: &EvalReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n{:=<78}\n", "= MainframeBench Results "));
    output.push_str(&format!("Run: {} | Model: {}\n", report.run_id, report.model));
    output.push_str(&format!(
        "Started: {} | Duration: {:.1}s\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.duration_secs
    ));
    if report.stopped {
        output.push_str("Run was stopped before all tasks completed\n");
    }
    output.push_str(&format!("{:=<78}\n\n", ""));

    output.push_str("TASKS\n");
    output.push_str(&format!("{:-<78}\n", ""));
    output.push_str(&format!(
        "{:<26} {:>14} {:>8} {:>8} {:>8} {:>10}\n",
        "Task", "Status", "Items", "Skipped", "Failed", "Score"
    ));
    output.push_str(&format!("{:-<78}\n", ""));

    for outcome in &report.tasks {
        let (skipped, failed, score) = match &outcome.result {
            Some(result) => (
                result.skipped.to_string(),
                result.failed_queries.to_string(),
                format!("{:.4}", result.primary_score()),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        output.push_str(&format!(
            "{:<26} {:>14} {:>8} {:>8} {:>8} {:>10}\n",
            outcome.task.display_name(),
            task_status(outcome),
            format!("{}/{}", outcome.items_processed(), outcome.total_items),
            skipped,
            failed,
            score
        ));
        if let Some(result) = &outcome.result {
            output.push_str(&format!("  {}\n", describe_metrics(&result.metrics)));
        }
        if let Some(failure) = &outcome.failure {
            output.push_str(&format!("  {}\n", failure.message));
        }
    }
    output.push_str(&format!("{:-<78}\n\n", ""));

    output.push_str("COMPOSITE\n");
    output.push_str(&format!("{:-<78}\n", ""));
    output.push_str(&format!("Score: {:.4}\n", report.composite.value));
    if !report.composite.is_complete() {
        let missing: Vec<&str> = report.composite.missing.iter().map(|k| k.as_str()).collect();
        output.push_str(&format!(
            "Partial: computed over available tasks only (missing: {})\n",
            missing.join(", ")
        ));
    }
    output.push('\n');

    if report.benchmarks.iter().any(|b| !b.deltas.is_empty()) {
        output.push_str("BASELINES\n");
        output.push_str(&format!("{:-<78}\n", ""));
        output.push_str(&format!(
            "{:<24} {:<14} {:>10} {:>10} {:>10}\n",
            "Baseline", "Metric", "Baseline", "Observed", "Delta"
        ));
        for comparison in &report.benchmarks {
            for delta in &comparison.deltas {
                output.push_str(&format!(
                    "{:<24} {:<14} {:>10.4} {:>10.4} {:>10}\n",
                    comparison.baseline,
                    delta.metric,
                    delta.baseline_value,
                    delta.observed,
                    format_delta(delta)
                ));
            }
        }
    }

    output.push_str(&format!("{:=<78}\n", ""));
    output
}
