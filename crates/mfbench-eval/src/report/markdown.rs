//! Markdown report generation

use super::{describe_metrics, format_delta, task_status};
use crate::error::BenchResult;
use crate::metrics::{EvalReport, TaskMetrics};

/// Markdown report generator
pub struct MarkdownReporter;

impl MarkdownReporter {
    /// Generate a Markdown report
    pub fn generate(report: &EvalReport) -> BenchResult<String> {
        let mut md = String::new();

        md.push_str("# MainframeBench Evaluation Report\n\n");

        md.push_str("## Overview\n\n");
        md.push_str(&format!("- **Run**: {}\n", report.run_id));
        md.push_str(&format!("- **Model**: `{}`\n", report.model));
        md.push_str(&format!("- **Tool Version**: {}\n", report.tool_version));
        md.push_str(&format!(
            "- **Started**: {}\n",
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        md.push_str(&format!("- **Duration**: {:.1}s\n", report.duration_secs));
        md.push_str(&format!("- **Items Scored**: {}\n", report.total_scored()));
        if report.stopped {
            md.push_str("- **Stopped**: the run was cancelled before all tasks completed\n");
        }
        md.push('\n');

        md.push_str("## Results by Task\n\n");
        md.push_str("| Task | Status | Items | Score | Details |\n");
        md.push_str("|------|--------|-------|-------|---------|\n");
        for outcome in &report.tasks {
            let (score, details) = match (&outcome.result, &outcome.failure) {
                (_, Some(failure)) => ("-".to_string(), failure.message.clone()),
                (Some(result), None) => (
                    format!("{:.4}", result.primary_score()),
                    describe_metrics(&result.metrics),
                ),
                (None, None) => ("-".to_string(), String::new()),
            };
            md.push_str(&format!(
                "| {} | {} | {}/{} | {} | {} |\n",
                outcome.task.display_name(),
                task_status(outcome),
                outcome.items_processed(),
                outcome.total_items,
                score,
                details
            ));
        }
        md.push('\n');

        md.push_str("## Composite\n\n");
        md.push_str(&format!("**{:.4}**", report.composite.value));
        if report.composite.is_complete() {
            md.push_str("\n\n");
        } else {
            let missing: Vec<&str> = report.composite.missing.iter().map(|k| k.as_str()).collect();
            md.push_str(&format!(
                " (partial, over available tasks only; missing: {})\n\n",
                missing.join(", ")
            ));
        }

        let code_bleu = report.tasks.iter().find_map(|t| match t.result.as_ref().map(|r| &r.metrics) {
            Some(TaskMetrics::Code { bleu, .. }) => Some(bleu),
            _ => None,
        });
        if let Some(bleu) = code_bleu {
            md.push_str("## BLEU Detail\n\n");
            md.push_str("| Metric | Value |\n|--------|-------|\n");
            md.push_str(&format!("| BLEU | {:.4} |\n", bleu.bleu));
            md.push_str(&format!("| BLEU (validation) | {:.4} |\n", bleu.bleu_validation));
            md.push_str(&format!("| Divergence | {:.4} |\n", bleu.divergence()));
            md.push_str(&format!("| Brevity Penalty | {:.4} |\n", bleu.brevity_penalty));
            md.push_str(&format!("| Length Ratio | {:.4} |\n", bleu.length_ratio));
            let precisions: Vec<String> = bleu.precisions.iter().map(|p| format!("{:.4}", p)).collect();
            md.push_str(&format!("| Precisions | {} |\n\n", precisions.join(" / ")));
        }

        let comparisons: Vec<_> = report.benchmarks.iter().filter(|b| !b.deltas.is_empty()).collect();
        if !comparisons.is_empty() {
            md.push_str("## Baselines\n\n");
            md.push_str("| Baseline | Metric | Baseline Value | Observed | Delta |\n");
            md.push_str("|----------|--------|----------------|----------|-------|\n");
            for comparison in comparisons {
                for delta in &comparison.deltas {
                    md.push_str(&format!(
                        "| {} | {} | {:.4} | {:.4} | {} |\n",
                        comparison.baseline,
                        delta.metric,
                        delta.baseline_value,
                        delta.observed,
                        format_delta(delta)
                    ));
                }
            }
            md.push('\n');
        }

        let previews: Vec<_> = report
            .tasks
            .iter()
            .flat_map(|t| t.previews.iter().map(move |p| (t.task, p)))
            .collect();
        if !previews.is_empty() {
            md.push_str("## Samples\n\n");
            md.push_str("| Task | Item | Question | Predicted | Reference | Score |\n");
            md.push_str("|------|------|----------|-----------|-----------|-------|\n");
            for (task, preview) in previews {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {:.3} |\n",
                    task,
                    preview.item_id,
                    escape_cell(&preview.question),
                    escape_cell(&preview.predicted),
                    escape_cell(&preview.reference),
                    preview.score
                ));
            }
            md.push('\n');
        }

        Ok(md)
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
