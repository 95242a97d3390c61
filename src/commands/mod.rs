//! CLI commands

pub mod checkpoints;
pub mod report;
pub mod rescore;
pub mod resume;
pub mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use mfbench_eval::report::{ReportFormat, ResultsWriter, generate_report};
use mfbench_eval::{
    CheckpointStore, DatasetLoader, EvalConfig, EvalReport, MetricsAggregator, Orchestrator,
    ProcessGateway, TaskKind,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::console::CliConsole;
use crate::progress::TaskProgressBars;
use crate::signal_handler::SignalHandler;

/// Load configuration, apply CLI overrides and validate the result
pub(crate) fn load_config(
    path: Option<&Path>,
    tasks: Option<Vec<TaskKind>>,
    data_dir: Option<PathBuf>,
) -> Result<EvalConfig> {
    let mut config = EvalConfig::load(path).context("Failed to load configuration")?;
    if let Some(tasks) = tasks {
        config = config.with_tasks(tasks);
    }
    if let Some(dir) = data_dir {
        config = config.with_data_dir(dir);
    }
    Ok(config)
}

/// Orchestrator wired to the model command, the dataset files and the run's checkpoints
pub(crate) fn build_orchestrator(
    config: EvalConfig,
    run_dir: &Path,
    cancel: CancellationToken,
    progress: &TaskProgressBars,
) -> Result<Orchestrator> {
    config.validate().context("Invalid configuration")?;
    let gateway = ProcessGateway::new(config.gateway.clone()).context("Failed to set up model gateway")?;
    let dataset = DatasetLoader::new(&config.data_dir);

    Ok(Orchestrator::new(config, Arc::new(gateway), Arc::new(dataset))
        .with_store(CheckpointStore::in_run_dir(run_dir))
        .with_cancellation(cancel)
        .with_progress(progress.callback()))
}

/// Run `work` with Ctrl+C mapped to cancellation of `cancel`
pub(crate) async fn with_interrupts<F>(cancel: CancellationToken, work: F) -> Result<EvalReport>
where
    F: std::future::Future<Output = Result<EvalReport>>,
{
    let _signals = SignalHandler::start(cancel)?;
    work.await
}

/// Fold the report of a resumed run into the results already stored in `run_dir`.
///
/// Tasks the resume did not run keep their stored outcomes, and the composite covers
/// `expected` so tasks without a result are reported missing.
pub(crate) async fn merge_with_stored(
    report: EvalReport,
    run_dir: &Path,
    expected: &[TaskKind],
    aggregator: &MetricsAggregator,
) -> EvalReport {
    let writer = ResultsWriter::new(run_dir);
    let stored = if writer.results_path().exists() {
        match writer.read().await {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(error = %e, "Failed to read stored results, keeping the resumed tasks only");
                None
            }
        }
    } else {
        None
    };

    let previous = stored.unwrap_or_else(|| EvalReport {
        tasks: Vec::new(),
        duration_secs: 0.0,
        ..report.clone()
    });
    aggregator.merge(previous, report, expected)
}

/// Write the results files, print the report and summarize the outcome
pub(crate) async fn finish_run(report: &EvalReport, run_dir: &Path, format: ReportFormat) -> Result<()> {
    let writer = ResultsWriter::new(run_dir);
    writer
        .write(report)
        .await
        .with_context(|| format!("Failed to write results to {}", run_dir.display()))?;

    println!("{}", generate_report(report, format)?);

    for outcome in report.failed_tasks() {
        if let Some(failure) = &outcome.failure {
            CliConsole::error(&format!("{} failed: {}", outcome.task.display_name(), failure.message));
        }
    }
    if report.stopped {
        CliConsole::warn(&format!(
            "Run stopped early. Continue with: mfbench resume --run-dir {}",
            run_dir.display()
        ));
    }
    CliConsole::success(&format!(
        "Composite score {:.4} over {} scored items. Results in {}",
        report.composite.value,
        report.total_scored(),
        writer.results_path().display()
    ));

    if !report.tasks.is_empty() && report.tasks.iter().all(|t| t.failure.is_some()) {
        bail!("every task failed to run");
    }
    Ok(())
}
