//! Resume an interrupted run

use std::path::PathBuf;

use anyhow::Result;
use mfbench_eval::report::ReportFormat;
use mfbench_eval::{CheckpointStore, MetricsAggregator, TaskKind};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{build_orchestrator, finish_run, load_config, merge_with_stored, with_interrupts};
use crate::console::CliConsole;
use crate::progress::TaskProgressBars;

/// Arguments of `mfbench resume`
pub struct ResumeArgs {
    pub run_dir: PathBuf,
    pub config: Option<PathBuf>,
    pub task: Option<TaskKind>,
    pub offset: Option<usize>,
    pub data_dir: Option<PathBuf>,
    pub format: ReportFormat,
}

pub async fn execute(args: ResumeArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref(), None, args.data_dir)?;
    let expected = config.enabled_tasks.clone();
    let aggregator = MetricsAggregator::new(config.scoring.composite.clone());
    if let Some(task) = args.task {
        config = config.with_tasks(vec![task]);
    }

    let store = CheckpointStore::in_run_dir(&args.run_dir);
    let mut run_id = None;
    for &task in &config.enabled_tasks {
        match store.latest_at_or_before(task, args.offset).await {
            Ok(Some(checkpoint)) => {
                run_id = Some(checkpoint.run_id);
                break;
            }
            Ok(None) => {}
            Err(e) => warn!(task = %task, error = %e, "Failed to read checkpoints"),
        }
    }

    CliConsole::print_header("MainframeBench evaluation (resume)");
    match &run_id {
        Some(id) => CliConsole::info(&format!("Resuming run {}", id)),
        None => CliConsole::warn("No checkpoints found, tasks start from the beginning"),
    }

    let cancel = CancellationToken::new();
    let progress = TaskProgressBars::new();
    let mut orchestrator = build_orchestrator(config, &args.run_dir, cancel.clone(), &progress)?;
    if let Some(id) = run_id {
        orchestrator = orchestrator.with_run_id(id);
    }

    let offset = args.offset;
    let report = with_interrupts(cancel, async {
        Ok(orchestrator.resume(offset).await?)
    })
    .await?;
    let report = merge_with_stored(report, &args.run_dir, &expected, &aggregator).await;
    finish_run(&report, &args.run_dir, args.format).await
}
