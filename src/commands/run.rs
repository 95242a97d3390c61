//! Full evaluation run

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use mfbench_eval::TaskKind;
use mfbench_eval::report::ReportFormat;
use tokio_util::sync::CancellationToken;

use super::{build_orchestrator, finish_run, load_config, with_interrupts};
use crate::console::CliConsole;
use crate::progress::TaskProgressBars;

/// Arguments of `mfbench run`
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub tasks: Option<Vec<TaskKind>>,
    pub sample_size: Option<usize>,
    pub workers: Option<usize>,
    pub run_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub format: ReportFormat,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref(), args.tasks, args.data_dir)?;
    if args.sample_size.is_some() {
        config.set_sample_size(args.sample_size);
    }
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }

    let run_dir = args.run_dir.unwrap_or_else(|| {
        config
            .output_dir
            .join(format!("run_{}", Utc::now().format("%Y%m%d_%H%M%S")))
    });

    CliConsole::print_header("MainframeBench evaluation");
    CliConsole::info(&format!("Model command: {}", config.gateway.command_line()));
    CliConsole::info(&format!("Run directory: {}", run_dir.display()));

    let cancel = CancellationToken::new();
    let progress = TaskProgressBars::new();
    let orchestrator = build_orchestrator(config, &run_dir, cancel.clone(), &progress)?;
    CliConsole::info(&format!("Run id: {}", orchestrator.run_id()));

    let report = with_interrupts(cancel, async { Ok(orchestrator.run().await) }).await?;
    finish_run(&report, &run_dir, args.format).await
}
