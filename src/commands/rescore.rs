//! Recompute scores of a stored report

use std::path::Path;

use anyhow::{Context, Result};
use mfbench_eval::MetricsAggregator;
use mfbench_eval::report::{ReportFormat, ResultsWriter, generate_report, read_report};

use super::load_config;
use crate::console::CliConsole;

pub async fn execute(
    input: &Path,
    config: Option<&Path>,
    write: bool,
    format: ReportFormat,
) -> Result<()> {
    let config = load_config(config, None, None)?;
    let mut report = read_report(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let before = report.composite.value;
    MetricsAggregator::new(config.scoring.composite).rescore(&mut report);

    println!("{}", generate_report(&report, format)?);
    CliConsole::info(&format!(
        "Composite {:.4} -> {:.4}",
        before, report.composite.value
    ));

    if write {
        let run_dir = input.parent().unwrap_or_else(|| Path::new("."));
        ResultsWriter::new(run_dir)
            .write(&report)
            .await
            .context("Failed to write rescored results")?;
        CliConsole::success(&format!("Rescored results written to {}", run_dir.display()));
    }
    Ok(())
}
