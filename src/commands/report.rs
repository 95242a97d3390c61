//! Render a stored report

use std::path::Path;

use anyhow::{Context, Result};
use mfbench_eval::report::{ReportFormat, generate_report, read_report};

pub async fn execute(input: &Path, format: ReportFormat) -> Result<()> {
    let report = read_report(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    println!("{}", generate_report(&report, format)?);
    Ok(())
}
