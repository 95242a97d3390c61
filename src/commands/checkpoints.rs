//! List stored checkpoints

use std::path::Path;

use anyhow::Result;
use colored::*;
use mfbench_eval::{CheckpointStore, TaskKind};

use crate::console::CliConsole;

pub async fn execute(run_dir: &Path, task: Option<TaskKind>) -> Result<()> {
    let store = CheckpointStore::in_run_dir(run_dir);
    let tasks: Vec<TaskKind> = match task {
        Some(task) => vec![task],
        None => TaskKind::all().to_vec(),
    };

    CliConsole::print_header(&format!("Checkpoints in {}", run_dir.display()));
    let mut found = 0;
    for task in tasks {
        let summaries = store.list(task).await?;
        if summaries.is_empty() {
            continue;
        }
        found += summaries.len();

        println!();
        println!("{}", task.display_name().bold());
        println!(
            "{:>8} {:>8} {:>8} {:>10} {:>8} {:>8}  {:<20}",
            "Offset", "Attempt", "Segment", "Score", "Scored", "Skipped", "Timestamp"
        );
        println!("{:-<79}", "");
        for summary in summaries {
            println!(
                "{:>8} {:>8} {:>8} {:>10.4} {:>8} {:>8}  {:<20}",
                summary.items_processed,
                summary.attempt,
                summary.segment_start,
                summary.running_score,
                summary.scored,
                summary.skipped,
                summary.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    if found == 0 {
        CliConsole::warn("No checkpoints found");
    }
    Ok(())
}
