//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use mfbench_eval::{ReportFormat, TaskKind};

#[derive(Parser)]
#[command(name = "mfbench")]
#[command(about = "MainframeBench evaluation of command-line language models")]
#[command(
    long_about = r#"MainframeBench evaluation of command-line language models

USAGE:
  mfbench run                                  # Evaluate all tasks
  mfbench run --tasks mcq --sample-size 50     # Quick multiple-choice run
  mfbench resume --run-dir runs/run_X          # Continue an interrupted run
  mfbench report --input runs/run_X/results.json
  mfbench checkpoints --run-dir runs/run_X"#
)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full evaluation
    Run {
        /// Path to configuration file (TOML, YAML or JSON)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Tasks to evaluate, comma separated
        #[arg(long, value_delimiter = ',', value_parser = parse_task)]
        tasks: Option<Vec<TaskKind>>,

        /// Evaluate only the first N items of each task
        #[arg(long)]
        sample_size: Option<usize>,

        /// Batches evaluated concurrently (1-3)
        #[arg(long)]
        workers: Option<usize>,

        /// Directory for checkpoints and results (default: <output_dir>/run_<timestamp>)
        #[arg(long)]
        run_dir: Option<PathBuf>,

        /// Directory holding the dataset files
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Report format printed at the end
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Resume an interrupted run from its checkpoints
    Resume {
        /// Run directory of the interrupted run
        #[arg(long)]
        run_dir: PathBuf,

        /// Path to configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Resume only this task
        #[arg(long, value_parser = parse_task)]
        task: Option<TaskKind>,

        /// Resume from the latest checkpoint at or before this item offset
        #[arg(long)]
        offset: Option<usize>,

        /// Directory holding the dataset files
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Report format printed at the end
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Recompute aggregates, composite and baseline deltas from stored records
    Rescore {
        /// Stored results file
        #[arg(long, short)]
        input: PathBuf,

        /// Path to configuration file (for composite weights)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Overwrite the results files with the new scores
        #[arg(long)]
        write: bool,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Render a stored report
    Report {
        /// Stored results file
        #[arg(long, short)]
        input: PathBuf,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List stored checkpoints of a run
    Checkpoints {
        /// Run directory
        #[arg(long)]
        run_dir: PathBuf,

        /// Only this task
        #[arg(long, value_parser = parse_task)]
        task: Option<TaskKind>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Markdown,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => ReportFormat::Table,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Markdown => ReportFormat::Markdown,
        }
    }
}

fn parse_task(s: &str) -> Result<TaskKind, String> {
    TaskKind::parse(s).ok_or_else(|| format!("unknown task '{}', expected mcq, qa or code", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_task_list() {
        let cli = Cli::try_parse_from([
            "mfbench",
            "run",
            "--tasks",
            "mcq,code",
            "--sample-size",
            "10",
            "--format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                tasks,
                sample_size,
                format,
                ..
            } => {
                assert_eq!(tasks, Some(vec![TaskKind::Mcq, TaskKind::Code]));
                assert_eq!(sample_size, Some(10));
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_unknown_task_is_rejected() {
        assert!(Cli::try_parse_from(["mfbench", "run", "--tasks", "essay"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mfbench",
            "checkpoints",
            "--run-dir",
            "runs/x",
            "--verbose",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
